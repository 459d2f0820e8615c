use log::warn;

use crate::entity::EntityConfig;
use crate::error::{Result, SimError};
use crate::session::SessionInit;
use crate::simulation::{Simulation, TickConfig, TickScheduler};

use super::transport::HostTransport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub ticks: u64,
    pub commands: u64,
    pub dropped: u64,
    pub snapshots: u64,
}

/// Authoritative side of a session: transport in, scheduler, transport out.
pub struct HostSession<T> {
    scheduler: TickScheduler,
    transport: T,
    stats: HostStats,
}

impl<T: HostTransport> HostSession<T> {
    pub fn new(
        init: &SessionInit,
        transport: T,
        tick_config: TickConfig,
        entity_config: EntityConfig,
    ) -> Result<Self> {
        let simulation = Simulation::new(init, None, entity_config)?;
        Ok(Self {
            scheduler: TickScheduler::new(simulation, tick_config),
            transport,
            stats: HostStats::default(),
        })
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn simulation(&self) -> &Simulation {
        self.scheduler.simulation()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    /// Feeds every received command to the scheduler, runs one tick over
    /// `elapsed_ms` and broadcasts the resulting snapshot. Returns whether a
    /// snapshot went out.
    pub fn pump(&mut self, elapsed_ms: f64) -> Result<bool> {
        for (player, payload) in self.transport.poll() {
            match self.scheduler.push_command(player, payload) {
                Ok(true) => self.stats.commands += 1,
                Ok(false) => self.stats.dropped += 1,
                Err(err @ (SimError::Decode(_) | SimError::UnknownEntity(_))) => {
                    warn!("host dropped command from {player}: {err}");
                    self.stats.dropped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        self.stats.ticks += 1;
        let Some(snapshot) = self.scheduler.tick(elapsed_ms)? else {
            return Ok(false);
        };
        self.transport.broadcast(&snapshot);
        self.stats.snapshots += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::net::transport::{ClientTransport, LinkSimulation, loopback};
    use crate::simulation::Command;

    fn init() -> SessionInit {
        SessionInit::ring(
            vec![[0.0, 0.0], [0.0, 1000.0], [1000.0, 1000.0], [1000.0, 0.0]],
            &["a"],
            &["b"],
        )
    }

    #[test]
    fn broadcasts_once_backlog_is_met() {
        let (transport, mut clients) = loopback(&[EntityId(0)], LinkSimulation::default());
        let mut host =
            HostSession::new(&init(), transport, TickConfig::default(), EntityConfig::default()).unwrap();

        assert!(!host.pump(100.0).unwrap());
        for time in [0.0, 16.0, 32.0] {
            clients[0].send(&Command::idle(time).to_bytes());
        }
        // ready, but the first 150 ms only hold the clock back
        assert!(!host.pump(100.0).unwrap());
        assert!(host.scheduler().is_started());
        assert!(host.pump(100.0).unwrap());
        assert_eq!(host.simulation().time(), 50.0);

        let received = clients[0].poll();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), host.simulation().byte_len());
        assert_eq!(host.stats().commands, 3);
        assert_eq!(host.stats().snapshots, 1);
    }

    #[test]
    fn malformed_commands_are_dropped() {
        let (transport, mut clients) = loopback(&[EntityId(0)], LinkSimulation::default());
        let mut host =
            HostSession::new(&init(), transport, TickConfig::default(), EntityConfig::default()).unwrap();

        clients[0].send(&[0; 5]);
        assert!(!host.pump(100.0).unwrap());
        assert_eq!(host.stats().dropped, 1);
        assert_eq!(host.scheduler().pending_commands(EntityId(0)), 0);
    }
}
