use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::entity::{EntityConfig, EntityId};
use crate::error::Result;
use crate::net::codec;
use crate::session::SessionInit;
use crate::simulation::{Command, EntityView, InputSample, Simulation};

use super::transport::ClientTransport;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// How far behind the local clock other entities are drawn.
    pub interpolation_delay_ms: f64,
    pub frame_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            interpolation_delay_ms: 150.0,
            frame_rate: 60,
        }
    }
}

impl ClientConfig {
    pub fn frame_ms(&self) -> f64 {
        1000.0 / self.frame_rate.max(1) as f64
    }
}

/// Supplies the local player's input once per frame.
pub trait InputSource {
    fn sample(&mut self, time: f64) -> InputSample;
}

impl<F> InputSource for F
where
    F: FnMut(f64) -> InputSample,
{
    fn sample(&mut self, time: f64) -> InputSample {
        self(time)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientStats {
    pub frames: u64,
    pub snapshots: u64,
    pub corrections: u64,
    pub dropped: u64,
}

/// A participant's prediction loop around its own `Simulation`.
pub struct ClientSession<T> {
    simulation: Simulation,
    transport: T,
    player: EntityId,
    config: ClientConfig,
    stats: ClientStats,
}

impl<T: ClientTransport> ClientSession<T> {
    pub fn new(
        init: &SessionInit,
        player: EntityId,
        transport: T,
        config: ClientConfig,
        entity_config: EntityConfig,
    ) -> Result<Self> {
        let simulation = Simulation::new(init, Some(player), entity_config)?;
        Ok(Self {
            simulation,
            transport,
            player,
            config,
            stats: ClientStats::default(),
        })
    }

    pub fn player(&self) -> EntityId {
        self.player
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn stats(&self) -> ClientStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn visual_state(&self, id: EntityId) -> Result<EntityView> {
        self.simulation.visual_state(id)
    }

    /// Samples `source` and runs one frame of `dt`.
    pub fn step(&mut self, source: &mut impl InputSource, dt: f64) -> Result<()> {
        let input = source.sample(self.simulation.time());
        self.frame(&input, dt)
    }

    /// One client frame: take in authoritative state, send and record this
    /// frame's command, predict the local player, interpolate everyone else
    /// and advance the clock.
    pub fn frame(&mut self, input: &InputSample, dt: f64) -> Result<()> {
        self.receive_snapshots()?;

        let speed = self.simulation.entity(self.player)?.speed();
        let command = Command::from_input(self.simulation.time(), input, speed);
        self.transport.send(&command.to_bytes());
        self.simulation.record_local_frame(&command)?;
        self.simulation.apply_command(self.player, &command)?;

        self.simulation
            .interpolate_non_local_entities(self.config.interpolation_delay_ms, Some(self.player))?;
        self.simulation.progress_game_state(dt);

        self.stats.frames += 1;
        Ok(())
    }

    fn receive_snapshots(&mut self) -> Result<()> {
        for payload in self.transport.poll() {
            let newest = self.simulation.authoritative_snapshots().last_inserted_time();
            match codec::message_time(&payload) {
                Ok(time) if newest.is_some_and(|newest| time <= newest) => {
                    debug!("client {} skipping stale snapshot at {time}", self.player);
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("client {} dropped snapshot: {err}", self.player);
                    self.stats.dropped += 1;
                    continue;
                }
            }

            match self.simulation.receive_authoritative(&payload) {
                Ok(corrected) => {
                    self.stats.snapshots += 1;
                    if corrected {
                        self.stats.corrections += 1;
                    }
                }
                Err(err) if err.is_decode() => {
                    warn!("client {} dropped snapshot: {err}", self.player);
                    self.stats.dropped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
