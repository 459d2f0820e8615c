use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::error::{Result, SimError};
use crate::net::codec;
use crate::snapshot::TimeSeriesBuffer;

use super::{Command, Simulation};

/// Commands further ahead of the host clock than this are dropped.
pub const LOOKAHEAD_MS: f64 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TickConfig {
    /// Authoritative ticks per second.
    pub tick_rate: u32,
    /// Physics steps per second the sub-stepping approximates.
    pub animation_rate: u32,
    /// Commands every player must have buffered before the first step.
    pub min_command_backlog: usize,
    /// Ticks of wall time the host clock is held back once every player is
    /// ready, so snapshots always land inside the clients' recorded history.
    pub start_delay_ticks: f64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 10,
            animation_rate: 60,
            min_command_backlog: 3,
            start_delay_ticks: 1.5,
        }
    }
}

impl TickConfig {
    pub fn ms_per_tick(&self) -> f64 {
        (1000.0 / self.tick_rate.max(1) as f64).floor()
    }

    pub fn start_delay_ms(&self) -> f64 {
        self.ms_per_tick() * self.start_delay_ticks.max(0.0)
    }

    pub fn steps_per_tick(&self) -> usize {
        let ratio = self.animation_rate as f64 / self.tick_rate.max(1) as f64;
        (ratio.round() as usize).max(1)
    }
}

/// Authoritative driver: buckets player commands by their embedded time and
/// advances the host `Simulation` in fixed sub-steps.
pub struct TickScheduler {
    config: TickConfig,
    simulation: Simulation,
    commands: IndexMap<EntityId, TimeSeriesBuffer>,
    started: bool,
    holdback_ms: f64,
    ticks: u64,
}

impl TickScheduler {
    pub fn new(simulation: Simulation, config: TickConfig) -> Self {
        let commands = simulation
            .player_ids()
            .into_iter()
            .map(|id| (id, TimeSeriesBuffer::new()))
            .collect();

        Self {
            config,
            simulation,
            commands,
            started: false,
            holdback_ms: 0.0,
            ticks: 0,
        }
    }

    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn pending_commands(&self, player: EntityId) -> usize {
        self.commands.get(&player).map_or(0, TimeSeriesBuffer::len)
    }

    /// Buffers one encoded command from `player`, keyed by the time it carries.
    ///
    /// Returns `false` when the command was valid but too old or too far ahead
    /// to be used.
    pub fn push_command(&mut self, player: EntityId, bytes: Vec<u8>) -> Result<bool> {
        let command = Command::from_bytes(&bytes)?;
        let now = self.simulation.time();
        let buffer = self
            .commands
            .get_mut(&player)
            .ok_or(SimError::UnknownEntity(player))?;

        if self.started && command.time < now {
            debug!("stale command from {player} at {} (host at {now})", command.time);
            return Ok(false);
        }
        if command.time > now + LOOKAHEAD_MS {
            warn!("command from {player} at {} is too far ahead of {now}", command.time);
            return Ok(false);
        }

        buffer.insert(codec::message_time(&bytes)?, bytes);
        Ok(true)
    }

    fn backlog_ready(&self) -> bool {
        self.commands
            .values()
            .all(|buffer| buffer.len() >= self.config.min_command_backlog)
    }

    /// Runs one tick covering `elapsed_ms` of wall time and returns the
    /// snapshot to broadcast. Nothing is stepped or returned until every
    /// player has supplied the minimum backlog, nor while the start delay
    /// is still being absorbed.
    pub fn tick(&mut self, elapsed_ms: f64) -> Result<Option<Vec<u8>>> {
        if !self.started {
            if !self.backlog_ready() {
                return Ok(None);
            }
            self.started = true;
            self.holdback_ms = self.config.start_delay_ms();
            info!(
                "all {} players ready, ticking at {} Hz with {} steps per tick after {} ms",
                self.commands.len(),
                self.config.tick_rate,
                self.config.steps_per_tick(),
                self.holdback_ms
            );
        }

        let absorbed = self.holdback_ms.min(elapsed_ms.max(0.0));
        self.holdback_ms -= absorbed;
        let elapsed_ms = elapsed_ms - absorbed;
        if elapsed_ms <= 0.0 {
            debug!("holding the clock back, {:.1} ms to go", self.holdback_ms);
            return Ok(None);
        }

        let steps = self.config.steps_per_tick();
        let start = self.simulation.time();
        let end = start + elapsed_ms;

        let mut windows = Vec::with_capacity(self.commands.len());
        for (id, buffer) in &self.commands {
            windows.push((*id, buffer.values_within_window(start, end, steps)));
        }

        for step in 0..steps {
            let now = self.simulation.time();
            for (id, window) in &windows {
                match &window[step] {
                    Some(bytes) => {
                        let command = Command::from_bytes(bytes)?;
                        self.simulation.apply_command(*id, &command)?;
                    }
                    // absent input holds the previous command
                    None => self.simulation.entity_mut(*id)?.apply_current_command(now),
                }
            }
            // the last step lands exactly on `end`
            let boundary = if step + 1 == steps {
                end
            } else {
                start + elapsed_ms * (step + 1) as f64 / steps as f64
            };
            self.simulation
                .progress_game_state(boundary - self.simulation.time());
        }

        let now = self.simulation.time();
        for buffer in self.commands.values_mut() {
            buffer.remove_values_upto(now);
        }

        self.ticks += 1;
        debug!("tick {} advanced {start:.1} -> {now:.1}", self.ticks);
        Ok(Some(self.simulation.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec2;

    use super::*;
    use crate::entity::EntityConfig;
    use crate::error::DecodeError;
    use crate::session::SessionInit;

    fn scheduler(config: TickConfig) -> TickScheduler {
        let init = SessionInit::ring(
            vec![[0.0, 0.0], [0.0, 1000.0], [1000.0, 1000.0], [1000.0, 0.0]],
            &["a", "b"],
            &["c"],
        );
        let simulation = Simulation::new(&init, None, EntityConfig::default()).unwrap();
        TickScheduler::new(simulation, config)
    }

    fn moving(time: f64, x: f64) -> Vec<u8> {
        Command {
            time,
            velocity: DVec2::new(x, 0.0),
            ..Default::default()
        }
        .to_bytes()
    }

    fn undelayed() -> TickConfig {
        TickConfig {
            start_delay_ticks: 0.0,
            ..TickConfig::default()
        }
    }

    fn fill_backlog(scheduler: &mut TickScheduler, player: EntityId, x: f64) {
        for frame in 0..3 {
            scheduler.push_command(player, moving(frame as f64 * 10.0, x)).unwrap();
        }
    }

    #[test]
    fn derived_timing() {
        let config = TickConfig::default();
        assert_eq!(config.ms_per_tick(), 100.0);
        assert_eq!(config.steps_per_tick(), 6);
        assert_eq!(config.start_delay_ms(), 150.0);

        let fast = TickConfig {
            tick_rate: 120,
            ..config
        };
        assert_eq!(fast.ms_per_tick(), 8.0);
        assert_eq!(fast.steps_per_tick(), 1);

        let odd = TickConfig {
            tick_rate: 7,
            ..config
        };
        assert_eq!(odd.ms_per_tick(), 142.0);
        assert_eq!(odd.steps_per_tick(), 9);
    }

    #[test]
    fn waits_for_every_player_backlog() {
        let mut scheduler = scheduler(undelayed());
        fill_backlog(&mut scheduler, EntityId(0), 1.0);

        assert_eq!(scheduler.tick(100.0).unwrap(), None);
        assert!(!scheduler.is_started());
        assert_eq!(scheduler.simulation().time(), 0.0);

        fill_backlog(&mut scheduler, EntityId(1), 0.0);
        assert!(scheduler.tick(100.0).unwrap().is_some());
        assert!(scheduler.is_started());
        assert_eq!(scheduler.simulation().time(), 100.0);
    }

    #[test]
    fn missing_input_keeps_previous_command() {
        let mut scheduler = scheduler(undelayed());
        fill_backlog(&mut scheduler, EntityId(0), 1.0);
        fill_backlog(&mut scheduler, EntityId(1), 0.0);
        let start = scheduler.simulation().entity(EntityId(0)).unwrap().position;

        scheduler.tick(100.0).unwrap();
        // no commands for the next tick at all
        let snapshot = scheduler.tick(100.0).unwrap().unwrap();

        let position = scheduler.simulation().entity(EntityId(0)).unwrap().position;
        assert!((position - start - DVec2::new(200.0, 0.0)).length() < 1e-9);
        assert_eq!(codec::message_time(&snapshot).unwrap(), 200.0);
        assert_eq!(snapshot.len(), scheduler.simulation().byte_len());
    }

    #[test]
    fn commands_land_in_their_sub_step() {
        let mut scheduler = scheduler(TickConfig {
            tick_rate: 10,
            animation_rate: 20,
            min_command_backlog: 1,
            start_delay_ticks: 0.0,
        });
        // first half stands still, second half moves
        scheduler.push_command(EntityId(0), moving(0.0, 0.0)).unwrap();
        scheduler.push_command(EntityId(0), moving(50.0, 2.0)).unwrap();
        scheduler.push_command(EntityId(1), moving(0.0, 0.0)).unwrap();
        let start = scheduler.simulation().entity(EntityId(0)).unwrap().position;

        scheduler.tick(100.0).unwrap();

        let position = scheduler.simulation().entity(EntityId(0)).unwrap().position;
        assert!((position - start - DVec2::new(100.0, 0.0)).length() < 1e-9);
        assert_eq!(scheduler.pending_commands(EntityId(0)), 0);
    }

    #[test]
    fn rejects_bad_commands() {
        let mut scheduler = scheduler(TickConfig::default());

        assert!(matches!(
            scheduler.push_command(EntityId(0), vec![0; 12]),
            Err(SimError::Decode(DecodeError::Length { .. }))
        ));
        assert_eq!(
            scheduler.push_command(EntityId(2), moving(0.0, 0.0)),
            Err(SimError::UnknownEntity(EntityId(2)))
        );
        assert_eq!(
            scheduler.push_command(EntityId(0), moving(f64::NAN, 0.0)),
            Err(SimError::Decode(DecodeError::InvalidTime))
        );
        assert_eq!(scheduler.push_command(EntityId(0), moving(5000.0, 0.0)), Ok(false));
        assert_eq!(scheduler.pending_commands(EntityId(0)), 0);
    }

    #[test]
    fn stale_commands_are_dropped_once_running() {
        let mut scheduler = scheduler(undelayed());
        fill_backlog(&mut scheduler, EntityId(0), 0.0);
        fill_backlog(&mut scheduler, EntityId(1), 0.0);
        scheduler.tick(100.0).unwrap();

        assert_eq!(scheduler.push_command(EntityId(0), moving(40.0, 0.0)), Ok(false));
        assert_eq!(scheduler.push_command(EntityId(0), moving(120.0, 0.0)), Ok(true));
    }

    #[test]
    fn start_delay_holds_the_clock_back() {
        let mut scheduler = scheduler(TickConfig::default());
        fill_backlog(&mut scheduler, EntityId(0), 1.0);
        fill_backlog(&mut scheduler, EntityId(1), 0.0);

        assert_eq!(scheduler.tick(100.0).unwrap(), None);
        assert!(scheduler.is_started());
        assert_eq!(scheduler.simulation().time(), 0.0);
        assert_eq!(scheduler.pending_commands(EntityId(0)), 3);

        let snapshot = scheduler.tick(100.0).unwrap().unwrap();
        assert_eq!(codec::message_time(&snapshot).unwrap(), 50.0);
        scheduler.tick(100.0).unwrap();
        assert_eq!(scheduler.simulation().time(), 150.0);
    }

    #[test]
    fn held_attack_restarts_without_new_input() {
        let mut scheduler = scheduler(TickConfig {
            min_command_backlog: 1,
            ..undelayed()
        });
        let swing = Command {
            time: 0.0,
            direction: DVec2::X,
            actions: crate::simulation::Actions::ATTACK,
            ..Default::default()
        };
        scheduler.push_command(EntityId(0), swing.to_bytes()).unwrap();
        scheduler.push_command(EntityId(1), moving(0.0, 0.0)).unwrap();

        for _ in 0..6 {
            scheduler.tick(100.0).unwrap();
        }

        let attack = *scheduler
            .simulation()
            .entity(EntityId(0))
            .unwrap()
            .status_effect(crate::entity::StatusEffectType::Attack);
        assert!(attack.is_active());
        assert!(attack.start_time > 500.0, "attack started at {}", attack.start_time);
    }
}
