use log::debug;

use crate::error::{ConsistencyViolation, Result};
use crate::net::codec;
use crate::snapshot::TimePoint;

use super::{Command, Simulation};

/// A server time with no bracketing local snapshot is tolerated up to here.
pub const RECONCILIATION_GRACE_MS: f64 = 1000.0;
/// Local history kept behind the newest server time.
pub const HISTORY_WINDOW_MS: f64 = 1000.0;

impl Simulation {
    /// Stores one authoritative world snapshot and reconciles the local
    /// player against it. The snapshot is validated in full first; a
    /// malformed one is rejected before any buffer changes.
    pub fn receive_authoritative(&mut self, bytes: &[u8]) -> Result<bool> {
        self.check_world_len(bytes)?;
        let server_time = codec::message_time(bytes)?;
        for slot in 0..self.entity_count() {
            codec::decode_entity(codec::entity_slice(bytes, slot)?)?;
        }

        self.authoritative_snapshots.insert(server_time, bytes.to_vec());
        if let Some((older, newer)) = self.authoritative_snapshots.two_latest() {
            self.server_delay_estimate = (newer.time - older.time) / 2.0;
        }

        let corrected = self.server_reconciliation(server_time, bytes)?;
        self.authoritative_snapshots
            .remove_values_upto(server_time - HISTORY_WINDOW_MS);
        Ok(corrected)
    }

    /// Checks the local player against the server's view at `server_time`
    /// and, on divergence, replays every buffered command from there.
    ///
    /// Returns whether a correction happened. A host simulation has no local
    /// player and never corrects. A server time at or past the newest local
    /// snapshot is skipped; one older than all local history is fatal once
    /// past the grace window.
    pub fn server_reconciliation(&mut self, server_time: f64, snapshot: &[u8]) -> Result<bool> {
        let Some((local_id, slot)) = self.local_player else {
            return Ok(false);
        };

        let Some((before, after)) = self.local_snapshots.around(server_time) else {
            // not bracketed yet: the local clock has not passed the server's
            if self
                .local_snapshots
                .latest_time()
                .is_some_and(|latest| server_time >= latest)
            {
                debug!("server time {server_time} is ahead of local history for {local_id}");
                return Ok(false);
            }
            if server_time > RECONCILIATION_GRACE_MS {
                return Err(ConsistencyViolation::UnrecordedPast { server_time }.into());
            }
            return Ok(false);
        };

        let server = TimePoint::new(server_time, codec::entity_slice(snapshot, slot)?);
        let corrected = self
            .entity_mut(local_id)?
            .server_reconciliation(server, before.as_slice(), after.as_slice())?;

        if corrected {
            self.replay_local_commands(server_time)?;
        }

        let horizon = server_time - HISTORY_WINDOW_MS;
        self.local_snapshots.remove_values_upto(horizon);
        self.local_commands.remove_values_upto(horizon);
        Ok(corrected)
    }

    fn replay_local_commands(&mut self, server_time: f64) -> Result<()> {
        let Some((local_id, _)) = self.local_player else {
            return Ok(());
        };
        let commands = self
            .local_commands
            .values_from(server_time)
            .iter()
            .map(|point| Command::from_bytes(&point.value))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let now = self.time;
        let player = self.entity_mut(local_id)?;
        let mut cursor = server_time;
        for command in &commands {
            player.expire_status_effects(cursor);
            player.move_by(command.time - cursor);
            player.apply_command(command, command.time)?;
            cursor = command.time;
        }
        player.expire_status_effects(cursor);
        player.move_by(now - cursor);

        debug!(
            "replayed {} commands for {} from {} to {}",
            commands.len(),
            local_id,
            server_time,
            now
        );
        Ok(())
    }

    /// Buffers the command about to be sent together with the local player's
    /// state at the current simulation time.
    pub fn record_local_frame(&mut self, command: &Command) -> Result<()> {
        let Some((local_id, _)) = self.local_player else {
            return Ok(());
        };
        let state = self.entity(local_id)?.to_bytes();
        self.local_commands.insert(command.time, command.to_bytes());
        self.local_snapshots.insert(self.time, state);
        Ok(())
    }
}
