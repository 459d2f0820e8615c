use log::debug;

use crate::error::{ConsistencyViolation, Result};
use crate::net::codec::{self, EntityRecord};
use crate::snapshot::TimePoint;

use super::{Entity, StatusEffectType, StatusEffects};

/// Position error, per axis, above which the server state wins.
pub const RECONCILIATION_THRESHOLD: f64 = 5.0;

fn fraction(time: f64, before: f64, after: f64) -> f64 {
    let span = after - before;
    if span > 0.0 { (time - before) / span } else { 1.0 }
}

impl Entity {
    /// Replaces this entity's state with its view at `time` given two
    /// authoritative snapshots of it.
    pub fn interpolate_from_buffers(
        &mut self,
        time: f64,
        before: TimePoint<&[u8]>,
        after: TimePoint<&[u8]>,
    ) -> Result<()> {
        let older = codec::decode_entity(before.value)?;
        let newer = codec::decode_entity(after.value)?;

        let record = if time > after.time {
            EntityRecord {
                position: newer.position + newer.velocity * (time - after.time),
                ..newer
            }
        } else if time < before.time {
            EntityRecord {
                position: older.position + older.velocity * (time - before.time),
                ..older
            }
        } else {
            let t = fraction(time, before.time, after.time);
            let mut effects = StatusEffects::new();
            for kind in StatusEffectType::ALL {
                let preferred = if newer.effects.is_active(kind) {
                    newer.effects.get(kind)
                } else {
                    older.effects.get(kind)
                };
                effects.set(kind, *preferred);
            }
            EntityRecord {
                position: older.position.lerp(newer.position, t),
                velocity: older.velocity.lerp(newer.velocity, t),
                effects,
            }
        };

        self.apply_record(&record);
        Ok(())
    }

    /// Local view at `target_time` between two recorded snapshots. An older
    /// effect is kept only while it still lasts at `target_time`.
    pub fn interpolate_values(
        target_time: f64,
        before: TimePoint<&[u8]>,
        after: TimePoint<&[u8]>,
    ) -> Result<EntityRecord> {
        let older = codec::decode_entity(before.value)?;
        let newer = codec::decode_entity(after.value)?;
        let t = fraction(target_time, before.time, after.time);

        let mut effects = StatusEffects::new();
        for kind in StatusEffectType::ALL {
            let effect = older.effects.get(kind);
            let chosen = if effect.covers(target_time) {
                effect
            } else {
                newer.effects.get(kind)
            };
            effects.set(kind, *chosen);
        }

        Ok(EntityRecord {
            position: older.position.lerp(newer.position, t),
            velocity: older.velocity.lerp(newer.velocity, t),
            effects,
        })
    }

    /// Compares the server's view of this entity with the locally recorded
    /// one at the same time. On divergence the entity jumps to the server
    /// state and `true` is returned; replaying newer input is up to the caller.
    pub fn server_reconciliation(
        &mut self,
        server: TimePoint<&[u8]>,
        before: TimePoint<&[u8]>,
        after: TimePoint<&[u8]>,
    ) -> Result<bool> {
        if !(before.time <= server.time && server.time <= after.time) {
            return Err(ConsistencyViolation::OutOfOrder {
                before: before.time,
                server: server.time,
                after: after.time,
            }
            .into());
        }

        let local = Self::interpolate_values(server.time, before, after)?;
        let authoritative = codec::decode_entity(server.value)?;

        let delta = (authoritative.position - local.position).abs();
        let drifted = delta.x > RECONCILIATION_THRESHOLD || delta.y > RECONCILIATION_THRESHOLD;
        // one-directional: an effect the server already ended is tolerated
        let missed_effect = StatusEffectType::ALL
            .into_iter()
            .any(|kind| authoritative.effects.is_active(kind) && !local.effects.is_active(kind));

        if !(drifted || missed_effect) {
            return Ok(false);
        }

        debug!(
            "entity {} corrected at {}: delta ({:.2}, {:.2}), missed effect {}",
            self.id(),
            server.time,
            delta.x,
            delta.y,
            missed_effect
        );
        self.apply_record(&authoritative);
        Ok(true)
    }
}
