//! Fixed-stride encoding of entity and command records into flat buffers of
//! little-endian `f64` slots. Every message starts with its simulation time
//! in slot 0.

use glam::DVec2;

use crate::entity::{StatusEffect, StatusEffectType, StatusEffects};
use crate::error::DecodeError;
use crate::simulation::{Actions, Command};

pub const SLOT_BYTES: usize = 8;

/// `[start_time, duration, type_index, dir_x, dir_y]`
pub const STATUS_EFFECT_SLOTS: usize = 5;
/// `[pos_x, pos_y, vel_x, vel_y]` followed by one block per status effect type.
pub const ENTITY_SLOTS: usize = 4 + STATUS_EFFECT_SLOTS * StatusEffectType::COUNT;
pub const ENTITY_BYTES: usize = ENTITY_SLOTS * SLOT_BYTES;

/// `[time, dir_x, dir_y, vel_x, vel_y, attack, block]`
pub const COMMAND_SLOTS: usize = 7;
pub const COMMAND_BYTES: usize = COMMAND_SLOTS * SLOT_BYTES;

/// A whole-world snapshot starts with one slot holding the simulation time.
pub const WORLD_HEADER_BYTES: usize = SLOT_BYTES;

/// The wire-visible part of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntityRecord {
    pub position: DVec2,
    pub velocity: DVec2,
    pub effects: StatusEffects,
}

fn write_slots(slots: &[f64]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(slots.len() * SLOT_BYTES);
    for slot in slots {
        bytes.extend_from_slice(&slot.to_le_bytes());
    }
    bytes
}

fn read_slots<const N: usize>(bytes: &[u8], kind: &'static str) -> Result<[f64; N], DecodeError> {
    let expected = N * SLOT_BYTES;
    if bytes.len() != expected {
        return Err(DecodeError::Length {
            kind,
            expected,
            actual: bytes.len(),
        });
    }

    let mut slots = [0.0; N];
    for (slot, chunk) in slots.iter_mut().zip(bytes.chunks_exact(SLOT_BYTES)) {
        let mut raw = [0u8; SLOT_BYTES];
        raw.copy_from_slice(chunk);
        *slot = f64::from_le_bytes(raw);
    }
    Ok(slots)
}

pub fn encode_entity(record: &EntityRecord) -> Vec<u8> {
    let mut slots = [0.0; ENTITY_SLOTS];
    slots[0] = record.position.x;
    slots[1] = record.position.y;
    slots[2] = record.velocity.x;
    slots[3] = record.velocity.y;

    for (kind, effect) in record.effects.iter() {
        if !effect.is_active() {
            continue;
        }
        let base = 4 + kind.index() * STATUS_EFFECT_SLOTS;
        slots[base] = effect.start_time;
        slots[base + 1] = effect.duration;
        slots[base + 2] = kind.index() as f64;
        slots[base + 3] = effect.direction.x;
        slots[base + 4] = effect.direction.y;
    }

    write_slots(&slots)
}

pub fn decode_entity(bytes: &[u8]) -> Result<EntityRecord, DecodeError> {
    let slots = read_slots::<ENTITY_SLOTS>(bytes, "entity")?;

    let mut effects = StatusEffects::new();
    for kind in StatusEffectType::ALL {
        let base = 4 + kind.index() * STATUS_EFFECT_SLOTS;
        let duration = slots[base + 1];
        if duration <= 0.0 || duration.is_nan() {
            continue;
        }
        let tag = slots[base + 2];
        if tag != kind.index() as f64 {
            return Err(DecodeError::EffectTypeMismatch {
                slot: kind.index(),
                tag,
            });
        }
        effects.set(
            kind,
            StatusEffect::new(
                slots[base],
                duration,
                DVec2::new(slots[base + 3], slots[base + 4]),
            ),
        );
    }

    Ok(EntityRecord {
        position: DVec2::new(slots[0], slots[1]),
        velocity: DVec2::new(slots[2], slots[3]),
        effects,
    })
}

pub fn encode_command(command: &Command) -> Vec<u8> {
    write_slots(&[
        command.time,
        command.direction.x,
        command.direction.y,
        command.velocity.x,
        command.velocity.y,
        flag(command.actions.contains(Actions::ATTACK)),
        flag(command.actions.contains(Actions::BLOCK)),
    ])
}

pub fn decode_command(bytes: &[u8]) -> Result<Command, DecodeError> {
    let slots = read_slots::<COMMAND_SLOTS>(bytes, "command")?;

    let mut actions = Actions::empty();
    actions.set(Actions::ATTACK, slots[5] > 0.0);
    actions.set(Actions::BLOCK, slots[6] > 0.0);

    Ok(Command {
        time: slots[0],
        direction: DVec2::new(slots[1], slots[2]),
        velocity: DVec2::new(slots[3], slots[4]),
        actions,
    })
}

#[inline]
fn flag(value: bool) -> f64 {
    if value { 1.0 } else { 0.0 }
}

/// Reads the simulation time every message carries in its first slot.
pub fn message_time(bytes: &[u8]) -> Result<f64, DecodeError> {
    let Some(head) = bytes.get(..SLOT_BYTES) else {
        return Err(DecodeError::InvalidTime);
    };
    let mut raw = [0u8; SLOT_BYTES];
    raw.copy_from_slice(head);
    let time = f64::from_le_bytes(raw);
    if time.is_nan() {
        return Err(DecodeError::InvalidTime);
    }
    Ok(time)
}

pub fn world_byte_len(entity_count: usize) -> usize {
    WORLD_HEADER_BYTES + entity_count * ENTITY_BYTES
}

/// Byte range of the entity at `slot` inside a whole-world snapshot.
pub fn entity_slice(snapshot: &[u8], slot: usize) -> Result<&[u8], DecodeError> {
    let start = WORLD_HEADER_BYTES + slot * ENTITY_BYTES;
    snapshot
        .get(start..start + ENTITY_BYTES)
        .ok_or(DecodeError::Length {
            kind: "world",
            expected: start + ENTITY_BYTES,
            actual: snapshot.len(),
        })
}

pub fn encode_time(time: f64) -> [u8; SLOT_BYTES] {
    time.to_le_bytes()
}
