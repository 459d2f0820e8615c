use bitflags::bitflags;
use glam::DVec2;

use crate::error::DecodeError;
use crate::net::codec;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Actions: u8 {
        const ATTACK = 1 << 0;
        const BLOCK = 1 << 1;
    }
}

/// Per-frame movement and action input the input collaborator supplies.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputSample {
    pub direction: DVec2,
    pub movement: DVec2,
    pub attack: bool,
    pub block: bool,
}

/// One player's input at one simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub time: f64,
    /// Facing, used for display and attack direction only.
    pub direction: DVec2,
    /// Already scaled by the entity speed. Pushback is not included.
    pub velocity: DVec2,
    pub actions: Actions,
}

impl Command {
    pub fn idle(time: f64) -> Self {
        Self {
            time,
            ..Default::default()
        }
    }

    pub fn from_input(time: f64, input: &InputSample, speed: f64) -> Self {
        let mut actions = Actions::empty();
        actions.set(Actions::ATTACK, input.attack);
        actions.set(Actions::BLOCK, input.block);

        Self {
            time,
            direction: input.direction,
            velocity: input.movement.normalize_or_zero() * speed,
            actions,
        }
    }

    #[inline]
    pub fn attack_requested(&self) -> bool {
        self.actions.contains(Actions::ATTACK)
    }

    #[inline]
    pub fn block_requested(&self) -> bool {
        self.actions.contains(Actions::BLOCK)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode_command(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        codec::decode_command(bytes)
    }
}
