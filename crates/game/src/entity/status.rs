use glam::DVec2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusEffectType {
    Attack = 0,
    Block = 1,
    Pushback = 2,
}

impl StatusEffectType {
    pub const COUNT: usize = 3;
    pub const ALL: [StatusEffectType; Self::COUNT] = [Self::Attack, Self::Block, Self::Pushback];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// One status effect slot. `duration <= 0` means the slot is empty.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusEffect {
    pub start_time: f64,
    pub duration: f64,
    pub direction: DVec2,
}

impl StatusEffect {
    pub const INACTIVE: StatusEffect = StatusEffect {
        start_time: 0.0,
        duration: 0.0,
        direction: DVec2::ZERO,
    };

    pub fn new(start_time: f64, duration: f64, direction: DVec2) -> Self {
        Self {
            start_time,
            duration,
            direction,
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.duration > 0.0
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Active and not yet over at `time`.
    pub fn covers(&self, time: f64) -> bool {
        self.is_active() && self.end_time() >= time
    }

    /// Active and `time` lies inside `[start, end]`.
    pub fn is_running_at(&self, time: f64) -> bool {
        self.is_active() && self.start_time <= time && time <= self.end_time()
    }

    pub fn has_expired(&self, now: f64) -> bool {
        self.is_active() && self.end_time() < now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StatusEffects([StatusEffect; StatusEffectType::COUNT]);

impl StatusEffects {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn get(&self, kind: StatusEffectType) -> &StatusEffect {
        &self.0[kind.index()]
    }

    pub fn set(&mut self, kind: StatusEffectType, effect: StatusEffect) {
        self.0[kind.index()] = if effect.is_active() {
            effect
        } else {
            StatusEffect::INACTIVE
        };
    }

    pub fn reset(&mut self, kind: StatusEffectType) {
        self.0[kind.index()] = StatusEffect::INACTIVE;
    }

    pub fn is_active(&self, kind: StatusEffectType) -> bool {
        self.get(kind).is_active()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StatusEffectType, &StatusEffect)> {
        StatusEffectType::ALL.into_iter().zip(self.0.iter())
    }

    /// Empties every slot whose effect ended before `now`.
    pub fn expire(&mut self, now: f64) {
        for slot in &mut self.0 {
            if slot.has_expired(now) {
                *slot = StatusEffect::INACTIVE;
            }
        }
    }
}
