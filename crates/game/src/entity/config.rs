use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub speed: f64,
    pub pushback_speed: f64,

    pub attack_duration_ms: f64,
    pub block_duration_ms: f64,
    pub pushback_duration_ms: f64,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            speed: 20.0,
            pushback_speed: 40.0,
            attack_duration_ms: 500.0,
            block_duration_ms: 1000.0,
            pushback_duration_ms: 1000.0,
        }
    }
}

impl EntityConfig {
    pub fn duration_for(&self, kind: super::StatusEffectType) -> f64 {
        match kind {
            super::StatusEffectType::Attack => self.attack_duration_ms,
            super::StatusEffectType::Block => self.block_duration_ms,
            super::StatusEffectType::Pushback => self.pushback_duration_ms,
        }
    }
}
