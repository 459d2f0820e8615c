mod config;
mod interpolation;
mod status;

use std::fmt;

use glam::DVec2;
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result, SimError};
use crate::net::codec::{self, EntityRecord};
use crate::simulation::Command;

pub use config::EntityConfig;
pub use interpolation::RECONCILIATION_THRESHOLD;
pub use status::{StatusEffect, StatusEffectType, StatusEffects};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl EntityId {
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    Player { command: Command },
    Npc,
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    name: String,
    kind: EntityKind,
    pub position: DVec2,
    /// Own movement only, pushback is applied on top in `move_by`.
    pub velocity: DVec2,
    effects: StatusEffects,
    config: EntityConfig,
}

impl Entity {
    pub fn player(id: EntityId, name: impl Into<String>, position: DVec2, config: EntityConfig) -> Self {
        Self::with_kind(
            id,
            name.into(),
            EntityKind::Player {
                command: Command::idle(0.0),
            },
            position,
            config,
        )
    }

    pub fn npc(id: EntityId, name: impl Into<String>, position: DVec2, config: EntityConfig) -> Self {
        Self::with_kind(id, name.into(), EntityKind::Npc, position, config)
    }

    fn with_kind(
        id: EntityId,
        name: String,
        kind: EntityKind,
        position: DVec2,
        config: EntityConfig,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            position,
            velocity: DVec2::ZERO,
            effects: StatusEffects::new(),
            config,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, EntityKind::Player { .. })
    }

    pub fn command(&self) -> Option<&Command> {
        match &self.kind {
            EntityKind::Player { command } => Some(command),
            EntityKind::Npc => None,
        }
    }

    pub fn speed(&self) -> f64 {
        self.config.speed
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn effects(&self) -> &StatusEffects {
        &self.effects
    }

    pub fn status_effect(&self, kind: StatusEffectType) -> &StatusEffect {
        self.effects.get(kind)
    }

    pub fn move_by(&mut self, dt: f64) {
        self.position += self.velocity * dt;

        let pushback = self.effects.get(StatusEffectType::Pushback);
        if pushback.is_active() {
            self.position += pushback.direction * self.config.pushback_speed * dt;
        }
    }

    /// Starts `kind` at `start_time` heading along `(x, y)`. A zero vector is
    /// stored as-is, meaning "no direction".
    pub fn apply_status_effect(
        &mut self,
        kind: StatusEffectType,
        start_time: f64,
        x: f64,
        y: f64,
        duration: Option<f64>,
    ) {
        let duration = duration.unwrap_or_else(|| self.config.duration_for(kind));
        let direction = DVec2::new(x, y).normalize_or_zero();
        self.effects
            .set(kind, StatusEffect::new(start_time, duration, direction));
    }

    pub fn reset_status_effect(&mut self, kind: StatusEffectType) {
        self.effects.reset(kind);
    }

    pub fn expire_status_effects(&mut self, now: f64) {
        self.effects.expire(now);
    }

    pub fn set_command(&mut self, next: Command) -> Result<()> {
        match &mut self.kind {
            EntityKind::Player { command } => {
                *command = next;
                Ok(())
            }
            EntityKind::Npc => Err(SimError::NotAPlayer(self.id)),
        }
    }

    /// Stores `command` and applies it at simulation time `now`.
    pub fn apply_command(&mut self, command: &Command, now: f64) -> Result<()> {
        self.set_command(*command)?;
        self.apply_current_command(now);
        Ok(())
    }

    pub fn apply_current_command(&mut self, now: f64) {
        let Some(command) = self.command().copied() else {
            return;
        };

        self.velocity = command.velocity;

        let dir = command.direction;
        if command.attack_requested() && !self.effects.is_active(StatusEffectType::Attack) {
            self.apply_status_effect(StatusEffectType::Attack, now, dir.x, dir.y, None);
        }
        if command.block_requested() && !self.effects.is_active(StatusEffectType::Block) {
            self.apply_status_effect(StatusEffectType::Block, now, dir.x, dir.y, None);
        }
    }

    pub fn record(&self) -> EntityRecord {
        EntityRecord {
            position: self.position,
            velocity: self.velocity,
            effects: self.effects,
        }
    }

    pub fn apply_record(&mut self, record: &EntityRecord) {
        self.position = record.position;
        self.velocity = record.velocity;
        self.effects = record.effects;
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode_entity(&self.record())
    }

    pub fn update_from_bytes(&mut self, bytes: &[u8]) -> std::result::Result<(), DecodeError> {
        let record = codec::decode_entity(bytes)?;
        self.apply_record(&record);
        Ok(())
    }
}
