use glam::DVec2;
use indexmap::IndexMap;
use log::warn;

use crate::entity::{Entity, EntityConfig, EntityId, StatusEffectType};
use crate::error::{DecodeError, Result, SimError};
use crate::map::MapBounds;
use crate::net::codec::{self, ENTITY_BYTES, WORLD_HEADER_BYTES};
use crate::session::{SessionInit, SpawnKind};
use crate::snapshot::{TimePoint, TimeSeriesBuffer};

use super::Command;

/// Squared attack reach (20 units).
pub const HIT_RADIUS_SQ: f64 = 400.0;

/// What the render collaborator needs to draw one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityView {
    pub id: EntityId,
    pub position: DVec2,
    pub velocity: DVec2,
    pub facing: DVec2,
    pub active_effects: Vec<StatusEffectType>,
}

#[derive(Debug)]
pub struct Simulation {
    pub(super) time: f64,
    pub(super) entities: IndexMap<EntityId, Entity>,
    map: MapBounds,
    pub(super) local_player: Option<(EntityId, usize)>,
    pub(super) authoritative_snapshots: TimeSeriesBuffer,
    pub(super) local_snapshots: TimeSeriesBuffer,
    pub(super) local_commands: TimeSeriesBuffer,
    pub(super) server_delay_estimate: f64,
    config: EntityConfig,
}

impl Simulation {
    pub fn new(init: &SessionInit, local_player: Option<EntityId>, config: EntityConfig) -> Result<Self> {
        let map = MapBounds::from_points(&init.map_boundary);

        let mut entities = IndexMap::with_capacity(init.entities.len());
        for spawn in &init.entities {
            let position = DVec2::from_array(spawn.initial);
            if !map.contains(position) {
                warn!("entity {} ({}) spawns outside the map at {:?}", spawn.id, spawn.name, position);
            }
            let id = spawn.entity_id();
            let entity = match spawn.kind {
                SpawnKind::Player => Entity::player(id, spawn.name.clone(), position, config),
                SpawnKind::Npc => Entity::npc(id, spawn.name.clone(), position, config),
            };
            if entities.insert(id, entity).is_some() {
                return Err(SimError::DuplicateEntity(id));
            }
        }

        let local_player = match local_player {
            Some(id) => {
                let slot = entities.get_index_of(&id).ok_or(SimError::UnknownEntity(id))?;
                if !entities[slot].is_player() {
                    return Err(SimError::NotAPlayer(id));
                }
                Some((id, slot))
            }
            None => None,
        };

        Ok(Self {
            time: 0.0,
            entities,
            map,
            local_player,
            authoritative_snapshots: TimeSeriesBuffer::new(),
            local_snapshots: TimeSeriesBuffer::new(),
            local_commands: TimeSeriesBuffer::new(),
            server_delay_estimate: 0.0,
            config,
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn map(&self) -> &MapBounds {
        &self.map
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn local_player_id(&self) -> Option<EntityId> {
        self.local_player.map(|(id, _)| id)
    }

    pub fn local_player_slot(&self) -> Option<usize> {
        self.local_player.map(|(_, slot)| slot)
    }

    pub fn server_delay_estimate(&self) -> f64 {
        self.server_delay_estimate
    }

    pub fn entity(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(&id).ok_or(SimError::UnknownEntity(id))
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        self.entities.get_mut(&id).ok_or(SimError::UnknownEntity(id))
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn player_ids(&self) -> Vec<EntityId> {
        self.entities
            .values()
            .filter(|entity| entity.is_player())
            .map(Entity::id)
            .collect()
    }

    pub fn authoritative_snapshots(&self) -> &TimeSeriesBuffer {
        &self.authoritative_snapshots
    }

    pub fn local_snapshots(&self) -> &TimeSeriesBuffer {
        &self.local_snapshots
    }

    pub fn local_commands(&self) -> &TimeSeriesBuffer {
        &self.local_commands
    }

    pub fn apply_command(&mut self, id: EntityId, command: &Command) -> Result<()> {
        let now = self.time;
        self.entity_mut(id)?.apply_command(command, now)
    }

    /// Advances the world by `dt`: expire effects, resolve hits, move, tick the clock.
    pub fn progress_game_state(&mut self, dt: f64) {
        let now = self.time;
        for entity in self.entities.values_mut() {
            entity.expire_status_effects(now);
        }

        self.detect_hits();

        for entity in self.entities.values_mut() {
            entity.move_by(dt);
        }

        self.time += dt;
    }

    fn detect_hits(&mut self) {
        let now = self.time;
        let attackers: Vec<(usize, DVec2)> = self
            .entities
            .values()
            .enumerate()
            .filter(|(_, entity)| entity.status_effect(StatusEffectType::Attack).is_running_at(now))
            .map(|(index, entity)| (index, entity.position))
            .collect();

        let mut hits = Vec::new();
        for (attacker, origin) in &attackers {
            for (index, target) in self.entities.values().enumerate() {
                if index == *attacker {
                    continue;
                }
                let offset = target.position - *origin;
                if offset.length_squared() <= HIT_RADIUS_SQ {
                    hits.push((index, offset));
                }
            }
        }

        let duration = self.config.pushback_duration_ms;
        for (index, offset) in hits {
            if let Some((_, target)) = self.entities.get_index_mut(index) {
                target.apply_status_effect(
                    StatusEffectType::Pushback,
                    now,
                    offset.x,
                    offset.y,
                    Some(duration),
                );
            }
        }
    }

    pub fn entity_byte_len(&self) -> usize {
        ENTITY_BYTES
    }

    pub fn byte_len(&self) -> usize {
        codec::world_byte_len(self.entities.len())
    }

    /// `[time, entity_0 .. entity_n]` in construction order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.byte_len());
        bytes.extend_from_slice(&codec::encode_time(self.time));
        for entity in self.entities.values() {
            bytes.extend_from_slice(&entity.to_bytes());
        }
        bytes
    }

    pub fn check_world_len(&self, bytes: &[u8]) -> std::result::Result<(), DecodeError> {
        if bytes.len() != self.byte_len() {
            return Err(DecodeError::Length {
                kind: "world",
                expected: self.byte_len(),
                actual: bytes.len(),
            });
        }
        Ok(())
    }

    /// Overwrites the clock and every entity. Nothing is applied unless the
    /// whole buffer decodes.
    pub fn update_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.check_world_len(bytes)?;
        let time = codec::message_time(bytes)?;

        let records = bytes[WORLD_HEADER_BYTES..]
            .chunks_exact(ENTITY_BYTES)
            .map(codec::decode_entity)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.time = time;
        for (entity, record) in self.entities.values_mut().zip(&records) {
            entity.apply_record(record);
        }
        Ok(())
    }

    /// Moves every entity except `local_id` to its authoritative view at
    /// `time - delay`, using the two newest authoritative snapshots.
    pub fn interpolate_non_local_entities(&mut self, delay: f64, local_id: Option<EntityId>) -> Result<()> {
        let Some((older, newer)) = self.authoritative_snapshots.two_latest() else {
            return Ok(());
        };
        let target = self.time - delay;

        for (slot, entity) in self.entities.values_mut().enumerate() {
            if Some(entity.id()) == local_id {
                continue;
            }
            let before = TimePoint::new(older.time, codec::entity_slice(&older.value, slot)?);
            let after = TimePoint::new(newer.time, codec::entity_slice(&newer.value, slot)?);
            entity.interpolate_from_buffers(target, before, after)?;
        }
        Ok(())
    }

    pub fn visual_state(&self, id: EntityId) -> Result<EntityView> {
        let entity = self.entity(id)?;
        let facing = entity
            .command()
            .map(|command| command.direction)
            .unwrap_or(DVec2::ZERO);
        let active_effects = entity
            .effects()
            .iter()
            .filter(|(_, effect)| effect.is_running_at(self.time))
            .map(|(kind, _)| kind)
            .collect();

        Ok(EntityView {
            id,
            position: entity.position,
            velocity: entity.velocity,
            facing,
            active_effects,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::EntitySpawn;

    fn arena() -> Vec<[f64; 2]> {
        vec![[100.0, 100.0], [100.0, 900.0], [900.0, 900.0], [900.0, 100.0]]
    }

    fn four_entities() -> SessionInit {
        SessionInit::ring(arena(), &["0", "1"], &["2", "3"])
    }

    fn simulation() -> Simulation {
        Simulation::new(&four_entities(), Some(EntityId(0)), EntityConfig::default()).unwrap()
    }

    #[test]
    fn starts_at_zero() {
        let sim = simulation();
        assert_eq!(sim.time(), 0.0);
        assert_eq!(sim.player_ids(), vec![EntityId(0), EntityId(1)]);
        assert_eq!(sim.entity_count(), 4);
        assert_eq!(sim.entity_byte_len(), 152);
        assert_eq!(sim.byte_len(), 616);
        assert_eq!(sim.local_player_slot(), Some(0));
    }

    #[test]
    fn progress_advances_clock() {
        let mut sim = simulation();
        sim.progress_game_state(10.0);
        sim.progress_game_state(17.0);
        assert_eq!(sim.time(), 27.0);
    }

    #[test]
    fn commands_persist_between_steps() {
        let mut sim = simulation();
        let right = Command {
            time: 0.0,
            velocity: DVec2::new(20.0, 0.0),
            ..Default::default()
        };
        let start = sim.entity(EntityId(0)).unwrap().position;
        sim.apply_command(EntityId(0), &right).unwrap();

        sim.progress_game_state(1.0);
        sim.progress_game_state(1.0);
        let end = sim.entity(EntityId(0)).unwrap().position;
        assert!((end - start - DVec2::new(40.0, 0.0)).length() < 1e-9);
    }

    #[test]
    fn unknown_entity_is_a_lookup_error() {
        let sim = simulation();
        assert!(matches!(sim.entity(EntityId(42)), Err(SimError::UnknownEntity(EntityId(42)))));
        assert!(matches!(
            Simulation::new(&four_entities(), Some(EntityId(2)), EntityConfig::default()),
            Err(SimError::NotAPlayer(EntityId(2)))
        ));
    }

    #[test]
    fn duplicate_spawn_ids_are_rejected() {
        let init = SessionInit::new(arena())
            .with_entity(EntitySpawn::player(0, "first", [300.0, 300.0]))
            .with_entity(EntitySpawn::npc(0, "second", [400.0, 300.0]));
        assert!(matches!(
            Simulation::new(&init, None, EntityConfig::default()),
            Err(SimError::DuplicateEntity(EntityId(0)))
        ));
    }

    #[test]
    fn attack_pushes_nearby_entities() {
        let init = SessionInit::new(arena())
            .with_entity(EntitySpawn::player(0, "attacker", [300.0, 300.0]))
            .with_entity(EntitySpawn::player(1, "near", [310.0, 300.0]))
            .with_entity(EntitySpawn::npc(2, "far", [330.0, 300.0]));
        let mut sim = Simulation::new(&init, None, EntityConfig::default()).unwrap();

        let attack = Command {
            time: 0.0,
            direction: DVec2::new(0.0, -1.0),
            actions: crate::simulation::Actions::ATTACK,
            ..Default::default()
        };
        sim.apply_command(EntityId(0), &attack).unwrap();
        sim.progress_game_state(1.0);

        let near = sim.entity(EntityId(1)).unwrap();
        let pushback = near.status_effect(StatusEffectType::Pushback);
        assert!(pushback.is_active());
        assert_eq!(pushback.duration, 1000.0);
        assert_eq!(pushback.start_time, 0.0);
        // facing is ignored, the push runs from attacker to target
        assert_eq!(pushback.direction, DVec2::X);
        assert!((near.position.x - 350.0).abs() < 1e-9);

        assert!(!sim.entity(EntityId(2)).unwrap().effects().is_active(StatusEffectType::Pushback));
        assert!(!sim.entity(EntityId(0)).unwrap().effects().is_active(StatusEffectType::Pushback));
    }

    #[test]
    fn expired_attack_cannot_hit() {
        let init = SessionInit::new(arena())
            .with_entity(EntitySpawn::player(0, "attacker", [300.0, 300.0]))
            .with_entity(EntitySpawn::npc(1, "near", [305.0, 300.0]));
        let mut sim = Simulation::new(&init, None, EntityConfig::default()).unwrap();

        sim.entity_mut(EntityId(0)).unwrap().apply_status_effect(
            StatusEffectType::Attack,
            0.0,
            1.0,
            0.0,
            Some(10.0),
        );
        sim.progress_game_state(20.0);
        sim.entity_mut(EntityId(1)).unwrap().reset_status_effect(StatusEffectType::Pushback);

        sim.progress_game_state(1.0);
        assert!(!sim.entity(EntityId(0)).unwrap().effects().is_active(StatusEffectType::Attack));
        assert!(!sim.entity(EntityId(1)).unwrap().effects().is_active(StatusEffectType::Pushback));
    }

    #[test]
    fn whole_world_roundtrip() {
        let mut sim = simulation();
        sim.entity_mut(EntityId(2)).unwrap().velocity = DVec2::new(-3.0, 8.5);
        sim.progress_game_state(12.0);
        let before: Vec<_> = sim.entities().map(|e| (e.position, e.velocity)).collect();

        let bytes = sim.to_bytes();
        assert_eq!(bytes.len(), 616);
        sim.progress_game_state(100.0);
        sim.update_from_bytes(&bytes).unwrap();

        let after: Vec<_> = sim.entities().map(|e| (e.position, e.velocity)).collect();
        assert_eq!(before, after);
        assert_eq!(sim.time(), 12.0);
    }

    #[test]
    fn malformed_world_is_not_applied() {
        let mut sim = simulation();
        let mut bytes = sim.to_bytes();
        bytes.truncate(bytes.len() - 1);
        let position = sim.entity(EntityId(1)).unwrap().position;

        assert!(sim.update_from_bytes(&bytes).unwrap_err().is_decode());
        assert_eq!(sim.entity(EntityId(1)).unwrap().position, position);
    }

    #[test]
    fn interpolation_skips_local_player() {
        let mut host = Simulation::new(&four_entities(), None, EntityConfig::default()).unwrap();
        let mut client = simulation();

        host.entity_mut(EntityId(1)).unwrap().velocity = DVec2::new(1.0, 0.0);
        host.entity_mut(EntityId(0)).unwrap().velocity = DVec2::new(0.0, 1.0);
        let first = host.to_bytes();
        host.progress_game_state(100.0);
        let second = host.to_bytes();
        client.authoritative_snapshots.insert(0.0, first);
        client.authoritative_snapshots.insert(100.0, second);

        client.time = 150.0;
        let local_before = client.entity(EntityId(0)).unwrap().position;
        client.interpolate_non_local_entities(100.0, Some(EntityId(0))).unwrap();

        assert_eq!(client.entity(EntityId(0)).unwrap().position, local_before);
        let remote = client.entity(EntityId(1)).unwrap();
        let expected = host.entity(EntityId(1)).unwrap().position - DVec2::new(50.0, 0.0);
        assert!((remote.position - expected).length() < 1e-9);
    }

    #[test]
    fn visual_state_lists_running_effects() {
        let mut sim = simulation();
        let block = Command {
            time: 0.0,
            direction: DVec2::new(1.0, 0.0),
            actions: crate::simulation::Actions::BLOCK,
            ..Default::default()
        };
        sim.apply_command(EntityId(0), &block).unwrap();

        let view = sim.visual_state(EntityId(0)).unwrap();
        assert_eq!(view.facing, DVec2::X);
        assert_eq!(view.active_effects, vec![StatusEffectType::Block]);
    }
}
