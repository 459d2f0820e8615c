//! One-off session description every participant builds its `Simulation`
//! from. Slot order on the wire is the order of `entities`.

use rkyv::{Archive, Deserialize, Serialize, rancor};

use crate::entity::EntityId;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Archive,
    Serialize,
    Deserialize,
    serde::Serialize,
    serde::Deserialize,
)]
#[rkyv(compare(PartialEq), derive(Debug))]
pub enum SpawnKind {
    Player,
    Npc,
}

#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize)]
#[rkyv(derive(Debug))]
pub struct EntitySpawn {
    pub id: u32,
    pub name: String,
    pub initial: [f64; 2],
    pub kind: SpawnKind,
}

impl EntitySpawn {
    pub fn player(id: u32, name: impl Into<String>, initial: [f64; 2]) -> Self {
        Self {
            id,
            name: name.into(),
            initial,
            kind: SpawnKind::Player,
        }
    }

    pub fn npc(id: u32, name: impl Into<String>, initial: [f64; 2]) -> Self {
        Self {
            id,
            name: name.into(),
            initial,
            kind: SpawnKind::Npc,
        }
    }

    pub fn entity_id(&self) -> EntityId {
        EntityId(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize)]
#[rkyv(derive(Debug))]
pub struct SessionInit {
    pub map_boundary: Vec<[f64; 2]>,
    pub entities: Vec<EntitySpawn>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("serialization failed: {0}")]
    Serialize(rancor::Error),
    #[error("deserialization failed: {0}")]
    Deserialize(rancor::Error),
}

impl SessionInit {
    pub const RING_CENTER: [f64; 2] = [500.0, 300.0];
    pub const RING_RADIUS: f64 = 100.0;

    pub fn new(map_boundary: Vec<[f64; 2]>) -> Self {
        Self {
            map_boundary,
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, spawn: EntitySpawn) -> Self {
        self.entities.push(spawn);
        self
    }

    /// Spreads `players` then `npcs` evenly on a circle round the arena centre.
    pub fn ring(map_boundary: Vec<[f64; 2]>, players: &[&str], npcs: &[&str]) -> Self {
        let total = players.len() + npcs.len();
        let step = std::f64::consts::TAU / total.max(1) as f64;
        let [cx, cy] = Self::RING_CENTER;

        let mut init = Self::new(map_boundary);
        let names = players
            .iter()
            .map(|name| (*name, SpawnKind::Player))
            .chain(npcs.iter().map(|name| (*name, SpawnKind::Npc)));
        for (index, (name, kind)) in names.enumerate() {
            let angle = step * index as f64;
            init.entities.push(EntitySpawn {
                id: index as u32,
                name: name.to_string(),
                initial: [
                    cx + Self::RING_RADIUS * angle.cos(),
                    cy + Self::RING_RADIUS * angle.sin(),
                ],
                kind,
            });
        }
        init
    }

    pub fn player_ids(&self) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|spawn| spawn.kind == SpawnKind::Player)
            .map(EntitySpawn::entity_id)
            .collect()
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, InitError> {
        rkyv::to_bytes::<rancor::Error>(self)
            .map(|aligned| aligned.into_vec())
            .map_err(InitError::Serialize)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, InitError> {
        let mut aligned = rkyv::util::AlignedVec::<16>::with_capacity(data.len());
        aligned.extend_from_slice(data);
        rkyv::from_bytes::<Self, rancor::Error>(&aligned).map_err(InitError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Vec<[f64; 2]> {
        vec![[100.0, 100.0], [100.0, 900.0], [900.0, 900.0], [900.0, 100.0]]
    }

    #[test]
    fn ring_layout() {
        let init = SessionInit::ring(arena(), &["a", "b"], &["c", "d"]);

        assert_eq!(init.entities.len(), 4);
        assert_eq!(init.player_ids(), vec![EntityId(0), EntityId(1)]);
        assert_eq!(init.entities[2].kind, SpawnKind::Npc);

        let first = init.entities[0].initial;
        assert!((first[0] - 600.0).abs() < 1e-9);
        assert!((first[1] - 300.0).abs() < 1e-9);
        let third = init.entities[2].initial;
        assert!((third[0] - 400.0).abs() < 1e-9);
    }

    #[test]
    fn bytes_roundtrip() {
        let init = SessionInit::new(arena())
            .with_entity(EntitySpawn::player(7, "host", [120.0, 140.0]))
            .with_entity(EntitySpawn::npc(9, "crab", [300.0, 300.0]));

        let bytes = init.to_bytes().unwrap();
        assert_eq!(SessionInit::from_bytes(&bytes).unwrap(), init);
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(SessionInit::from_bytes(&[0xff; 3]).is_err());
    }
}
