use crate::entity::EntityId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("{kind} buffer has {actual} bytes, expected {expected}")]
    Length {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("message does not start with a valid simulation time")]
    InvalidTime,
    #[error("status effect slot {slot} carries type tag {tag}")]
    EffectTypeMismatch { slot: usize, tag: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConsistencyViolation {
    #[error("server referenced time {server_time} which is outside all buffered local snapshots")]
    UnrecordedPast { server_time: f64 },
    #[error("reconciliation requires {before} <= {server} <= {after}")]
    OutOfOrder { before: f64, server: f64, after: f64 },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("consistency violation: {0}")]
    Consistency(#[from] ConsistencyViolation),
    #[error("entity with id {0} not found")]
    UnknownEntity(EntityId),
    #[error("entity {0} is not a player")]
    NotAPlayer(EntityId),
    #[error("entity id {0} is spawned more than once")]
    DuplicateEntity(EntityId),
}

impl SimError {
    pub fn is_decode(&self) -> bool {
        matches!(self, SimError::Decode(_))
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
