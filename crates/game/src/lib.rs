pub mod entity;
pub mod error;
pub mod map;
pub mod net;
pub mod session;
pub mod simulation;
pub mod snapshot;

pub use entity::{
    Entity, EntityConfig, EntityId, EntityKind, StatusEffect, StatusEffectType, StatusEffects,
};
pub use error::{ConsistencyViolation, DecodeError, Result, SimError};
pub use map::MapBounds;
pub use net::{
    ClientConfig, ClientSession, ClientTransport, HostSession, HostTransport, InputSource,
    LinkSimulation, loopback,
};
pub use session::{EntitySpawn, InitError, SessionInit, SpawnKind};
pub use simulation::{
    Actions, Command, EntityView, InputSample, Simulation, TickConfig, TickScheduler,
};
pub use snapshot::{TimePoint, TimeSeriesBuffer};
