mod command;
mod reconcile;
mod tick;
mod world;

pub use command::{Actions, Command, InputSample};
pub use reconcile::{HISTORY_WINDOW_MS, RECONCILIATION_GRACE_MS};
pub use tick::{LOOKAHEAD_MS, TickConfig, TickScheduler};
pub use world::{EntityView, HIT_RADIUS_SQ, Simulation};
