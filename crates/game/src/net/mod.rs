pub mod codec;
mod client;
mod host;
pub mod transport;

pub use client::{ClientConfig, ClientSession, ClientStats, InputSource};
pub use host::{HostSession, HostStats};
pub use transport::{
    ClientTransport, HostTransport, LinkSimulation, LinkStats, LoopbackClient, LoopbackHost,
    loopback,
};
