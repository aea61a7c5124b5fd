//! Event-driven orchestration of torchat peers.
//!
//! An [`Orchestrator`] routes transport signals and decoded packets to
//! handlers registered per [`EventTag`]. [`Session`] and [`Server`] are the two
//! roles built on it: both run the ping/pong handshake, only a session pushes
//! its own profile.

pub mod config;
pub mod constants;
mod dispatch;
mod error;
mod event;
mod handlers;
mod orchestrator;
mod server;
mod session;
mod timers;

pub use config::{Config, ConfigError};
pub use dispatch::Handler;
pub use error::SessionError;
pub use event::{Event, EventTag, InboundPacket};
pub use orchestrator::Orchestrator;
pub use server::Server;
pub use session::Session;
pub use timers::TimerId;
