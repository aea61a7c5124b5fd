//! Tokio runtime glue for torchat.
//!
//! [`TokioNetwork`] dials peers through a SOCKS5 proxy and accepts connections
//! forwarded by the hidden service. Connection tasks report to the
//! [`reactor`], which is the only place the session is touched.
//! [`Torchat`] ties configuration, network and reactor together.

mod connection;
mod error;
mod network;
pub mod reactor;
pub mod socks;
mod torchat;

pub use connection::ConnectionHandle;
pub use error::NodeError;
pub use network::TokioNetwork;
pub use reactor::ReactorEvent;
pub use socks::SocksError;
pub use torchat::Torchat;
