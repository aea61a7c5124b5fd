//! Peer connection lifecycle and the address registry.
//!
//! The socket layer sits behind [`Transport`] and [`Network`]; everything here
//! is synchronous and single-threaded.

mod error;
mod link;
mod peer;
mod registry;
mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{PeerError, RegistryError, TransportError};
pub use link::{Lifecycle, PeerLink};
pub use peer::Peer;
pub use registry::AddressRegistry;
pub use transport::{ConnectionId, Direction, Endpoint, ListenerId, Network, Transport};
