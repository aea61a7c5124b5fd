//! Contract between the peer state machine and a concrete socket layer.

use std::fmt;
use std::time::Duration;

use auto_impl::auto_impl;
use strum::{AsRefStr, Display};
use torchat_primitives::{OnionId, Packet};

use crate::error::TransportError;

/// Which side initiated a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    /// Accepted by our listener.
    Incoming,
    /// Dialed by us through the proxy.
    Outgoing,
}

/// Process-unique id of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a bound listening endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Host and port pair, used for the listener and for the proxy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One wire connection as seen by its owning peer.
///
/// Implementations encode packets and write them in the background. Outgoing
/// transports hold back non-forced packets until
/// [`notify_verification_complete`](Transport::notify_verification_complete).
#[auto_impl(&mut, Box)]
pub trait Transport: fmt::Debug {
    fn id(&self) -> ConnectionId;

    fn direction(&self) -> Direction;

    /// Queue a packet, subject to the verification gate.
    fn send_packet(&mut self, packet: Packet) -> Result<(), TransportError>;

    /// Queue a packet, bypassing the verification gate.
    fn send_packet_forced(&mut self, packet: Packet) -> Result<(), TransportError>;

    /// Open the verification gate and flush held packets in order.
    fn notify_verification_complete(&mut self);

    /// Close once everything queued so far is written.
    fn close_after_flush(&mut self);

    /// Back-reference to the owning peer. `None` once orphaned.
    fn set_owner(&mut self, owner: Option<OnionId>);

    fn owner(&self) -> Option<&OnionId>;
}

/// Factory for transports and listeners.
#[auto_impl(&mut, Box)]
pub trait Network: fmt::Debug {
    /// Start a proxied dial to `target`.
    ///
    /// Returns the in-flight outgoing transport right away. Connection success
    /// or failure is reported later through the owning reactor.
    fn dial(
        &mut self,
        target: &OnionId,
        proxy: &Endpoint,
        timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError>;

    fn listen(&mut self, endpoint: &Endpoint) -> Result<ListenerId, TransportError>;

    fn unlisten(&mut self, listener: ListenerId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ConnectionId(7).to_string(), "#7");
        assert_eq!(Direction::Outgoing.to_string(), "outgoing");
        assert_eq!(Endpoint::new("127.0.0.1", 9050).to_string(), "127.0.0.1:9050");
    }
}
