//! Shared context every peer transition runs against.
//!
//! A [`PeerLink`] carries what a peer needs from its owner (own address, proxy,
//! a [`Network`] to dial through) and collects the lifecycle events peers emit.
//! The owner drains [`Lifecycle`] events after each transition and dispatches
//! them, so peers never call back into their owner directly.

use std::collections::VecDeque;
use std::time::Duration;

use torchat_primitives::OnionId;

use crate::error::TransportError;
use crate::transport::{ConnectionId, Endpoint, Network, Transport};

/// Lifecycle signal emitted by a peer transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// An outgoing transport was created for the peer.
    Outgoing { peer: OnionId, connection: ConnectionId },
    Connection(OnionId),
    Verification(OnionId),
    Disconnection(OnionId),
}

impl Lifecycle {
    pub fn peer(&self) -> &OnionId {
        match self {
            Self::Outgoing { peer, .. }
            | Self::Connection(peer)
            | Self::Verification(peer)
            | Self::Disconnection(peer) => peer,
        }
    }
}

#[derive(Debug)]
pub struct PeerLink {
    address: OnionId,
    proxy: Endpoint,
    connect_timeout: Duration,
    network: Box<dyn Network>,
    emitted: VecDeque<Lifecycle>,
}

impl PeerLink {
    pub fn new(
        address: OnionId,
        proxy: Endpoint,
        connect_timeout: Duration,
        network: Box<dyn Network>,
    ) -> Self {
        Self {
            address,
            proxy,
            connect_timeout,
            network,
            emitted: VecDeque::new(),
        }
    }

    /// Our own identifier, announced in pings.
    pub fn address(&self) -> &OnionId {
        &self.address
    }

    pub fn proxy(&self) -> &Endpoint {
        &self.proxy
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn network_mut(&mut self) -> &mut dyn Network {
        self.network.as_mut()
    }

    pub(crate) fn dial(&mut self, target: &OnionId) -> Result<Box<dyn Transport>, TransportError> {
        self.network.dial(target, &self.proxy, self.connect_timeout)
    }

    pub(crate) fn emit(&mut self, event: Lifecycle) {
        self.emitted.push_back(event);
    }

    /// Next undispatched lifecycle event, oldest first.
    pub fn next_event(&mut self) -> Option<Lifecycle> {
        self.emitted.pop_front()
    }

    pub fn has_events(&self) -> bool {
        !self.emitted.is_empty()
    }
}
