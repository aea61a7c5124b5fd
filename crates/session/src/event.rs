//! Events routed through the dispatch table.

use std::fmt;

use torchat_net_peers::{ConnectionId, Lifecycle};
use torchat_primitives::{OnionId, Packet, PacketKind};

/// Dispatch key. Packets are keyed by their kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    Packet(PacketKind),
    Connection,
    Verification,
    Disconnection,
    /// An unowned connection was accepted by the listener.
    Incoming,
    /// A peer started dialing.
    Outgoing,
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Packet(kind) => fmt::Display::fmt(kind, f),
            Self::Connection => f.write_str("connection"),
            Self::Verification => f.write_str("verification"),
            Self::Disconnection => f.write_str("disconnection"),
            Self::Incoming => f.write_str("incoming"),
            Self::Outgoing => f.write_str("outgoing"),
        }
    }
}

impl From<PacketKind> for EventTag {
    fn from(kind: PacketKind) -> Self {
        Self::Packet(kind)
    }
}

/// A packet together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundPacket {
    pub packet: Packet,
    /// Owner of the connection it arrived on, if the connection is owned.
    pub sender: Option<OnionId>,
    pub connection: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Packet(InboundPacket),
    Connection(OnionId),
    Verification(OnionId),
    Disconnection(OnionId),
    Incoming(ConnectionId),
    Outgoing { peer: OnionId, connection: ConnectionId },
}

impl Event {
    pub fn tag(&self) -> EventTag {
        match self {
            Self::Packet(inbound) => EventTag::Packet(inbound.packet.kind()),
            Self::Connection(_) => EventTag::Connection,
            Self::Verification(_) => EventTag::Verification,
            Self::Disconnection(_) => EventTag::Disconnection,
            Self::Incoming(_) => EventTag::Incoming,
            Self::Outgoing { .. } => EventTag::Outgoing,
        }
    }

    /// The peer this event concerns: the subject of a lifecycle event or the
    /// sender of a packet.
    pub fn peer(&self) -> Option<&OnionId> {
        match self {
            Self::Packet(inbound) => inbound.sender.as_ref(),
            Self::Connection(peer)
            | Self::Verification(peer)
            | Self::Disconnection(peer)
            | Self::Outgoing { peer, .. } => Some(peer),
            Self::Incoming(_) => None,
        }
    }

    pub fn packet(&self) -> Option<&InboundPacket> {
        match self {
            Self::Packet(inbound) => Some(inbound),
            _ => None,
        }
    }
}

impl From<Lifecycle> for Event {
    fn from(lifecycle: Lifecycle) -> Self {
        match lifecycle {
            Lifecycle::Outgoing { peer, connection } => Self::Outgoing { peer, connection },
            Lifecycle::Connection(peer) => Self::Connection(peer),
            Lifecycle::Verification(peer) => Self::Verification(peer),
            Lifecycle::Disconnection(peer) => Self::Disconnection(peer),
        }
    }
}

impl From<InboundPacket> for Event {
    fn from(inbound: InboundPacket) -> Self {
        Self::Packet(inbound)
    }
}
