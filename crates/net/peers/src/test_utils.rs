//! In-memory transport and network that record everything into a shared [`Wire`].

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use torchat_primitives::{OnionId, Packet, PacketKind};

use crate::error::TransportError;
use crate::link::PeerLink;
use crate::transport::{ConnectionId, Direction, Endpoint, ListenerId, Network, Transport};

/// A packet handed to a mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub connection: ConnectionId,
    pub packet: Packet,
    pub forced: bool,
}

/// Everything the mocks observed.
#[derive(Debug, Default)]
pub struct Wire {
    next_id: u64,
    pub sent: Vec<Sent>,
    pub closed: Vec<ConnectionId>,
    pub verified: Vec<ConnectionId>,
    pub dials: Vec<(OnionId, ConnectionId)>,
    pub listening: Vec<(Endpoint, ListenerId)>,
    pub unlistened: Vec<ListenerId>,
    pub fail_dials: bool,
    /// Every transport send fails with [`TransportError::Closed`].
    pub fail_sends: bool,
}

pub type SharedWire = Rc<RefCell<Wire>>;

impl Wire {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Packets sent on one connection, in order.
    pub fn packets(&self, connection: ConnectionId) -> Vec<Packet> {
        self.sent
            .iter()
            .filter(|s| s.connection == connection)
            .map(|s| s.packet.clone())
            .collect()
    }

    pub fn count(&self, connection: ConnectionId, kind: PacketKind) -> usize {
        self.sent
            .iter()
            .filter(|s| s.connection == connection && s.packet.kind() == kind)
            .count()
    }

    /// Connection of the most recent dial to `target`.
    pub fn dialed(&self, target: &OnionId) -> Option<ConnectionId> {
        self.dials
            .iter()
            .rev()
            .find(|(id, _)| id == target)
            .map(|(_, conn)| *conn)
    }
}

#[derive(Debug)]
pub struct MockTransport {
    id: ConnectionId,
    direction: Direction,
    owner: Option<OnionId>,
    wire: SharedWire,
}

impl MockTransport {
    pub fn new(wire: &SharedWire, direction: Direction) -> Self {
        let id = ConnectionId(wire.borrow_mut().next_id());
        Self {
            id,
            direction,
            owner: None,
            wire: Rc::clone(wire),
        }
    }

    pub fn incoming(wire: &SharedWire) -> Box<dyn Transport> {
        Box::new(Self::new(wire, Direction::Incoming))
    }

    pub fn outgoing(wire: &SharedWire) -> Box<dyn Transport> {
        Box::new(Self::new(wire, Direction::Outgoing))
    }

    fn record(&self, packet: Packet, forced: bool) -> Result<(), TransportError> {
        let mut wire = self.wire.borrow_mut();
        if wire.fail_sends {
            return Err(TransportError::Closed(self.id));
        }
        wire.sent.push(Sent {
            connection: self.id,
            packet,
            forced,
        });
        Ok(())
    }
}

impl Transport for MockTransport {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn send_packet(&mut self, packet: Packet) -> Result<(), TransportError> {
        self.record(packet, false)
    }

    fn send_packet_forced(&mut self, packet: Packet) -> Result<(), TransportError> {
        self.record(packet, true)
    }

    fn notify_verification_complete(&mut self) {
        self.wire.borrow_mut().verified.push(self.id);
    }

    fn close_after_flush(&mut self) {
        self.wire.borrow_mut().closed.push(self.id);
    }

    fn set_owner(&mut self, owner: Option<OnionId>) {
        self.owner = owner;
    }

    fn owner(&self) -> Option<&OnionId> {
        self.owner.as_ref()
    }
}

#[derive(Debug)]
pub struct MockNetwork {
    wire: SharedWire,
}

impl MockNetwork {
    pub fn new() -> (Self, SharedWire) {
        let wire = SharedWire::default();
        (
            Self {
                wire: Rc::clone(&wire),
            },
            wire,
        )
    }
}

impl Network for MockNetwork {
    fn dial(
        &mut self,
        target: &OnionId,
        _proxy: &Endpoint,
        _timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError> {
        if self.wire.borrow().fail_dials {
            return Err(TransportError::Dial {
                target: target.clone(),
                reason: "refused".to_string(),
            });
        }
        let transport = MockTransport::new(&self.wire, Direction::Outgoing);
        self.wire
            .borrow_mut()
            .dials
            .push((target.clone(), transport.id));
        Ok(Box::new(transport))
    }

    fn listen(&mut self, endpoint: &Endpoint) -> Result<ListenerId, TransportError> {
        let mut wire = self.wire.borrow_mut();
        let listener = ListenerId(wire.next_id());
        wire.listening.push((endpoint.clone(), listener));
        Ok(listener)
    }

    fn unlisten(&mut self, listener: ListenerId) {
        self.wire.borrow_mut().unlistened.push(listener);
    }
}

/// A link for `own` backed by a fresh [`MockNetwork`].
pub fn mock_link(own: &str) -> (PeerLink, SharedWire) {
    let (network, wire) = MockNetwork::new();
    let address = OnionId::parse(own).unwrap_or_else(|err| panic!("{err}"));
    let link = PeerLink::new(
        address,
        Endpoint::new("127.0.0.1", 9050),
        Duration::from_secs(30),
        Box::new(network),
    );
    (link, wire)
}
