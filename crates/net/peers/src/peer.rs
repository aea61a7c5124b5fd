//! Per-peer connection lifecycle.
//!
//! A [`Peer`] owns at most one incoming and one outgoing [`Transport`]. Its
//! flags move `connecting -> connected -> verified` and every transition is
//! idempotent, so duplicated or late signals are harmless. Transitions that
//! the owner must react to are pushed onto the [`PeerLink`] as [`Lifecycle`]
//! events.

use torchat_primitives::{Avatar, ClientIdentity, OnionId, Packet, Status, new_cookie};
use tracing::{debug, info, warn};

use crate::error::PeerError;
use crate::link::{Lifecycle, PeerLink};
use crate::transport::{ConnectionId, Direction, Transport};

#[derive(Debug)]
pub struct Peer {
    id: OnionId,

    connecting: bool,
    connected: bool,
    verified: bool,
    ready: bool,
    pinged: bool,

    status: Status,
    client: ClientIdentity,
    name: Option<String>,
    description: Option<String>,
    alias: Option<String>,
    avatar: Avatar,

    /// Cookie we put in our pings; the remote must echo it in a pong.
    cookie: String,
    /// Cookie from the remote's ping, answered once our outgoing flow is up.
    remote_cookie: Option<String>,

    incoming: Option<Box<dyn Transport>>,
    outgoing: Option<Box<dyn Transport>>,
}

impl Peer {
    /// Create a peer for `raw`, adopting whatever transports are supplied.
    ///
    /// Dials immediately when no outgoing transport is given.
    pub fn new(
        link: &mut PeerLink,
        raw: &str,
        incoming: Option<Box<dyn Transport>>,
        outgoing: Option<Box<dyn Transport>>,
    ) -> Result<Self, PeerError> {
        let id = OnionId::parse(raw)?;

        let mut peer = Self {
            id,
            connecting: false,
            connected: false,
            verified: false,
            ready: false,
            pinged: false,
            status: Status::Offline,
            client: ClientIdentity::default(),
            name: None,
            description: None,
            alias: None,
            avatar: Avatar::default(),
            cookie: new_cookie(),
            remote_cookie: None,
            incoming: None,
            outgoing: None,
        };

        for transport in [incoming, outgoing].into_iter().flatten() {
            peer.adopt(transport);
        }

        if peer.outgoing.is_none() {
            if let Err(err) = peer.connect(link) {
                warn!(peer = %peer.id, %err, "initial dial failed");
            }
        }

        Ok(peer)
    }

    pub fn id(&self) -> &OnionId {
        &self.id
    }

    pub fn address(&self) -> String {
        self.id.address()
    }

    pub fn is_connecting(&self) -> bool {
        self.connecting
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_online(&self) -> bool {
        self.connected
    }

    pub fn is_verified(&self) -> bool {
        self.verified
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self) {
        self.ready = true;
    }

    pub fn is_pinged(&self) -> bool {
        self.pinged
    }

    pub fn ping(&mut self) {
        self.pinged = true;
    }

    pub fn pong(&mut self) {
        self.pinged = false;
    }

    /// Announced status, or [`Status::Offline`] while not connected.
    pub fn status(&self) -> Status {
        if self.connected {
            self.status
        } else {
            Status::Offline
        }
    }

    pub fn set_status(&mut self, status: Status) {
        self.status = status;
    }

    pub fn client(&self) -> &ClientIdentity {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut ClientIdentity {
        &mut self.client
    }

    /// Display name from the remote's `profile_name`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Local nickname, never sent on the wire.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = Some(alias.into());
    }

    pub fn avatar(&self) -> &Avatar {
        &self.avatar
    }

    pub fn avatar_mut(&mut self) -> &mut Avatar {
        &mut self.avatar
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn set_remote_cookie(&mut self, cookie: impl Into<String>) {
        self.remote_cookie = Some(cookie.into());
    }

    pub fn take_remote_cookie(&mut self) -> Option<String> {
        self.remote_cookie.take()
    }

    /// Whether `alias` or the display name equals `key`.
    pub fn is_known_as(&self, key: &str) -> bool {
        self.alias.as_deref() == Some(key) || self.name.as_deref() == Some(key)
    }

    pub fn transport(&self, direction: Direction) -> Option<&dyn Transport> {
        match direction {
            Direction::Incoming => self.incoming.as_deref(),
            Direction::Outgoing => self.outgoing.as_deref(),
        }
    }

    /// Direction under which `connection` is currently owned, if at all.
    pub fn owns(&self, connection: ConnectionId) -> Option<Direction> {
        [Direction::Incoming, Direction::Outgoing]
            .into_iter()
            .find(|direction| self.transport(*direction).is_some_and(|t| t.id() == connection))
    }

    /// Take ownership of `transport`, replacing and closing any previous one of
    /// the same direction.
    pub fn adopt(&mut self, mut transport: Box<dyn Transport>) {
        transport.set_owner(Some(self.id.clone()));
        let direction = transport.direction();
        let slot = match direction {
            Direction::Incoming => &mut self.incoming,
            Direction::Outgoing => &mut self.outgoing,
        };

        debug!(peer = %self.id, connection = %transport.id(), %direction, "adopting transport");
        if let Some(previous) = slot.replace(transport) {
            orphan(previous);
        }
    }

    /// Dial the peer through the proxy. No-op while connecting or connected.
    pub fn connect(&mut self, link: &mut PeerLink) -> Result<(), PeerError> {
        if self.connecting || self.connected {
            return Ok(());
        }

        self.connecting = true;
        let transport = match link.dial(&self.id) {
            Ok(transport) => transport,
            Err(err) => {
                self.connecting = false;
                return Err(err.into());
            }
        };

        let connection = transport.id();
        debug!(peer = %self.id, %connection, "dialing");
        self.adopt(transport);
        link.emit(Lifecycle::Outgoing {
            peer: self.id.clone(),
            connection,
        });
        Ok(())
    }

    /// The outgoing flow is established: announce ourselves with a ping.
    ///
    /// Ignored when already connected or when no outgoing transport is owned.
    /// If the ping cannot be sent the peer is torn down instead.
    pub fn mark_connected(&mut self, link: &mut PeerLink) -> Result<(), PeerError> {
        if self.connected {
            return Ok(());
        }
        let Some(outgoing) = self.outgoing.as_mut() else {
            debug!(peer = %self.id, "connect signal without outgoing transport");
            return Ok(());
        };

        let ping = Packet::Ping {
            address: link.address().clone(),
            cookie: self.cookie.clone(),
        };
        if let Err(err) = outgoing.send_packet_forced(ping) {
            warn!(peer = %self.id, %err, "ping failed, dropping connection");
            self.teardown(link);
            return Err(err.into());
        }

        self.connecting = false;
        self.connected = true;
        self.ping();

        info!(peer = %self.id, "peer connected");
        link.emit(Lifecycle::Connection(self.id.clone()));
        Ok(())
    }

    /// The remote echoed our cookie: open the verification gate.
    ///
    /// Ignored when already verified or not connected.
    pub fn mark_verified(&mut self, link: &mut PeerLink) {
        if self.verified || !self.connected {
            return;
        }

        self.verified = true;
        if let Some(outgoing) = self.outgoing.as_mut() {
            outgoing.notify_verification_complete();
        }

        info!(peer = %self.id, "peer verified");
        link.emit(Lifecycle::Verification(self.id.clone()));
    }

    /// Nothing is in flight and no transport is owned.
    pub fn is_disconnected(&self) -> bool {
        !self.connecting && !self.connected && self.incoming.is_none() && self.outgoing.is_none()
    }

    /// Close owned transports after flushing and converge to disconnected.
    pub fn disconnect(&mut self, link: &mut PeerLink) {
        if self.is_disconnected() {
            return;
        }
        debug!(peer = %self.id, "disconnecting");
        self.teardown(link);
    }

    /// A transport went away underneath us: converge to disconnected.
    pub fn disconnected(&mut self, link: &mut PeerLink) {
        if self.is_disconnected() {
            return;
        }
        self.teardown(link);
    }

    fn teardown(&mut self, link: &mut PeerLink) {
        self.verified = false;
        self.ready = false;
        self.connecting = false;
        self.connected = false;

        for transport in [self.incoming.take(), self.outgoing.take()]
            .into_iter()
            .flatten()
        {
            orphan(transport);
        }

        info!(peer = %self.id, "peer disconnected");
        link.emit(Lifecycle::Disconnection(self.id.clone()));
    }

    /// Send through the verification gate.
    pub fn send_packet(&mut self, packet: Packet) -> Result<(), PeerError> {
        let outgoing = self
            .outgoing
            .as_mut()
            .ok_or_else(|| PeerError::PrematureSend(self.id.clone()))?;
        outgoing.send_packet(packet)?;
        Ok(())
    }

    /// Send bypassing the verification gate.
    pub fn send_packet_forced(&mut self, packet: Packet) -> Result<(), PeerError> {
        let outgoing = self
            .outgoing
            .as_mut()
            .ok_or_else(|| PeerError::PrematureSend(self.id.clone()))?;
        outgoing.send_packet_forced(packet)?;
        Ok(())
    }

    pub fn send_message(&mut self, text: impl Into<String>) -> Result<(), PeerError> {
        self.send_packet(Packet::Message(text.into()))
    }
}

fn orphan(mut transport: Box<dyn Transport>) {
    transport.set_owner(None);
    transport.close_after_flush();
}
