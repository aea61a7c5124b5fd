//! Shared core of [`Session`](crate::Session) and [`Server`](crate::Server).
//!
//! Owns the configuration, the [`AddressRegistry`], the dispatch table and the
//! timers. Transport signals enter through [`accepted`](Orchestrator::accepted),
//! [`established`](Orchestrator::established),
//! [`packet_received`](Orchestrator::packet_received) and
//! [`closed`](Orchestrator::closed), and leave as dispatched [`Event`]s.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use torchat_net_peers::{
    AddressRegistry, ConnectionId, Endpoint, ListenerId, Network, Peer, PeerLink, Transport,
};
use torchat_primitives::{ClientIdentity, OnionId, Packet};
use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::dispatch::{Handler, HandlerTable, PeerFilter};
use crate::error::SessionError;
use crate::event::{Event, EventTag, InboundPacket};
use crate::timers::{TimerCallback, TimerId, Timers};

#[derive(Debug)]
pub struct Orchestrator {
    config: Config,
    client: ClientIdentity,
    name: Option<String>,
    description: Option<String>,

    registry: AddressRegistry,
    link: PeerLink,
    handlers: HandlerTable,
    timers: Timers,
    listener: Option<ListenerId>,

    /// Accepted connections no peer has claimed yet.
    unowned: HashMap<ConnectionId, Box<dyn Transport>>,
}

impl Orchestrator {
    pub fn new(config: Config, network: Box<dyn Network>) -> Self {
        let link = PeerLink::new(
            config.address.clone(),
            config.proxy_endpoint(),
            config.connect_timeout(),
            network,
        );

        Self {
            client: config.client_identity(),
            name: config.profile.name.clone(),
            description: config.profile.description.clone(),
            config,
            registry: AddressRegistry::new(),
            link,
            handlers: HandlerTable::default(),
            timers: Timers::default(),
            listener: None,
            unowned: HashMap::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Our own bare identifier.
    pub fn id(&self) -> &OnionId {
        &self.config.address
    }

    pub fn address(&self) -> String {
        self.config.address.address()
    }

    pub fn client(&self) -> &ClientIdentity {
        &self.client
    }

    pub fn set_client(&mut self, client: ClientIdentity) {
        self.client = client;
    }

    /// Our display name, if one is set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub(crate) fn store_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub(crate) fn store_description(&mut self, description: String) {
        self.description = Some(description);
    }

    pub fn registry(&self) -> &AddressRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut AddressRegistry {
        &mut self.registry
    }

    pub fn peer(&self, key: &str) -> Option<&Peer> {
        self.registry.lookup(key)
    }

    pub fn peer_mut(&mut self, key: &str) -> Option<&mut Peer> {
        self.registry.lookup_mut(key)
    }

    pub fn listener(&self) -> Option<ListenerId> {
        self.listener
    }

    /// Register `handler` for `tag`. Handlers run in registration order.
    pub fn on(&mut self, tag: impl Into<EventTag>, handler: impl Handler + 'static) {
        let tag = tag.into();
        trace!(%tag, "handler registered");
        self.handlers.on(tag, Rc::new(RefCell::new(handler)));
    }

    /// Register `handler` for `tag`, filtered to events concerning `peer`.
    pub fn on_peer(
        &mut self,
        peer: &OnionId,
        tag: impl Into<EventTag>,
        handler: impl Handler + 'static,
    ) {
        self.on(
            tag,
            PeerFilter {
                peer: peer.clone(),
                inner: handler,
            },
        );
    }

    pub fn handler_count(&self, tag: impl Into<EventTag>) -> usize {
        self.handlers.count(tag.into())
    }

    /// Dispatch an inbound packet to the handlers for its kind.
    pub fn received(&mut self, inbound: InboundPacket) -> Result<(), SessionError> {
        self.fire(Event::Packet(inbound))
    }

    /// Run every handler for the event's tag, synchronously and in order.
    ///
    /// The first failing handler stops the chain and its error is returned.
    /// A handler that fires its own tag again is skipped for the nested event.
    pub fn fire(&mut self, event: Event) -> Result<(), SessionError> {
        let tag = event.tag();
        let handlers = self.handlers.snapshot(tag);
        trace!(%tag, handlers = handlers.len(), "dispatching");

        for handler in handlers {
            let Ok(mut handler) = handler.try_borrow_mut() else {
                trace!(%tag, "skipping handler already running");
                continue;
            };
            if let Err(err) = handler.handle(self, &event) {
                warn!(%tag, %err, "handler failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Dispatch lifecycle events queued by peer transitions.
    pub(crate) fn flush_lifecycle(&mut self) -> Result<(), SessionError> {
        while let Some(lifecycle) = self.link.next_event() {
            self.fire(lifecycle.into())?;
        }
        Ok(())
    }

    /// Run a transition on the peer known as `key`, then dispatch whatever it
    /// emitted. `None` when no such peer exists.
    pub fn with_peer<R>(
        &mut self,
        key: &str,
        f: impl FnOnce(&mut Peer, &mut PeerLink) -> R,
    ) -> Result<Option<R>, SessionError> {
        let Some(id) = self.registry.resolve(key) else {
            return Ok(None);
        };
        let result = self
            .registry
            .get_mut(&id)
            .map(|peer| f(peer, &mut self.link));
        self.flush_lifecycle()?;
        Ok(result)
    }

    /// Create a peer for `address` and start dialing it.
    ///
    /// Returns the existing peer's id if the address is already registered.
    pub fn add_peer(&mut self, address: &str) -> Result<OnionId, SessionError> {
        if let Some(existing) = self.registry.resolve(address) {
            if existing.as_str() == torchat_primitives::strip_suffix(address) {
                return Ok(existing);
            }
        }

        let peer = Peer::new(&mut self.link, address, None, None)?;
        let id = peer.id().clone();
        self.registry.append(peer);
        debug!(peer = %id, "peer added");
        self.flush_lifecycle()?;
        Ok(id)
    }

    /// Remove the peer known as `key`, closing its transports.
    pub fn remove_peer(&mut self, key: &str) -> Result<Option<Peer>, SessionError> {
        let Some(mut peer) = self.registry.remove(key) else {
            return Ok(None);
        };
        peer.disconnect(&mut self.link);
        self.flush_lifecycle()?;
        Ok(Some(peer))
    }

    /// Look up `key` and send `packet` through the verification gate.
    pub fn send_packet_to(&mut self, key: &str, packet: Packet) -> Result<(), SessionError> {
        let peer = self
            .registry
            .lookup_mut(key)
            .ok_or_else(|| SessionError::PeerNotFound(key.to_string()))?;
        peer.send_packet(packet)?;
        Ok(())
    }

    /// Send `packet` to every verified peer.
    ///
    /// Peers still in their handshake are skipped. The verification bundle
    /// carries the current profile to them.
    pub fn broadcast(&mut self, packet: &Packet) -> usize {
        let mut sent = 0;
        for peer in self.registry.iter_mut() {
            if !peer.is_verified() {
                trace!(peer = %peer.id(), kind = %packet.kind(), "broadcast skipped unverified peer");
                continue;
            }
            match peer.send_packet(packet.clone()) {
                Ok(()) => sent += 1,
                Err(err) => debug!(peer = %peer.id(), %err, "broadcast skipped peer"),
            }
        }
        sent
    }

    /// Bind the listener. Explicit arguments win over configuration.
    pub fn start(
        &mut self,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<ListenerId, SessionError> {
        let configured = self.config.listen_endpoint();
        let endpoint = Endpoint::new(
            host.map_or(configured.host, str::to_string),
            port.unwrap_or(configured.port),
        );

        if let Some(previous) = self.listener.take() {
            self.link.network_mut().unlisten(previous);
        }

        let listener = self.link.network_mut().listen(&endpoint)?;
        self.listener = Some(listener);
        info!(%endpoint, address = %self.address(), "listening");
        Ok(listener)
    }

    /// Unbind the listener and cancel every outstanding timer.
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.link.network_mut().unlisten(listener);
        }
        self.timers.cancel_all();
        info!("stopped");
    }

    pub fn set_timeout(
        &mut self,
        delay: Duration,
        callback: impl FnMut(&mut Orchestrator) -> Result<(), SessionError> + 'static,
    ) -> TimerId {
        self.timers.schedule(delay, None, Box::new(callback))
    }

    pub fn set_interval(
        &mut self,
        period: Duration,
        callback: impl FnMut(&mut Orchestrator) -> Result<(), SessionError> + 'static,
    ) -> TimerId {
        self.timers.schedule(period, Some(period), Box::new(callback))
    }

    /// Cancel a timer. Cancelling one that already fired is a no-op.
    pub fn clear_timeout(&mut self, timer: TimerId) {
        self.timers.cancel(timer);
    }

    pub fn clear_interval(&mut self, timer: TimerId) {
        self.timers.cancel(timer);
    }

    /// Apply queued timer commands and fire everything due at `now`.
    ///
    /// Timer callbacks have no caller to report to, so their errors are logged.
    pub fn run_timers(&mut self, now: Instant) {
        self.timers.apply_commands(now);
        for timer in self.timers.due(now) {
            let Some(mut callback) = self.timers.take_callback(timer) else {
                continue;
            };
            if let Err(err) = run_timer(self, &mut callback) {
                warn!(?timer, %err, "timer callback failed");
            }
            self.timers.finish(timer, callback, now);
        }
    }

    /// Earliest armed deadline. Queued commands count as due immediately.
    pub fn next_deadline(&self, now: Instant) -> Option<Instant> {
        if self.timers.has_pending() {
            return Some(now);
        }
        self.timers.next_deadline()
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    /// The listener accepted a connection. It stays unowned until a `ping`
    /// names its peer.
    pub fn accepted(&mut self, transport: Box<dyn Transport>) -> Result<(), SessionError> {
        let connection = transport.id();
        debug!(%connection, "incoming connection");
        self.unowned.insert(connection, transport);
        self.fire(Event::Incoming(connection))
    }

    /// An outgoing dial completed.
    pub fn established(&mut self, connection: ConnectionId) -> Result<(), SessionError> {
        let Some(owner) = self.registry.find_by_connection(connection) else {
            warn!(%connection, "connect signal for released connection");
            return Ok(());
        };
        self.with_peer(owner.as_str(), |peer, link| peer.mark_connected(link))?
            .transpose()?;
        Ok(())
    }

    /// A packet was decoded on `connection`.
    pub fn packet_received(
        &mut self,
        connection: ConnectionId,
        packet: Packet,
    ) -> Result<(), SessionError> {
        let sender = self.registry.find_by_connection(connection);
        trace!(%connection, kind = %packet.kind(), sender = ?sender, "packet received");
        self.received(InboundPacket {
            packet,
            sender,
            connection,
        })
    }

    /// A connection closed or failed. Its owner converges to disconnected.
    pub fn closed(&mut self, connection: ConnectionId) -> Result<(), SessionError> {
        if self.unowned.remove(&connection).is_some() {
            debug!(%connection, "unowned connection closed");
            return Ok(());
        }
        let Some(owner) = self.registry.find_by_connection(connection) else {
            trace!(%connection, "close signal for released connection");
            return Ok(());
        };
        warn!(peer = %owner, %connection, "connection lost");
        self.with_peer(owner.as_str(), |peer, link| peer.disconnected(link))?;
        Ok(())
    }

    /// Hand an unowned incoming connection to the peer at `address`, creating
    /// the peer when it is unknown. Either way the peer dials back unless it
    /// is already connecting or connected.
    pub fn claim_incoming(
        &mut self,
        connection: ConnectionId,
        address: &OnionId,
    ) -> Result<(), SessionError> {
        let Some(transport) = self.unowned.remove(&connection) else {
            return Ok(());
        };

        match self.registry.get_mut(address) {
            Some(peer) => {
                peer.adopt(transport);
                // Its ping is only answered over our outgoing flow.
                if let Err(err) = peer.connect(&mut self.link) {
                    warn!(peer = %address, %err, "dial back failed");
                }
            }
            None => {
                let peer = Peer::new(&mut self.link, address.as_str(), Some(transport), None)?;
                self.registry.append(peer);
                debug!(peer = %address, "peer added from incoming connection");
            }
        }
        self.flush_lifecycle()
    }

    pub fn is_unowned(&self, connection: ConnectionId) -> bool {
        self.unowned.contains_key(&connection)
    }
}

fn run_timer(
    orchestrator: &mut Orchestrator,
    callback: &mut TimerCallback,
) -> Result<(), SessionError> {
    callback(orchestrator)?;
    orchestrator.flush_lifecycle()
}
