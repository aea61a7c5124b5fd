//! [`Network`] implementation on tokio sockets.
//!
//! Dials and accepted connections become tasks on the current runtime. Every
//! task reports back through one [`ReactorEvent`] channel.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use torchat_net_peers::{
    ConnectionId, Direction, Endpoint, ListenerId, Network, Transport, TransportError,
};
use torchat_primitives::{DEFAULT_PEER_PORT, OnionId};
use tracing::{debug, info, warn};

use crate::connection::{Command, ConnectionHandle, run_connection};
use crate::reactor::ReactorEvent;
use crate::socks;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug)]
pub struct TokioNetwork {
    /// Shared with accept loops so incoming and outgoing ids never collide.
    connection_ids: Arc<AtomicU64>,
    next_listener: u64,
    events: mpsc::UnboundedSender<ReactorEvent>,
    listeners: HashMap<ListenerId, Listener>,
}

#[derive(Debug)]
struct Listener {
    local: SocketAddr,
    task: JoinHandle<()>,
}

impl TokioNetwork {
    /// Create a network and the receiver its tasks report to.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReactorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let network = Self {
            connection_ids: Arc::new(AtomicU64::new(0)),
            next_listener: 0,
            events,
            listeners: HashMap::new(),
        };
        (network, rx)
    }

    fn next_id(&self) -> ConnectionId {
        next_connection_id(&self.connection_ids)
    }

    /// Address a listener is actually bound to, useful after binding port 0.
    pub fn local_addr(&self, listener: ListenerId) -> Option<SocketAddr> {
        self.listeners.get(&listener).map(|l| l.local)
    }

    pub fn listening(&self) -> usize {
        self.listeners.len()
    }
}

impl Network for TokioNetwork {
    fn dial(
        &mut self,
        target: &OnionId,
        proxy: &Endpoint,
        connect_timeout: Duration,
    ) -> Result<Box<dyn Transport>, TransportError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|err| TransportError::Dial {
                target: target.clone(),
                reason: err.to_string(),
            })?;

        let id = self.next_id();
        let (commands, commands_rx) = mpsc::unbounded_channel();
        runtime.spawn(dial_task(
            id,
            target.address(),
            proxy.clone(),
            connect_timeout,
            commands_rx,
            self.events.clone(),
        ));

        debug!(peer = %target, connection = %id, %proxy, "dialing");
        Ok(Box::new(ConnectionHandle::new(
            id,
            Direction::Outgoing,
            commands,
        )))
    }

    fn listen(&mut self, endpoint: &Endpoint) -> Result<ListenerId, TransportError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(std::io::Error::other)?;
        let _entered = runtime.enter();

        let listener = std::net::TcpListener::bind((endpoint.host.as_str(), endpoint.port))?;
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;
        let local = listener.local_addr()?;
        info!(%local, "listener bound");

        self.next_listener += 1;
        let id = ListenerId(self.next_listener);

        let task = runtime.spawn(accept_loop(
            listener,
            self.events.clone(),
            Arc::clone(&self.connection_ids),
            id,
        ));
        self.listeners.insert(id, Listener { local, task });
        Ok(id)
    }

    fn unlisten(&mut self, listener: ListenerId) {
        if let Some(bound) = self.listeners.remove(&listener) {
            bound.task.abort();
            debug!(?listener, "listener closed");
        }
    }
}

impl Drop for TokioNetwork {
    fn drop(&mut self) {
        for (_, bound) in self.listeners.drain() {
            bound.task.abort();
        }
    }
}

async fn dial_task(
    id: ConnectionId,
    host: String,
    proxy: Endpoint,
    connect_timeout: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ReactorEvent>,
) {
    let stream = match timeout(
        connect_timeout,
        socks::connect(&proxy, &host, DEFAULT_PEER_PORT),
    )
    .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(err)) => {
            warn!(connection = %id, %host, %err, "dial failed");
            let _ = events.send(ReactorEvent::Closed(id));
            return;
        }
        Err(_) => {
            warn!(connection = %id, %host, timeout = ?connect_timeout, "dial timed out");
            let _ = events.send(ReactorEvent::Closed(id));
            return;
        }
    };

    debug!(connection = %id, %host, "proxy connection established");
    if events.send(ReactorEvent::Established(id)).is_err() {
        return;
    }
    run_connection(id, stream, commands, events).await;
}

async fn accept_loop(
    listener: TcpListener,
    events: mpsc::UnboundedSender<ReactorEvent>,
    connection_ids: Arc<AtomicU64>,
    listener_id: ListenerId,
) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                warn!(?listener_id, %err, "accept failed");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        if let Err(err) = stream.set_nodelay(true) {
            warn!(%remote, %err, "failed to set TCP_NODELAY");
        }

        let id = next_connection_id(&connection_ids);
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let handle = ConnectionHandle::new(id, Direction::Incoming, commands);
        debug!(connection = %id, %remote, "accepted connection");

        if events.send(ReactorEvent::Accepted(handle)).is_err() {
            return;
        }
        tokio::spawn(run_connection(id, stream, commands_rx, events.clone()));
    }
}

fn next_connection_id(counter: &AtomicU64) -> ConnectionId {
    ConnectionId(counter.fetch_add(1, Ordering::Relaxed) + 1)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;
    use torchat_primitives::{Packet, Status};

    use super::*;

    const PEER: &str = "bbbbbbbbbbbbbbbb";

    fn loopback() -> Endpoint {
        Endpoint::new("127.0.0.1", 0)
    }

    /// Accept one SOCKS5 client, grant its CONNECT and hand back the stream
    /// together with the requested host.
    async fn fake_proxy(listener: TcpListener) -> (TcpStream, String, u16) {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut greeting = [0u8; 3];
        stream.read_exact(&mut greeting).await.unwrap();
        stream.write_all(&[0x05, 0x00]).await.unwrap();

        let mut head = [0u8; 5];
        stream.read_exact(&mut head).await.unwrap();
        let mut host = vec![0u8; usize::from(head[4])];
        stream.read_exact(&mut host).await.unwrap();
        let port = stream.read_u16().await.unwrap();
        stream
            .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
            .await
            .unwrap();
        (stream, String::from_utf8(host).unwrap(), port)
    }

    #[tokio::test]
    async fn test_listen_accepts_and_frames() {
        let (mut network, mut events) = TokioNetwork::new();
        let listener = network.listen(&loopback()).unwrap();
        let addr = network.local_addr(listener).unwrap();

        let mut remote = TcpStream::connect(addr).await.unwrap();
        let mut handle = assert_matches!(events.recv().await, Some(ReactorEvent::Accepted(h)) => h);
        assert_eq!(handle.direction(), Direction::Incoming);

        remote.write_all(b"status xa\n").await.unwrap();
        assert_matches!(
            events.recv().await,
            Some(ReactorEvent::Packet(id, Packet::Status(Status::ExtendedAway))) if id == handle.id()
        );

        handle.send_packet(Packet::AddMe).unwrap();
        let mut lines = BufReader::new(remote).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("add_me"));

        network.unlisten(listener);
        assert_eq!(network.listening(), 0);
    }

    #[tokio::test]
    async fn test_dial_goes_through_proxy() {
        let proxy = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let proxy_addr = proxy.local_addr().unwrap();
        let served = tokio::spawn(fake_proxy(proxy));

        let (mut network, mut events) = TokioNetwork::new();
        let target = OnionId::parse(PEER).unwrap();
        let mut handle = network
            .dial(
                &target,
                &Endpoint::new(proxy_addr.ip().to_string(), proxy_addr.port()),
                Duration::from_secs(5),
            )
            .unwrap();
        assert_eq!(handle.direction(), Direction::Outgoing);

        let (stream, host, port) = served.await.unwrap();
        assert_eq!(host, "bbbbbbbbbbbbbbbb.onion");
        assert_eq!(port, DEFAULT_PEER_PORT);
        assert_matches!(events.recv().await, Some(ReactorEvent::Established(id)) if id == handle.id());

        handle.send_packet(Packet::AddMe).unwrap();
        handle
            .send_packet_forced(Packet::Pong { cookie: "c".into() })
            .unwrap();
        handle.notify_verification_complete();

        let mut lines = BufReader::new(stream).lines();
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("pong c"));
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("add_me"));

        handle.close_after_flush();
        assert_matches!(events.recv().await, Some(ReactorEvent::Closed(id)) if id == handle.id());
    }

    #[tokio::test]
    async fn test_dial_failure_reports_close() {
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = unused.local_addr().unwrap();
        drop(unused);

        let (mut network, mut events) = TokioNetwork::new();
        let handle = network
            .dial(
                &OnionId::parse(PEER).unwrap(),
                &Endpoint::new(addr.ip().to_string(), addr.port()),
                Duration::from_secs(5),
            )
            .unwrap();

        assert_matches!(events.recv().await, Some(ReactorEvent::Closed(id)) if id == handle.id());
    }

    #[test]
    fn test_dial_outside_runtime_fails() {
        let (mut network, _events) = TokioNetwork::new();
        assert_matches!(
            network.dial(
                &OnionId::parse(PEER).unwrap(),
                &loopback(),
                Duration::from_secs(1),
            ),
            Err(TransportError::Dial { .. })
        );
    }
}
