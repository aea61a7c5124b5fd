//! Tokio-backed [`Transport`]: a handle on the reactor side and a task that
//! owns the socket.
//!
//! The handle forwards commands over an unbounded channel. The task reads
//! frames, reports them to the reactor, and writes whatever the handle queues.

use std::fmt;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use torchat_net_codec::{CodecError, Frame, MAX_LINE_LENGTH, PacketCodec, encode_line};
use torchat_net_peers::{ConnectionId, Direction, Transport, TransportError};
use torchat_primitives::{OnionId, Packet};
use tracing::{debug, trace, warn};

use crate::reactor::ReactorEvent;

#[derive(Debug)]
pub(crate) enum Command {
    Send(Packet),
    Close,
}

/// Reactor-side half of a connection.
///
/// Outgoing handles keep non-forced packets back until the peer is verified.
pub struct ConnectionHandle {
    id: ConnectionId,
    direction: Direction,
    owner: Option<OnionId>,
    commands: mpsc::UnboundedSender<Command>,
    verified: bool,
    held: Vec<Packet>,
}

impl ConnectionHandle {
    pub(crate) fn new(
        id: ConnectionId,
        direction: Direction,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            id,
            direction,
            owner: None,
            commands,
            verified: direction == Direction::Incoming,
            held: Vec::new(),
        }
    }

    fn push(&self, packet: Packet) -> Result<(), TransportError> {
        self.commands
            .send(Command::Send(packet))
            .map_err(|_| TransportError::Closed(self.id))
    }

    /// Reject packets whose line would not fit, so the writer never sees them.
    fn check_size(&self, packet: &Packet) -> Result<(), TransportError> {
        let len = encode_line(packet).len();
        if len > MAX_LINE_LENGTH {
            warn!(connection = %self.id, kind = %packet.kind(), len, "packet too large");
            return Err(TransportError::TooLarge {
                connection: self.id,
                len,
                max: MAX_LINE_LENGTH,
            });
        }
        Ok(())
    }

    /// Packets waiting for verification.
    pub fn held(&self) -> usize {
        self.held.len()
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("direction", &self.direction)
            .field("owner", &self.owner)
            .field("verified", &self.verified)
            .field("held", &self.held.len())
            .finish()
    }
}

impl Transport for ConnectionHandle {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn send_packet(&mut self, packet: Packet) -> Result<(), TransportError> {
        if self.commands.is_closed() {
            return Err(TransportError::Closed(self.id));
        }
        self.check_size(&packet)?;
        if !self.verified {
            trace!(connection = %self.id, kind = %packet.kind(), "holding packet until verified");
            self.held.push(packet);
            return Ok(());
        }
        self.push(packet)
    }

    fn send_packet_forced(&mut self, packet: Packet) -> Result<(), TransportError> {
        self.check_size(&packet)?;
        self.push(packet)
    }

    fn notify_verification_complete(&mut self) {
        if self.verified {
            return;
        }
        self.verified = true;
        for packet in std::mem::take(&mut self.held) {
            if self.push(packet).is_err() {
                debug!(connection = %self.id, "connection closed while flushing held packets");
                break;
            }
        }
    }

    fn close_after_flush(&mut self) {
        let _ = self.commands.send(Command::Close);
    }

    fn set_owner(&mut self, owner: Option<OnionId>) {
        self.owner = owner;
    }

    fn owner(&self) -> Option<&OnionId> {
        self.owner.as_ref()
    }
}

/// Drive one connection until either side closes it, then report
/// [`ReactorEvent::Closed`].
pub(crate) async fn run_connection<S>(
    id: ConnectionId,
    stream: S,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ReactorEvent>,
) where
    S: AsyncRead + AsyncWrite,
{
    let (reader, writer) = tokio::io::split(stream);
    let mut reader = FramedRead::new(reader, PacketCodec::default());
    let mut writer = FramedWrite::new(writer, PacketCodec::default());

    loop {
        tokio::select! {
            frame = reader.next() => match frame {
                Some(Ok(Frame::Packet(packet))) => {
                    if events.send(ReactorEvent::Packet(id, packet)).is_err() {
                        break;
                    }
                }
                Some(Ok(Frame::Unknown(command))) => {
                    debug!(connection = %id, %command, "unknown command");
                    if let Err(err) = writer.send(Packet::NotImplemented(command)).await {
                        warn!(connection = %id, %err, "write failed");
                        break;
                    }
                }
                Some(Ok(Frame::Malformed { kind, reason })) => {
                    warn!(connection = %id, %kind, %reason, "malformed packet");
                }
                Some(Err(err)) => {
                    warn!(connection = %id, %err, "read failed");
                    break;
                }
                None => {
                    debug!(connection = %id, "remote closed connection");
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Send(packet)) => match writer.send(packet).await {
                    Ok(()) => {}
                    // Rejected before anything reached the buffer.
                    Err(err @ CodecError::LineTooLong { .. }) => {
                        warn!(connection = %id, %err, "dropping packet");
                    }
                    Err(err) => {
                        warn!(connection = %id, %err, "write failed");
                        break;
                    }
                },
                Some(Command::Close) | None => {
                    let _ = writer.flush().await;
                    debug!(connection = %id, "connection closed locally");
                    break;
                }
            },
        }
    }

    let _ = events.send(ReactorEvent::Closed(id));
}
