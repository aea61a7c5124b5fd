//! Line-oriented wire codec for torchat packets.
//!
//! Every packet is one line: `<command>[ <payload>]\n`. The payload is escaped
//! with [`escape`] so binary avatar data never contains a raw newline.

mod utils;

pub use utils::{escape, unescape};

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};
use torchat_primitives::{OnionId, Packet, PacketKind, Status};
use tracing::debug;

/// Longest accepted line, including escapes. Fits an escaped 64x64 RGB avatar.
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line exceeds max length {max}")]
    LineTooLong { max: usize },
}

/// One decoded line.
///
/// Unknown commands and malformed payloads are reported as frames rather than
/// errors so a single bad line never tears down the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Packet(Packet),
    Unknown(String),
    Malformed { kind: PacketKind, reason: String },
}

/// Codec for `tokio_util::codec::Framed` over a peer socket.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_line_length: usize,
    /// Bytes already scanned for a newline.
    next_index: usize,
    /// Discarding an over-long line until its newline shows up.
    discarding: bool,
}

impl Default for PacketCodec {
    fn default() -> Self {
        Self::new(MAX_LINE_LENGTH)
    }
}

impl PacketCodec {
    pub fn new(max_line_length: usize) -> Self {
        Self {
            max_line_length,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Decoder for PacketCodec {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let newline = src
                .get(self.next_index..)
                .and_then(|rest| rest.iter().position(|b| *b == b'\n'))
                .map(|offset| offset + self.next_index);

            match (newline, self.discarding) {
                (Some(end), true) => {
                    let _ = src.split_to(end + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (Some(end), false) => {
                    let line = src.split_to(end + 1);
                    self.next_index = 0;
                    let line = line.get(..end).unwrap_or_default();
                    if line.is_empty() {
                        continue;
                    }
                    return Ok(Some(decode_line(line)));
                }
                (None, true) => {
                    src.clear();
                    self.next_index = 0;
                    return Ok(None);
                }
                (None, false) if src.len() > self.max_line_length => {
                    debug!(
                        max = self.max_line_length,
                        "line too long, discarding up to next newline"
                    );
                    self.discarding = true;
                    return Err(CodecError::LineTooLong {
                        max: self.max_line_length,
                    });
                }
                (None, false) => {
                    self.next_index = src.len();
                    return Ok(None);
                }
            }
        }
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let line = encode_line(&packet);
        if line.len() > self.max_line_length {
            return Err(CodecError::LineTooLong {
                max: self.max_line_length,
            });
        }
        dst.reserve(line.len());
        dst.put_slice(&line);
        Ok(())
    }
}

/// Encode a packet as one newline-terminated line.
pub fn encode_line(packet: &Packet) -> Vec<u8> {
    let payload: Option<Vec<u8>> = match packet {
        Packet::Ping { address, cookie } => {
            Some(format!("{} {}", address.as_str(), cookie).into_bytes())
        }
        Packet::Pong { cookie } => Some(cookie.clone().into_bytes()),
        Packet::Status(status) => Some(status.as_ref().as_bytes().to_vec()),
        Packet::AddMe | Packet::RemoveMe => None,
        Packet::ProfileAvatar(data) | Packet::ProfileAvatarAlpha(data) => Some(data.to_vec()),
        Packet::Client(s)
        | Packet::Version(s)
        | Packet::Message(s)
        | Packet::ProfileName(s)
        | Packet::ProfileText(s)
        | Packet::NotImplemented(s) => Some(s.clone().into_bytes()),
    };

    let mut line = packet.kind().as_ref().as_bytes().to_vec();
    if let Some(payload) = payload {
        line.push(b' ');
        line.extend_from_slice(&escape(&payload));
    }
    line.push(b'\n');
    line
}

/// Decode one line, without its trailing newline.
pub fn decode_line(line: &[u8]) -> Frame {
    let (command, payload) = match line.iter().position(|b| *b == b' ') {
        Some(space) => (
            line.get(..space).unwrap_or_default(),
            line.get(space + 1..).unwrap_or_default(),
        ),
        None => (line, &[][..]),
    };

    let command = String::from_utf8_lossy(command);
    let Ok(kind) = command.parse::<PacketKind>() else {
        return Frame::Unknown(command.into_owned());
    };

    match decode_payload(kind, unescape(payload)) {
        Ok(packet) => Frame::Packet(packet),
        Err(reason) => Frame::Malformed { kind, reason },
    }
}

fn decode_payload(kind: PacketKind, payload: Vec<u8>) -> Result<Packet, String> {
    let text = |payload: Vec<u8>| String::from_utf8(payload).map_err(|e| e.to_string());

    Ok(match kind {
        PacketKind::Ping => {
            let text = text(payload)?;
            let (address, cookie) = text
                .split_once(' ')
                .ok_or_else(|| "missing cookie".to_string())?;
            let address = OnionId::parse(address).map_err(|e| e.to_string())?;
            Packet::Ping {
                address,
                cookie: cookie.to_string(),
            }
        }
        PacketKind::Pong => Packet::Pong {
            cookie: text(payload)?,
        },
        PacketKind::Status => {
            let text = text(payload)?;
            Packet::Status(text.parse::<Status>().map_err(|e| e.to_string())?)
        }
        PacketKind::AddMe => Packet::AddMe,
        PacketKind::RemoveMe => Packet::RemoveMe,
        PacketKind::ProfileAvatar => Packet::ProfileAvatar(Bytes::from(payload)),
        PacketKind::ProfileAvatarAlpha => Packet::ProfileAvatarAlpha(Bytes::from(payload)),
        PacketKind::Client => Packet::Client(text(payload)?),
        PacketKind::Version => Packet::Version(text(payload)?),
        PacketKind::Message => Packet::Message(text(payload)?),
        PacketKind::ProfileName => Packet::ProfileName(text(payload)?),
        PacketKind::ProfileText => Packet::ProfileText(text(payload)?),
        PacketKind::NotImplemented => Packet::NotImplemented(text(payload)?),
    })
}
