//! Packet model shared by the codec, the peers and the session.

use bytes::Bytes;
use rand::Rng;
use rand::distr::Alphanumeric;
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::address::OnionId;
use crate::status::Status;

/// Length of a freshly generated handshake cookie.
pub const COOKIE_LEN: usize = 64;

/// Generate a random handshake cookie.
pub fn new_cookie() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(COOKIE_LEN)
        .map(char::from)
        .collect()
}

/// Packet tag, identical to the command word on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum PacketKind {
    Ping,
    Pong,
    Client,
    Version,
    Status,
    AddMe,
    RemoveMe,
    Message,
    ProfileName,
    ProfileText,
    ProfileAvatar,
    ProfileAvatarAlpha,
    NotImplemented,
}

/// A decoded protocol packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Liveness check carrying the sender's address and a cookie to echo back.
    Ping { address: OnionId, cookie: String },
    Pong { cookie: String },
    Client(String),
    Version(String),
    Status(Status),
    AddMe,
    RemoveMe,
    Message(String),
    ProfileName(String),
    ProfileText(String),
    ProfileAvatar(Bytes),
    ProfileAvatarAlpha(Bytes),
    /// Reply to a command the remote does not understand.
    NotImplemented(String),
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Ping { .. } => PacketKind::Ping,
            Packet::Pong { .. } => PacketKind::Pong,
            Packet::Client(_) => PacketKind::Client,
            Packet::Version(_) => PacketKind::Version,
            Packet::Status(_) => PacketKind::Status,
            Packet::AddMe => PacketKind::AddMe,
            Packet::RemoveMe => PacketKind::RemoveMe,
            Packet::Message(_) => PacketKind::Message,
            Packet::ProfileName(_) => PacketKind::ProfileName,
            Packet::ProfileText(_) => PacketKind::ProfileText,
            Packet::ProfileAvatar(_) => PacketKind::ProfileAvatar,
            Packet::ProfileAvatarAlpha(_) => PacketKind::ProfileAvatarAlpha,
            Packet::NotImplemented(_) => PacketKind::NotImplemented,
        }
    }

    /// String payload, for packets that carry text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Packet::Client(s)
            | Packet::Version(s)
            | Packet::Message(s)
            | Packet::ProfileName(s)
            | Packet::ProfileText(s)
            | Packet::NotImplemented(s) => Some(s),
            Packet::Pong { cookie } => Some(cookie),
            Packet::Status(status) => Some(status.as_ref()),
            _ => None,
        }
    }

    /// Raw byte payload, for avatar packets.
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            Packet::ProfileAvatar(data) | Packet::ProfileAvatarAlpha(data) => Some(data),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(PacketKind::AddMe.as_ref(), "add_me");
        assert_eq!(PacketKind::ProfileAvatarAlpha.to_string(), "profile_avatar_alpha");
        assert_eq!("not_implemented".parse::<PacketKind>().unwrap(), PacketKind::NotImplemented);
        assert!("bogus".parse::<PacketKind>().is_err());
    }

    #[test]
    fn test_kind_names_unique() {
        let names: std::collections::HashSet<_> =
            PacketKind::iter().map(|k| k.to_string()).collect();
        assert_eq!(names.len(), PacketKind::iter().count());
    }

    #[test]
    fn test_payload_accessors() {
        let name = Packet::ProfileName("Alice".into());
        assert_eq!(name.kind(), PacketKind::ProfileName);
        assert_eq!(name.as_str(), Some("Alice"));
        assert!(name.data().is_none());

        let avatar = Packet::ProfileAvatar(Bytes::from_static(b"\x01\x02"));
        assert_eq!(avatar.data().map(|d| d.as_ref()), Some(&b"\x01\x02"[..]));
        assert!(avatar.as_str().is_none());

        assert_eq!(Packet::Status(Status::Away).as_str(), Some("away"));
        assert!(Packet::AddMe.as_str().is_none());
    }

    #[test]
    fn test_cookie_shape() {
        let a = new_cookie();
        let b = new_cookie();
        assert_eq!(a.len(), COOKIE_LEN);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
