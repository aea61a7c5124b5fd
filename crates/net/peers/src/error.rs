use thiserror::Error;
use torchat_primitives::{AddressError, OnionId};

use crate::transport::ConnectionId;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection {0} is closed")]
    Closed(ConnectionId),

    #[error("packet of {len} bytes on {connection} exceeds the {max} byte line limit")]
    TooLarge {
        connection: ConnectionId,
        len: usize,
        max: usize,
    },

    #[error("dial to {target} failed: {reason}")]
    Dial { target: OnionId, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PeerError {
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),

    #[error("cannot send packets to {0} yet")]
    PrematureSend(OnionId),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no peer is known by alias or name {0:?}")]
    UnknownAlias(String),
}
