use thiserror::Error;
use torchat_net_peers::{PeerError, RegistryError, TransportError};

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Peer(#[from] PeerError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no peer known as {0:?}")]
    PeerNotFound(String),

    /// Raised by user handlers.
    #[error("handler failed: {0}")]
    Handler(String),
}
