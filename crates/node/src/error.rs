use thiserror::Error;
use torchat_session::{ConfigError, SessionError};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("node has not been started")]
    NotStarted,

    #[error("node is already running")]
    AlreadyStarted,
}
