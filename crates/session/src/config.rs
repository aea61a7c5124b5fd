//! Instance configuration, read from TOML.
//!
//! ```toml
//! address = "abcdefghijklmnop.onion"
//!
//! [connection.incoming]
//! host = "127.0.0.1"
//! port = 11009
//!
//! [connection.outgoing]
//! host = "127.0.0.1"
//! port = 9050
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use torchat_net_peers::Endpoint;
use torchat_primitives::{ClientIdentity, OnionId};

use crate::constants::*;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration of one running instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Our own hidden-service address. Validated and normalized on load.
    pub address: OnionId,

    pub connection: ConnectionConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub profile: ProfileConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Where to listen for connections forwarded by the hidden service.
    pub incoming: EndpointConfig,

    /// The SOCKS5 proxy outgoing dials go through.
    pub outgoing: ProxyConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,

    /// Dial timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Overrides for the identity announced to peers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Initial profile pushed to peers once they are verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

impl Config {
    /// Minimal configuration with no client or profile overrides.
    pub fn new(address: OnionId, listen: Endpoint, proxy: Endpoint) -> Self {
        Self {
            address,
            connection: ConnectionConfig {
                incoming: EndpointConfig {
                    host: listen.host,
                    port: listen.port,
                },
                outgoing: ProxyConfig {
                    host: proxy.host,
                    port: proxy.port,
                    timeout: default_timeout(),
                },
            },
            client: ClientConfig::default(),
            profile: ProfileConfig::default(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn listen_endpoint(&self) -> Endpoint {
        let incoming = &self.connection.incoming;
        Endpoint::new(incoming.host.clone(), incoming.port)
    }

    pub fn proxy_endpoint(&self) -> Endpoint {
        let outgoing = &self.connection.outgoing;
        Endpoint::new(outgoing.host.clone(), outgoing.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connection.outgoing.timeout)
    }

    /// Identity announced to peers, with defaults filled in.
    pub fn client_identity(&self) -> ClientIdentity {
        ClientIdentity::new(
            self.client
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_CLIENT_NAME.to_string()),
            self.client
                .version
                .clone()
                .unwrap_or_else(|| DEFAULT_CLIENT_VERSION.to_string()),
        )
    }
}
