//! Module-level surface: load a configuration, start a session on tokio
//! sockets, and send packets to peers by name.

use std::future::Future;
use std::path::Path;

use tokio::sync::mpsc;
use torchat_primitives::Packet;
use torchat_session::{Config, Session};
use tracing::info;

use crate::error::NodeError;
use crate::network::TokioNetwork;
use crate::reactor::{self, ReactorEvent};

#[derive(Debug)]
struct Running {
    session: Session,
    events: mpsc::UnboundedReceiver<ReactorEvent>,
}

/// A configured instance. Nothing is bound until [`start`](Torchat::start).
#[derive(Debug)]
pub struct Torchat {
    config: Config,
    running: Option<Running>,
}

impl Torchat {
    /// Read the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        Ok(Self::from_config(Config::load(path)?))
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            config,
            running: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind the configured listener and create the session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<&mut Session, NodeError> {
        self.start_on(None, None)
    }

    /// Like [`start`](Torchat::start), with explicit listener overrides.
    pub fn start_on(
        &mut self,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<&mut Session, NodeError> {
        if self.running.is_some() {
            return Err(NodeError::AlreadyStarted);
        }

        let (network, events) = TokioNetwork::new();
        let mut session = Session::new(self.config.clone(), Box::new(network));
        session.start(host, port)?;
        info!(address = %session.address(), "torchat started");

        let running = self.running.insert(Running { session, events });
        Ok(&mut running.session)
    }

    pub fn is_started(&self) -> bool {
        self.running.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.running.as_ref().map(|r| &r.session)
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.running.as_mut().map(|r| &mut r.session)
    }

    /// Look `name` up in the registry and send `packet` through that peer.
    pub fn send_packet_to(&mut self, name: &str, packet: Packet) -> Result<(), NodeError> {
        let session = self.session_mut().ok_or(NodeError::NotStarted)?;
        session.send_packet_to(name, packet)?;
        Ok(())
    }

    /// Run the reactor until `shutdown` resolves, then stop the session.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<(), NodeError>
    where
        F: Future<Output = ()>,
    {
        let Running { session, events } = self.running.as_mut().ok_or(NodeError::NotStarted)?;
        reactor::run(session, events, shutdown).await;
        session.stop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use assert_matches::assert_matches;
    use torchat_net_peers::Endpoint;
    use torchat_primitives::OnionId;
    use torchat_session::SessionError;

    use super::*;

    fn config() -> Config {
        Config::new(
            OnionId::parse("aaaaaaaaaaaaaaaa").unwrap(),
            Endpoint::new("127.0.0.1", 0),
            Endpoint::new("127.0.0.1", 9),
        )
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
address = "aaaaaaaaaaaaaaaa.onion"

[connection.incoming]
host = "127.0.0.1"
port = 11009

[connection.outgoing]
host = "127.0.0.1"
port = 9050
"#
        )
        .unwrap();

        let torchat = Torchat::load(file.path()).unwrap();
        assert_eq!(torchat.config().address.as_str(), "aaaaaaaaaaaaaaaa");
        assert!(!torchat.is_started());
    }

    #[test]
    fn test_send_before_start() {
        let mut torchat = Torchat::from_config(config());
        assert_matches!(
            torchat.send_packet_to("bbbbbbbbbbbbbbbb", Packet::AddMe),
            Err(NodeError::NotStarted)
        );
    }

    #[tokio::test]
    async fn test_start_and_send_to_unknown() {
        let mut torchat = Torchat::from_config(config());
        torchat.start().unwrap();
        assert!(torchat.session().and_then(|s| s.listener()).is_some());
        assert_matches!(torchat.start(), Err(NodeError::AlreadyStarted));

        assert_matches!(
            torchat.send_packet_to("Bob", Packet::AddMe),
            Err(NodeError::Session(SessionError::PeerNotFound(name))) if name == "Bob"
        );

        torchat
            .run_until(tokio::time::sleep(Duration::from_millis(5)))
            .await
            .unwrap();
        assert_eq!(torchat.session().map(|s| s.listener()), Some(None));
    }
}
