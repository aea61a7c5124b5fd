//! Client-side orchestrator: announces itself to verified peers and pushes
//! profile changes to everyone it knows.

use std::ops::{Deref, DerefMut};

use torchat_net_peers::Network;
use torchat_primitives::Packet;
use tracing::debug;

use crate::config::Config;
use crate::handlers;
use crate::orchestrator::Orchestrator;

#[derive(Debug)]
pub struct Session {
    orchestrator: Orchestrator,
}

impl Session {
    pub fn new(config: Config, network: Box<dyn Network>) -> Self {
        let mut orchestrator = Orchestrator::new(config, network);
        handlers::install_handshake(&mut orchestrator);
        handlers::install_profile_bundle(&mut orchestrator);
        handlers::install_ingest(&mut orchestrator);
        Self { orchestrator }
    }

    /// Store our display name and send it to every verified peer.
    ///
    /// Peers still in their handshake get it with their verification bundle.
    /// Returns how many peers it was sent to.
    pub fn set_display_name(&mut self, name: impl Into<String>) -> usize {
        let name = name.into();
        self.orchestrator.store_name(name.clone());
        let sent = self.orchestrator.broadcast(&Packet::ProfileName(name));
        debug!(sent, "display name pushed");
        sent
    }

    /// Store our description and send it to every verified peer.
    pub fn set_description(&mut self, description: impl Into<String>) -> usize {
        let description = description.into();
        self.orchestrator.store_description(description.clone());
        let sent = self.orchestrator.broadcast(&Packet::ProfileText(description));
        debug!(sent, "description pushed");
        sent
    }

    pub fn into_inner(self) -> Orchestrator {
        self.orchestrator
    }
}

impl Deref for Session {
    type Target = Orchestrator;

    fn deref(&self) -> &Self::Target {
        &self.orchestrator
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.orchestrator
    }
}
