//! Passive orchestrator: runs the handshake and records what peers announce,
//! but never volunteers a profile of its own.

use std::ops::{Deref, DerefMut};

use torchat_net_peers::Network;

use crate::config::Config;
use crate::handlers;
use crate::orchestrator::Orchestrator;

#[derive(Debug)]
pub struct Server {
    orchestrator: Orchestrator,
}

impl Server {
    pub fn new(config: Config, network: Box<dyn Network>) -> Self {
        let mut orchestrator = Orchestrator::new(config, network);
        handlers::install_handshake(&mut orchestrator);
        handlers::install_ingest(&mut orchestrator);
        Self { orchestrator }
    }

    pub fn into_inner(self) -> Orchestrator {
        self.orchestrator
    }
}

impl Deref for Server {
    type Target = Orchestrator;

    fn deref(&self) -> &Self::Target {
        &self.orchestrator
    }
}

impl DerefMut for Server {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.orchestrator
    }
}
