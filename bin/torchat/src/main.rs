//! torchat peer binary.

mod cli;
mod logging;
mod version;

use clap::Parser;
use eyre::WrapErr;
use torchat_node::Torchat;
use torchat_primitives::{Packet, PacketKind};
use torchat_session::{Event, Orchestrator, SessionError};
use tracing::{info, warn};

use crate::cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    logging::init_logging(&cli.logs)?;
    info!(version = version::VERSION, "starting torchat");

    let mut torchat = Torchat::load(&cli.config).wrap_err_with(|| {
        format!(
            "failed to load configuration from {}",
            cli.config.display()
        )
    })?;

    let session = torchat
        .start_on(cli.listen_host.as_deref(), cli.listen_port)
        .wrap_err("failed to start listener")?;
    session.on(PacketKind::Message, log_message);
    for peer in &cli.peers {
        session
            .add_peer(peer)
            .wrap_err_with(|| format!("cannot add peer {peer}"))?;
    }

    torchat.run_until(shutdown_signal()).await?;
    Ok(())
}

fn log_message(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    let Some(inbound) = event.packet() else {
        return Ok(());
    };
    let (Some(sender), Packet::Message(text)) = (&inbound.sender, &inbound.packet) else {
        return Ok(());
    };

    let from = orchestrator
        .peer(sender.as_str())
        .and_then(|peer| peer.name())
        .unwrap_or(sender.as_str());
    info!(%from, "{text}");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received ctrl-c"),
        Err(err) => {
            warn!(%err, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    }
}
