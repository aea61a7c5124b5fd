//! The single loop that owns the orchestrator.
//!
//! Every handler and timer callback runs here, one at a time. Socket tasks
//! never touch peers directly; they send [`ReactorEvent`]s.

use std::future::Future;
use std::time::Instant;

use tokio::sync::mpsc;
use torchat_net_peers::ConnectionId;
use torchat_primitives::Packet;
use torchat_session::Orchestrator;
use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;

/// Signals from connection tasks to the reactor.
#[derive(Debug)]
pub enum ReactorEvent {
    /// The listener accepted a connection.
    Accepted(ConnectionHandle),
    /// A proxied dial completed.
    Established(ConnectionId),
    Packet(ConnectionId, Packet),
    /// The connection ended, or its dial failed.
    Closed(ConnectionId),
}

/// Drive `orchestrator` until `shutdown` resolves or every sender is gone.
///
/// Handler failures are logged and never stop the loop.
pub async fn run<F>(
    orchestrator: &mut Orchestrator,
    events: &mut mpsc::UnboundedReceiver<ReactorEvent>,
    shutdown: F,
) where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        orchestrator.run_timers(Instant::now());
        let deadline = orchestrator.next_deadline(Instant::now());

        tokio::select! {
            _ = &mut shutdown => {
                info!("reactor shutting down");
                break;
            }

            event = events.recv() => match event {
                Some(event) => dispatch(orchestrator, event),
                None => {
                    debug!("network event channel closed");
                    break;
                }
            },

            _ = async {
                match deadline {
                    Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
                    None => std::future::pending().await,
                }
            } => {}
        }
    }
}

fn dispatch(orchestrator: &mut Orchestrator, event: ReactorEvent) {
    let result = match event {
        ReactorEvent::Accepted(handle) => orchestrator.accepted(Box::new(handle)),
        ReactorEvent::Established(connection) => orchestrator.established(connection),
        ReactorEvent::Packet(connection, packet) => {
            orchestrator.packet_received(connection, packet)
        }
        ReactorEvent::Closed(connection) => orchestrator.closed(connection),
    };
    if let Err(err) = result {
        warn!(%err, "event handling failed");
    }
}
