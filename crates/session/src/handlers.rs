//! Default handlers: the ping/pong handshake, the profile bundle sent after
//! verification, and ingestion of the remote's profile and presence.

use torchat_net_peers::{Peer, PeerError};
use torchat_primitives::{OnionId, Packet, PacketKind, Status};
use tracing::{debug, warn};

use crate::error::SessionError;
use crate::event::{Event, EventTag};
use crate::orchestrator::Orchestrator;

pub(crate) fn install_handshake(orchestrator: &mut Orchestrator) {
    orchestrator.on(PacketKind::Ping, on_ping);
    orchestrator.on(PacketKind::Pong, on_pong);
    orchestrator.on(EventTag::Connection, on_connection);
}

pub(crate) fn install_profile_bundle(orchestrator: &mut Orchestrator) {
    orchestrator.on(EventTag::Verification, on_verification);
}

pub(crate) fn install_ingest(orchestrator: &mut Orchestrator) {
    orchestrator.on(PacketKind::ProfileName, on_profile_name);
    orchestrator.on(PacketKind::ProfileText, on_profile_text);
    orchestrator.on(PacketKind::ProfileAvatar, on_profile_avatar);
    orchestrator.on(PacketKind::ProfileAvatarAlpha, on_profile_avatar_alpha);
    orchestrator.on(PacketKind::Client, on_client);
    orchestrator.on(PacketKind::Version, on_version);
    orchestrator.on(PacketKind::Status, on_status);
}

/// A ping names the remote. On an unclaimed incoming connection it also tells
/// us which peer the connection belongs to.
fn on_ping(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    let Some(inbound) = event.packet() else {
        return Ok(());
    };
    let Packet::Ping { address, cookie } = &inbound.packet else {
        return Ok(());
    };

    if address == orchestrator.id() {
        warn!(connection = %inbound.connection, "ping carries our own address");
        return Ok(());
    }

    match &inbound.sender {
        None if orchestrator.is_unowned(inbound.connection) => {
            orchestrator.claim_incoming(inbound.connection, address)?;
        }
        None => return Ok(()),
        Some(sender) if sender != address => {
            warn!(peer = %sender, claimed = %address, "ping address does not match connection owner");
            return Ok(());
        }
        Some(_) => {}
    }

    orchestrator.with_peer(address.as_str(), |peer, _| {
        peer.set_remote_cookie(cookie.clone());
    })?;
    answer_ping(orchestrator, address)
}

/// Answer the remote's cookie once our outgoing flow can carry it.
fn answer_ping(orchestrator: &mut Orchestrator, id: &OnionId) -> Result<(), SessionError> {
    orchestrator
        .with_peer(id.as_str(), |peer, _| -> Result<(), PeerError> {
            if !peer.is_connected() {
                return Ok(());
            }
            match peer.take_remote_cookie() {
                Some(cookie) => peer.send_packet_forced(Packet::Pong { cookie }),
                None => Ok(()),
            }
        })?
        .transpose()?;
    Ok(())
}

fn on_connection(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    match event {
        Event::Connection(id) => answer_ping(orchestrator, id),
        _ => Ok(()),
    }
}

/// A pong echoing our cookie proves the remote owns the address it claimed.
fn on_pong(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    let Some(inbound) = event.packet() else {
        return Ok(());
    };
    let (Some(sender), Packet::Pong { cookie }) = (&inbound.sender, &inbound.packet) else {
        return Ok(());
    };

    let matched = orchestrator.with_peer(sender.as_str(), |peer, link| {
        if peer.cookie() != cookie {
            return false;
        }
        peer.pong();
        peer.mark_verified(link);
        true
    })?;

    if matched == Some(false) {
        warn!(peer = %sender, "pong with unexpected cookie");
    }
    Ok(())
}

/// Announce who we are to a freshly verified peer.
fn on_verification(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    let Event::Verification(id) = event else {
        return Ok(());
    };

    let client = orchestrator.client().clone();
    let name = orchestrator.name().map(str::to_owned);
    let description = orchestrator.description().map(str::to_owned);

    orchestrator
        .with_peer(id.as_str(), |peer, _| -> Result<(), PeerError> {
            peer.send_packet(Packet::Client(client.name.unwrap_or_default()))?;
            peer.send_packet(Packet::Version(client.version.unwrap_or_default()))?;
            peer.send_packet(Packet::AddMe)?;
            peer.send_packet(Packet::Status(Status::Available))?;

            if let Some(name) = name {
                peer.send_packet(Packet::ProfileName(name))?;
            }
            if let Some(description) = description {
                peer.send_packet(Packet::ProfileText(description))?;
            }
            debug!(peer = %peer.id(), "profile bundle sent");
            Ok(())
        })?
        .transpose()?;
    Ok(())
}

/// Apply `update` to the sender of a packet event, if it is a known peer.
fn update_sender(
    orchestrator: &mut Orchestrator,
    event: &Event,
    update: impl FnOnce(&mut Peer, &Packet),
) -> Result<(), SessionError> {
    let Some(inbound) = event.packet() else {
        return Ok(());
    };
    let Some(sender) = &inbound.sender else {
        debug!(connection = %inbound.connection, kind = %inbound.packet.kind(), "packet from unclaimed connection");
        return Ok(());
    };
    if let Some(peer) = orchestrator.registry_mut().get_mut(sender) {
        update(peer, &inbound.packet);
    }
    Ok(())
}

fn on_profile_name(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    update_sender(orchestrator, event, |peer, packet| {
        if let Packet::ProfileName(name) = packet {
            peer.set_name(name.clone());
        }
    })
}

fn on_profile_text(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    update_sender(orchestrator, event, |peer, packet| {
        if let Packet::ProfileText(text) = packet {
            peer.set_description(text.clone());
        }
    })
}

fn on_profile_avatar(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    update_sender(orchestrator, event, |peer, packet| {
        if let Packet::ProfileAvatar(rgb) = packet {
            peer.avatar_mut().set_rgb(rgb.clone());
        }
    })
}

fn on_profile_avatar_alpha(
    orchestrator: &mut Orchestrator,
    event: &Event,
) -> Result<(), SessionError> {
    update_sender(orchestrator, event, |peer, packet| {
        if let Packet::ProfileAvatarAlpha(alpha) = packet {
            peer.avatar_mut().set_alpha(alpha.clone());
        }
    })
}

fn on_client(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    update_sender(orchestrator, event, |peer, packet| {
        if let Packet::Client(name) = packet {
            peer.client_mut().name = Some(name.clone());
        }
    })
}

fn on_version(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    update_sender(orchestrator, event, |peer, packet| {
        if let Packet::Version(version) = packet {
            peer.client_mut().version = Some(version.clone());
        }
    })
}

fn on_status(orchestrator: &mut Orchestrator, event: &Event) -> Result<(), SessionError> {
    update_sender(orchestrator, event, |peer, packet| {
        if let Packet::Status(status) = packet {
            peer.set_status(*status);
        }
    })
}
