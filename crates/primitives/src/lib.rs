//! Value types for the torchat peer network.
//!
//! - [`OnionId`] - canonical hidden-service identifier
//! - [`Status`] - announced presence
//! - [`ClientIdentity`] and [`Avatar`] - profile data
//! - [`Packet`] and [`PacketKind`] - decoded protocol packets

mod address;
mod packet;
mod profile;
mod status;

pub use address::{AddressError, ONION_SUFFIX, OnionId, is_valid_address, strip_suffix};
pub use packet::{COOKIE_LEN, Packet, PacketKind, new_cookie};
pub use profile::{AVATAR_ALPHA_LEN, AVATAR_RGB_LEN, AVATAR_SIZE, Avatar, ClientIdentity};
pub use status::Status;

/// Port every peer listens on behind its hidden service.
pub const DEFAULT_PEER_PORT: u16 = 11009;
