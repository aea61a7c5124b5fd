//! Presence announced by a peer.

use strum::{AsRefStr, Display, EnumString};

/// Last-announced availability of a peer.
///
/// The wire names follow the `status` packet payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, AsRefStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Status {
    #[default]
    #[strum(serialize = "offline")]
    Offline,
    #[strum(serialize = "available")]
    Available,
    #[strum(serialize = "away")]
    Away,
    #[strum(serialize = "xa")]
    ExtendedAway,
    #[strum(serialize = "dnd")]
    DoNotDisturb,
}

impl Status {
    pub fn is_online(&self) -> bool {
        !matches!(self, Status::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(Status::ExtendedAway.to_string(), "xa");
        assert_eq!("dnd".parse::<Status>().unwrap(), Status::DoNotDisturb);
        assert_eq!("available".parse::<Status>().unwrap(), Status::Available);
        assert!("busy".parse::<Status>().is_err());
    }

    #[test]
    fn test_default_is_offline() {
        assert_eq!(Status::default(), Status::Offline);
        assert!(!Status::Offline.is_online());
        assert!(Status::Away.is_online());
    }
}
