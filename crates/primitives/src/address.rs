//! Hidden-service identifiers and their canonical form.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Suffix appended to a bare identifier to form a full address.
pub const ONION_SUFFIX: &str = ".onion";

/// Length of a legacy (v2) hidden-service identifier.
const V2_ID_LEN: usize = 16;

/// Length of a v3 hidden-service identifier.
const V3_ID_LEN: usize = 56;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("{0} is an invalid onion id")]
    InvalidAddress(String),
}

/// Strip the `.onion` suffix, if present. Does not validate.
pub fn strip_suffix(raw: &str) -> &str {
    raw.strip_suffix(ONION_SUFFIX).unwrap_or(raw)
}

/// Whether `raw` is a bare identifier or an identifier followed by `.onion`.
pub fn is_valid_address(raw: &str) -> bool {
    let id = strip_suffix(raw);
    matches!(id.len(), V2_ID_LEN | V3_ID_LEN)
        && id.bytes().all(|b| matches!(b, b'a'..=b'z' | b'2'..=b'7'))
}

/// Canonical peer identifier: the bare base32 id without `.onion`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct OnionId(String);

impl OnionId {
    /// Validate and normalize an address literal.
    pub fn parse(raw: &str) -> Result<Self, AddressError> {
        if !is_valid_address(raw) {
            return Err(AddressError::InvalidAddress(raw.to_string()));
        }
        Ok(Self(strip_suffix(raw).to_string()))
    }

    /// The bare identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier with `.onion` re-appended.
    pub fn address(&self) -> String {
        format!("{}{}", self.0, ONION_SUFFIX)
    }
}

impl fmt::Display for OnionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OnionId {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for OnionId {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OnionId> for String {
    fn from(id: OnionId) -> Self {
        id.0
    }
}

impl AsRef<str> for OnionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_suffix() {
        let bare = OnionId::parse("abcdefghijklmnop").unwrap();
        let full = OnionId::parse("abcdefghijklmnop.onion").unwrap();

        assert_eq!(bare, full);
        assert_eq!(full.as_str(), "abcdefghijklmnop");
        assert_eq!(full.address(), "abcdefghijklmnop.onion");
    }

    #[test]
    fn test_v3_length_accepted() {
        let raw = "a".repeat(56);
        assert!(is_valid_address(&raw));
        assert!(is_valid_address(&format!("{raw}.onion")));
    }

    #[test]
    fn test_invalid_addresses() {
        for raw in [
            "",
            ".onion",
            "short",
            "abcdefghijklmno1",
            "ABCDEFGHIJKLMNOP",
            "abcdefghijklmnop.com",
            "abcdefghijklmnopq",
            "Alice",
        ] {
            assert!(!is_valid_address(raw), "{raw} should be invalid");
            assert_eq!(
                OnionId::parse(raw),
                Err(AddressError::InvalidAddress(raw.to_string()))
            );
        }
    }

    #[test]
    fn test_strip_suffix_only_once() {
        assert_eq!(strip_suffix("foo.onion"), "foo");
        assert_eq!(strip_suffix("foo"), "foo");
        assert_eq!(strip_suffix("foo.onion.onion"), "foo.onion");
    }
}
