//! Profile data exchanged between peers: client identity and avatar buffers.

use bytes::Bytes;

/// Avatar edge length in pixels.
pub const AVATAR_SIZE: usize = 64;

/// Expected length of a complete RGB buffer.
pub const AVATAR_RGB_LEN: usize = AVATAR_SIZE * AVATAR_SIZE * 3;

/// Expected length of a complete alpha buffer.
pub const AVATAR_ALPHA_LEN: usize = AVATAR_SIZE * AVATAR_SIZE;

/// Name and version of the software a peer runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientIdentity {
    pub name: Option<String>,
    pub version: Option<String>,
}

impl ClientIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            version: Some(version.into()),
        }
    }
}

/// Raw avatar pixels, assembled from `profile_avatar` and `profile_avatar_alpha`.
///
/// No decoding happens here; buffers are kept exactly as received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Avatar {
    rgb: Option<Bytes>,
    alpha: Option<Bytes>,
}

impl Avatar {
    pub fn rgb(&self) -> Option<&Bytes> {
        self.rgb.as_ref()
    }

    pub fn alpha(&self) -> Option<&Bytes> {
        self.alpha.as_ref()
    }

    pub fn set_rgb(&mut self, rgb: Bytes) {
        self.rgb = Some(rgb);
    }

    pub fn set_alpha(&mut self, alpha: Bytes) {
        self.alpha = Some(alpha);
    }

    /// An RGB buffer of the expected size is present. Alpha is optional.
    pub fn is_complete(&self) -> bool {
        self.rgb.as_ref().is_some_and(|rgb| rgb.len() == AVATAR_RGB_LEN)
    }

    pub fn clear(&mut self) {
        self.rgb = None;
        self.alpha = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_assembly() {
        let mut avatar = Avatar::default();
        assert!(!avatar.is_complete());

        avatar.set_alpha(Bytes::from(vec![0xff; AVATAR_ALPHA_LEN]));
        assert!(!avatar.is_complete());

        avatar.set_rgb(Bytes::from(vec![0x10; AVATAR_RGB_LEN]));
        assert!(avatar.is_complete());
        assert_eq!(avatar.alpha().map(Bytes::len), Some(AVATAR_ALPHA_LEN));

        avatar.clear();
        assert!(avatar.rgb().is_none());
        assert!(avatar.alpha().is_none());
    }

    #[test]
    fn test_short_rgb_is_incomplete() {
        let mut avatar = Avatar::default();
        avatar.set_rgb(Bytes::from_static(b"\x00\x01\x02"));
        assert!(!avatar.is_complete());
    }
}
