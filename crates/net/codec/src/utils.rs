//! Payload escaping so arbitrary bytes fit on one line.
//!
//! `\` is written as `\/` and a newline as `\n`. Decoding reverses both.

/// Escape a payload for the wire.
pub fn escape(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + payload.len() / 8);
    for &b in payload {
        match b {
            b'\\' => out.extend_from_slice(b"\\/"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out
}

/// Reverse [`escape`]. Unrecognized escape sequences are kept verbatim.
pub fn unescape(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len());
    let mut iter = payload.iter().copied().peekable();
    while let Some(b) = iter.next() {
        if b == b'\\' {
            match iter.peek() {
                Some(b'n') => {
                    iter.next();
                    out.push(b'\n');
                    continue;
                }
                Some(b'/') => {
                    iter.next();
                    out.push(b'\\');
                    continue;
                }
                _ => {}
            }
        }
        out.push(b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_specials() {
        assert_eq!(escape(b"a\\b\nc"), b"a\\/b\\nc".to_vec());
        assert_eq!(unescape(b"a\\/b\\nc"), b"a\\b\nc".to_vec());
    }

    #[test]
    fn test_literal_backslash_n_survives() {
        // A payload containing the two characters `\` `n` must not become a newline.
        let raw = b"\\n".to_vec();
        let escaped = escape(&raw);
        assert_eq!(escaped, b"\\/n".to_vec());
        assert_eq!(unescape(&escaped), raw);
    }

    #[test]
    fn test_binary_payload_has_no_newline() {
        let raw: Vec<u8> = (0..=255u8).collect();
        let escaped = escape(&raw);
        assert!(!escaped.contains(&b'\n'));
        assert_eq!(unescape(&escaped), raw);
    }

    #[test]
    fn test_dangling_backslash_kept() {
        assert_eq!(unescape(b"abc\\"), b"abc\\".to_vec());
        assert_eq!(unescape(b"\\x"), b"\\x".to_vec());
    }
}
