//! 64-bit ring hash. MD5-derived: digest the identity string, reinterpret the
//! first 8 bytes as a little-endian u64. Must stay stable across releases —
//! ring membership and replica placement both depend on it.

use md5::{Digest, Md5};

pub fn hash64(s: &str) -> u64 {
    let digest = Md5::digest(s.as_bytes());
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(buf)
}

/// Canonical identity string for a follower's ring position.
pub fn identity(host: &str, port: u16) -> String {
    format!("{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_across_calls() {
        assert_eq!(hash64("a:9000"), hash64("a:9000"));
    }

    #[test]
    fn distinguishes_inputs() {
        assert_ne!(hash64("a:9000"), hash64("a:9001"));
    }

    #[test]
    fn identity_format() {
        assert_eq!(identity("a", 9000), "a:9000");
    }
}
