//! Per-connection challenges and their single-use nonces.
//!
//! A connection receives exactly one challenge for its lifetime. The nonce
//! proves freshness of the client's response; the expiry deadline is a
//! wall-clock instant checked at verification time, so no timer task is
//! needed for correctness.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use subtle::ConstantTimeEq;

/// Nonce length in bytes (128 bits of entropy).
pub const NONCE_LEN: usize = 16;

/// A random single-use token bound to one challenge.
#[derive(Clone, Eq)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Generate a fresh random nonce.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random::<[u8; NONCE_LEN]>())
    }

    /// Create a nonce from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw nonce bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }

    /// Wire encoding of the nonce.
    ///
    /// Clients sign exactly these UTF-8 bytes, so the encoding is part of
    /// the signing contract.
    #[must_use]
    pub fn encoded(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    /// Decode a nonce from its wire form.
    ///
    /// Returns `None` for anything that is not base64 of exactly
    /// [`NONCE_LEN`] bytes.
    #[must_use]
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let bytes: [u8; NONCE_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl PartialEq for Nonce {
    fn eq(&self, other: &Self) -> bool {
        // Constant-time comparison so equality checks cannot be probed.
        self.0.ct_eq(&other.0).into()
    }
}

impl std::fmt::Debug for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Nonce({})", self.encoded())
    }
}

/// The challenge issued to a connection when it attaches.
///
/// Timestamps are Unix seconds supplied by the caller; the type itself
/// never reads a clock.
#[derive(Debug, Clone)]
pub struct Challenge {
    nonce: Nonce,
    issued_at: i64,
    expires_at: i64,
}

impl Challenge {
    /// Issue a challenge valid for `ttl_seconds` from `now`.
    #[must_use]
    pub fn issue(now: i64, ttl_seconds: i64) -> Self {
        Self {
            nonce: Nonce::generate(),
            issued_at: now,
            expires_at: now.saturating_add(ttl_seconds),
        }
    }

    /// The nonce the client must sign.
    #[must_use]
    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// When the challenge was issued.
    #[must_use]
    pub fn issued_at(&self) -> i64 {
        self.issued_at
    }

    /// The expiry deadline.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the deadline has passed.
    ///
    /// A response is acceptable only strictly before the deadline.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonces_are_unique() {
        let a = Nonce::generate();
        let b = Nonce::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_nonce_wire_roundtrip() {
        let nonce = Nonce::generate();
        let decoded = Nonce::decode(&nonce.encoded()).unwrap();
        assert_eq!(nonce, decoded);
    }

    #[test]
    fn test_nonce_decode_rejects_bad_input() {
        assert!(Nonce::decode("").is_none());
        assert!(Nonce::decode("!!!").is_none());
        // Valid base64 but wrong length.
        assert!(Nonce::decode("YWJj").is_none());
    }

    #[test]
    fn test_challenge_expiry_boundary() {
        let now = 1_700_000_000;
        let challenge = Challenge::issue(now, 60);

        assert_eq!(challenge.issued_at(), now);
        assert_eq!(challenge.expires_at(), now + 60);

        assert!(!challenge.is_expired(now));
        assert!(!challenge.is_expired(now + 59));
        // The deadline itself is already too late.
        assert!(challenge.is_expired(now + 60));
        assert!(challenge.is_expired(now + 61));
    }

    #[test]
    fn test_zero_ttl_challenge_is_immediately_expired() {
        let now = 1_700_000_000;
        let challenge = Challenge::issue(now, 0);
        assert!(challenge.is_expired(now));
    }
}
