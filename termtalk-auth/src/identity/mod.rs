//! Cryptographic identity types for termtalk authentication.
//!
//! Keys are parsed from the standard PEM interchange encodings and come in
//! two kinds, Ed25519 and RSA:
//!
//! - [`PrivateKey`] - Signing key; PEM exports are zeroized on drop
//! - [`PublicKey`] - Verification key; equality compares canonical key material
//! - [`Signature`] - Detached signature over a message
//! - [`Fingerprint`] - Display digest, format `SHA256:{base64_no_padding}`
//!
//! # Security Properties
//!
//! - Verification never raises; every failure collapses to `false`
//! - The key-type → digest mapping is a fixed total function, never negotiated
//! - Fingerprint comparison uses constant-time equality
//! - Trust comparisons use key material, fingerprints are display-only
//!
//! # Example
//!
//! ```
//! use termtalk_auth::identity::{KeyKind, PrivateKey};
//!
//! let private_key = PrivateKey::generate(KeyKind::Ed25519);
//! let public_key = private_key.public_key();
//!
//! let message = b"challenge nonce";
//! let signature = private_key.sign(message);
//! assert!(public_key.verify(message, &signature));
//! ```

mod keys;

pub use keys::{DigestAlg, Fingerprint, KeyError, KeyKind, PrivateKey, PublicKey, Signature};
