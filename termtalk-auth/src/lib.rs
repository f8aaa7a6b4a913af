//! Pure authentication library for termtalk.
//!
//! This crate is intentionally IO-free:
//! - No filesystem operations
//! - No network calls
//! - No database interactions
//! - No logging
//! - No clock reads — callers supply `now` as Unix seconds
//!
//! The relay wires these primitives to its transport and storage:
//! - [`identity`] - keys, detached signatures, fingerprints
//! - [`challenge`] - per-connection nonces and expiry
//! - [`tofu`] - trust-on-first-use binding decisions
//!
//! # Example
//!
//! ```
//! use termtalk_auth::challenge::Challenge;
//! use termtalk_auth::identity::{KeyKind, PrivateKey};
//!
//! // Server issues a challenge; client signs the delivered nonce string.
//! let challenge = Challenge::issue(1_700_000_000, 60);
//! let key = PrivateKey::generate(KeyKind::Ed25519);
//! let signature = key.sign(challenge.nonce().encoded().as_bytes());
//!
//! assert!(key
//!     .public_key()
//!     .verify(challenge.nonce().encoded().as_bytes(), &signature));
//! ```

pub mod challenge;
pub mod identity;
pub mod tofu;

pub use challenge::{Challenge, Nonce};
pub use identity::{DigestAlg, Fingerprint, KeyError, KeyKind, PrivateKey, PublicKey, Signature};
pub use tofu::{evaluate_binding, TofuOutcome};
