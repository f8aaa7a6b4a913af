//! Trust-on-first-use binding decisions.
//!
//! A handle is bound to whatever key first proves possession of it; any
//! later key presented for the same handle is rejected. The decision here
//! is pure — durable storage and per-handle serialization live with the
//! caller.

use crate::identity::{Fingerprint, PublicKey};

/// Result of checking a presented key against a handle's pinned key.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TofuOutcome {
    /// No key is pinned for the handle yet; the presented key becomes the
    /// binding.
    Established,
    /// The presented key equals the pinned key.
    Matched,
    /// The presented key differs from the pinned key.
    Mismatch {
        /// Fingerprint of the previously pinned key, for display.
        pinned: Fingerprint,
        /// Fingerprint of the key just presented, for display.
        presented: Fingerprint,
    },
}

/// Evaluate a presented key against the pinned key for a handle.
///
/// Comparison is over canonical key material, never over fingerprints —
/// the fingerprints carried by [`TofuOutcome::Mismatch`] exist only so the
/// conflict can be reported.
#[must_use]
pub fn evaluate_binding(pinned: Option<&PublicKey>, presented: &PublicKey) -> TofuOutcome {
    match pinned {
        None => TofuOutcome::Established,
        Some(key) if key == presented => TofuOutcome::Matched,
        Some(key) => TofuOutcome::Mismatch {
            pinned: key.fingerprint(),
            presented: presented.fingerprint(),
        },
    }
}
