//! Typed authentication failures and their wire taxonomy.
//!
//! Every failure the handshake can produce maps 1:1 onto an
//! [`AuthErrorKind`] carried by the wire `auth_error` frame. Infrastructure
//! failures keep their source chain for the log but cross the wire as a
//! bare `InternalError`.

use serde::{Deserialize, Serialize};

use crate::registry::RegistryError;

/// Wire-visible classification of a rejected handshake step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthErrorKind {
    /// Malformed or out-of-order request; the connection keeps its state.
    InvalidRequest,
    /// The nonce is not the live challenge's nonce, or the deadline passed.
    InvalidOrExpiredNonce,
    /// The signature did not verify under the resolved public key.
    SignatureVerificationFailed,
    /// The handle is already bound to a different key.
    KeyMismatch,
    /// The connection already holds an authenticated session.
    AlreadyAuthenticated,
    /// Registry or storage failure; safe to retry, never a silent success.
    InternalError,
}

/// Failure of a verification attempt.
///
/// `Display` is safe to put on the wire; internal detail stays in the
/// `source` chain.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum VerifyError {
    /// The request is malformed or addresses an unknown connection.
    #[error("invalid request: {0}")]
    InvalidRequest(&'static str),

    /// Nonce mismatch or expired challenge.
    #[error("invalid or expired nonce")]
    InvalidOrExpiredNonce,

    /// Signature verification failed.
    ///
    /// Deliberately covers every resolution failure as well — missing or
    /// unparseable key material is indistinguishable from a bad signature.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// The handle is bound to a different key.
    #[error("handle is bound to a different key")]
    KeyMismatch,

    /// The connection is already authenticated.
    #[error("connection is already authenticated")]
    AlreadyAuthenticated,

    /// Registry failure unrelated to the request itself.
    #[error("internal error")]
    Internal(#[source] RegistryError),
}

impl VerifyError {
    /// The wire kind this failure maps to.
    #[must_use]
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            VerifyError::InvalidRequest(_) => AuthErrorKind::InvalidRequest,
            VerifyError::InvalidOrExpiredNonce => AuthErrorKind::InvalidOrExpiredNonce,
            VerifyError::SignatureVerificationFailed => AuthErrorKind::SignatureVerificationFailed,
            VerifyError::KeyMismatch => AuthErrorKind::KeyMismatch,
            VerifyError::AlreadyAuthenticated => AuthErrorKind::AlreadyAuthenticated,
            VerifyError::Internal(_) => AuthErrorKind::InternalError,
        }
    }
}
