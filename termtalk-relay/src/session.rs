//! Per-connection challenge lifecycle and the verification pipeline.
//!
//! Each connection is in exactly one state at a time: Pending with its one
//! challenge, or Authenticated with its verified identity. The state lives
//! in a concurrent map keyed by connection id; transitions go through the
//! map's entry API so a check-and-transition is atomic per connection, and
//! no map lock is ever held across an await.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use termtalk_auth::challenge::{Challenge, Nonce};
use termtalk_auth::identity::{Fingerprint, PublicKey, Signature};
use uuid::Uuid;

use crate::error::VerifyError;
use crate::registry::{Binding, IdentityRegistry, RegistryError};
use crate::wire::AuthVerifyRequest;

/// Transport-assigned connection identifier. The transport mints a fresh
/// id per physical connection and never reuses one.
pub type ConnectionId = Uuid;

/// The verified identity a connection carries after its handshake.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub handle: String,
    pub fingerprint: Fingerprint,
    pub authenticated_at: i64,
}

/// A connection holds at most one of these; the variants are mutually
/// exclusive by construction.
enum ConnState {
    Pending(Challenge),
    Authenticated(AuthSession),
}

/// Outcome of checking a presented nonce against the live challenge.
enum Freshness {
    Ready,
    Expired,
    Mismatch,
    AlreadyAuthenticated,
}

/// Owns all per-connection authentication state.
pub struct SessionManager {
    connections: DashMap<ConnectionId, ConnState>,
    registry: Arc<IdentityRegistry>,
    challenge_ttl: i64,
}

impl SessionManager {
    pub fn new(registry: Arc<IdentityRegistry>, challenge_ttl: i64) -> Self {
        Self {
            connections: DashMap::new(),
            registry,
            challenge_ttl,
        }
    }

    /// Attach a connection and issue its one challenge.
    ///
    /// The returned challenge is for delivery to the client; the live copy
    /// stays here and is never replaced for the life of the connection.
    pub fn connect(&self, id: ConnectionId, now: i64) -> Challenge {
        let challenge = Challenge::issue(now, self.challenge_ttl);
        self.connections
            .insert(id, ConnState::Pending(challenge.clone()));
        tracing::debug!(connection = %id, expires_at = challenge.expires_at(), "challenge issued");
        challenge
    }

    /// Release all state for a connection.
    ///
    /// Removal is atomic: a verification that arrives for the id
    /// afterwards is rejected as unknown rather than processed.
    pub fn disconnect(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            tracing::debug!(connection = %id, "connection state released");
        }
    }

    /// Whether the connection holds an authenticated session.
    #[must_use]
    pub fn is_authenticated(&self, id: ConnectionId) -> bool {
        self.connections
            .get(&id)
            .map(|state| matches!(state.value(), ConnState::Authenticated(_)))
            .unwrap_or(false)
    }

    /// The verified identity of a connection, if it has one.
    #[must_use]
    pub fn identity_of(&self, id: ConnectionId) -> Option<AuthSession> {
        match self.connections.get(&id)?.value() {
            ConnState::Authenticated(session) => Some(session.clone()),
            ConnState::Pending(_) => None,
        }
    }

    /// Validate a challenge response and promote the connection on success.
    ///
    /// The steps run in a fixed order: freshness of the nonce, signature
    /// verification, then the registry's trust check. A nonce mismatch
    /// leaves the challenge live so the client may retry; expiry is
    /// terminal — the state is discarded and the client must reconnect for
    /// a fresh nonce.
    pub async fn verify(
        &self,
        id: ConnectionId,
        request: &AuthVerifyRequest,
        now: i64,
    ) -> Result<AuthSession, VerifyError> {
        // A nonce that does not even decode cannot match any challenge.
        let presented_nonce =
            Nonce::decode(&request.nonce).ok_or(VerifyError::InvalidOrExpiredNonce)?;

        match self.connections.entry(id) {
            Entry::Vacant(_) => return Err(VerifyError::InvalidRequest("unknown connection")),
            Entry::Occupied(entry) => {
                let freshness = match entry.get() {
                    ConnState::Authenticated(_) => Freshness::AlreadyAuthenticated,
                    ConnState::Pending(challenge) => {
                        if challenge.is_expired(now) {
                            Freshness::Expired
                        } else if challenge.nonce() != &presented_nonce {
                            Freshness::Mismatch
                        } else {
                            Freshness::Ready
                        }
                    }
                };
                match freshness {
                    Freshness::AlreadyAuthenticated => {
                        return Err(VerifyError::AlreadyAuthenticated)
                    }
                    Freshness::Expired => {
                        entry.remove();
                        return Err(VerifyError::InvalidOrExpiredNonce);
                    }
                    Freshness::Mismatch => return Err(VerifyError::InvalidOrExpiredNonce),
                    Freshness::Ready => {}
                }
            }
        }
        // The entry guard is released here; the signature and registry
        // work below must not block other connections' handlers.

        let key = self.resolve_key(request).await?;
        let signature =
            Signature::decode(&request.signature).ok_or(VerifyError::SignatureVerificationFailed)?;

        // The signed message is the nonce string exactly as delivered.
        if !key.verify(presented_nonce.encoded().as_bytes(), &signature) {
            return Err(VerifyError::SignatureVerificationFailed);
        }

        let binding = match self.registry.authenticate(&request.handle, &key, now).await {
            Ok(binding) => binding,
            Err(RegistryError::KeyMismatch { pinned, presented }) => {
                tracing::warn!(
                    connection = %id,
                    handle = %request.handle,
                    %pinned,
                    %presented,
                    "handle already bound to a different key"
                );
                return Err(VerifyError::KeyMismatch);
            }
            Err(err) => {
                tracing::error!(connection = %id, handle = %request.handle, error = %err, "registry failure");
                return Err(VerifyError::Internal(err));
            }
        };

        let session = AuthSession {
            handle: request.handle.clone(),
            fingerprint: key.fingerprint(),
            authenticated_at: now,
        };

        // Promote — unless the connection vanished or raced to
        // Authenticated while the registry call was in flight.
        match self.connections.entry(id) {
            Entry::Vacant(_) => return Err(VerifyError::InvalidRequest("unknown connection")),
            Entry::Occupied(mut entry) => {
                if matches!(entry.get(), ConnState::Authenticated(_)) {
                    return Err(VerifyError::AlreadyAuthenticated);
                }
                entry.insert(ConnState::Authenticated(session.clone()));
            }
        }

        let binding = match binding {
            Binding::Established => "established",
            Binding::Matched => "matched",
        };
        tracing::info!(
            connection = %id,
            handle = %session.handle,
            fingerprint = %session.fingerprint,
            binding,
            "connection authenticated"
        );
        Ok(session)
    }

    /// The key to verify against: the one supplied with the request, or
    /// the handle's registered key.
    ///
    /// Resolution failures collapse into `SignatureVerificationFailed` so
    /// the responses do not reveal whether a handle is registered.
    async fn resolve_key(&self, request: &AuthVerifyRequest) -> Result<PublicKey, VerifyError> {
        match request.public_key.as_deref() {
            Some(pem) => {
                PublicKey::from_pem(pem).map_err(|_| VerifyError::SignatureVerificationFailed)
            }
            None => {
                let identity = self
                    .registry
                    .lookup(&request.handle)
                    .await
                    .map_err(VerifyError::Internal)?;
                identity
                    .map(|identity| identity.public_key)
                    .ok_or(VerifyError::SignatureVerificationFailed)
            }
        }
    }
}
