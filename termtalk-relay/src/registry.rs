//! Durable handle → key bindings with trust-on-first-use semantics.
//!
//! The registry persists one row per handle: the canonical PEM of the key
//! that first authenticated it, plus first/last seen timestamps. The trust
//! decision itself is pure ([`termtalk_auth::tofu`]); this module supplies
//! storage and the atomicity the decision needs.
//!
//! # Concurrency
//!
//! Every create-or-match runs inside a single transaction on a
//! single-writer SQLite pool, so concurrent first-contact registrations
//! for one handle serialize: the first write wins and every later key for
//! that handle is a mismatch.

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use termtalk_auth::identity::{Fingerprint, PublicKey};
use termtalk_auth::tofu::{evaluate_binding, TofuOutcome};

/// A handle's registered identity.
#[derive(Debug, Clone)]
pub struct Identity {
    pub handle: String,
    pub public_key: PublicKey,
    /// Derived from `public_key` on load; never persisted.
    pub fingerprint: Fingerprint,
    pub first_seen_at: i64,
    pub last_seen_at: i64,
}

/// How an authentication related to the stored binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// First contact; the handle is now bound to this key.
    Established,
    /// The presented key equals the stored binding.
    Matched,
}

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The handle is bound to a different key. Fingerprints are carried
    /// for reporting only; the comparison used key material.
    #[error("handle is bound to a different key (pinned {pinned}, presented {presented})")]
    KeyMismatch {
        pinned: Fingerprint,
        presented: Fingerprint,
    },

    /// A stored key no longer parses; the row is unusable.
    #[error("stored key for handle {handle:?} does not parse")]
    CorruptKey { handle: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// SQLite-backed identity registry.
#[derive(Clone)]
pub struct IdentityRegistry {
    pool: SqlitePool,
}

impl IdentityRegistry {
    /// Create a registry over an existing pool, creating the table if
    /// needed.
    pub async fn new(pool: SqlitePool) -> Result<Self, RegistryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS identities (
                handle TEXT PRIMARY KEY,
                public_key TEXT NOT NULL,
                first_seen_at INTEGER NOT NULL,
                last_seen_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Open or create a file-backed registry.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            // Single writer keeps create-or-match serialized per handle.
            .max_connections(1)
            .connect_with(options)
            .await?;

        Self::new(pool).await
    }

    /// Check a presented key against the handle's binding, establishing it
    /// on first contact.
    ///
    /// # Errors
    ///
    /// `RegistryError::KeyMismatch` when the handle is bound to a
    /// different key — the security-critical branch.
    pub async fn authenticate(
        &self,
        handle: &str,
        presented: &PublicKey,
        now: i64,
    ) -> Result<Binding, RegistryError> {
        let mut tx = self.pool.begin().await?;

        let stored: Option<String> =
            sqlx::query_scalar("SELECT public_key FROM identities WHERE handle = ?1")
                .bind(handle)
                .fetch_optional(&mut *tx)
                .await?;

        let pinned = match stored {
            Some(pem) => Some(PublicKey::from_pem(&pem).map_err(|_| RegistryError::CorruptKey {
                handle: handle.to_string(),
            })?),
            None => None,
        };

        match evaluate_binding(pinned.as_ref(), presented) {
            TofuOutcome::Established => {
                sqlx::query(
                    r#"
                    INSERT INTO identities (handle, public_key, first_seen_at, last_seen_at)
                    VALUES (?1, ?2, ?3, ?3)
                    "#,
                )
                .bind(handle)
                .bind(presented.to_pem())
                .bind(now)
                .execute(&mut *tx)
                .await?;
                tx.commit().await?;
                Ok(Binding::Established)
            }
            TofuOutcome::Matched => {
                sqlx::query("UPDATE identities SET last_seen_at = ?2 WHERE handle = ?1")
                    .bind(handle)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(Binding::Matched)
            }
            TofuOutcome::Mismatch { pinned, presented } => {
                // Dropping the transaction rolls it back; the binding is
                // untouched.
                Err(RegistryError::KeyMismatch { pinned, presented })
            }
            // `TofuOutcome` is `#[non_exhaustive]`; all present variants are
            // handled above.
            _ => unreachable!("unhandled TofuOutcome variant"),
        }
    }

    /// Fetch a handle's registered identity, if any.
    pub async fn lookup(&self, handle: &str) -> Result<Option<Identity>, RegistryError> {
        let row = sqlx::query(
            "SELECT handle, public_key, first_seen_at, last_seen_at FROM identities WHERE handle = ?1",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let pem: String = row.try_get("public_key")?;
        let public_key = PublicKey::from_pem(&pem).map_err(|_| RegistryError::CorruptKey {
            handle: handle.to_string(),
        })?;
        let fingerprint = public_key.fingerprint();

        Ok(Some(Identity {
            handle: row.try_get("handle")?,
            public_key,
            fingerprint,
            first_seen_at: row.try_get("first_seen_at")?,
            last_seen_at: row.try_get("last_seen_at")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use termtalk_auth::identity::{KeyKind, PrivateKey};

    const NOW: i64 = 1_700_000_000;

    async fn test_registry() -> IdentityRegistry {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory database");
        IdentityRegistry::new(pool).await.expect("registry init")
    }

    fn test_key() -> PublicKey {
        PrivateKey::generate(KeyKind::Ed25519).public_key()
    }

    #[tokio::test]
    async fn test_first_contact_establishes_binding() {
        let registry = test_registry().await;
        let key = test_key();

        let binding = registry.authenticate("alice", &key, NOW).await.unwrap();
        assert_eq!(binding, Binding::Established);

        let identity = registry.lookup("alice").await.unwrap().unwrap();
        assert_eq!(identity.handle, "alice");
        assert_eq!(identity.public_key, key);
        assert_eq!(identity.fingerprint, key.fingerprint());
        assert_eq!(identity.first_seen_at, NOW);
        assert_eq!(identity.last_seen_at, NOW);
    }

    #[tokio::test]
    async fn test_same_key_matches_and_updates_last_seen() {
        let registry = test_registry().await;
        let key = test_key();

        registry.authenticate("alice", &key, NOW).await.unwrap();
        let binding = registry.authenticate("alice", &key, NOW + 30).await.unwrap();
        assert_eq!(binding, Binding::Matched);

        let identity = registry.lookup("alice").await.unwrap().unwrap();
        assert_eq!(identity.first_seen_at, NOW);
        assert_eq!(identity.last_seen_at, NOW + 30);
    }

    #[tokio::test]
    async fn test_different_key_rejected() {
        let registry = test_registry().await;
        let first = test_key();
        let second = test_key();

        registry.authenticate("alice", &first, NOW).await.unwrap();
        let err = registry
            .authenticate("alice", &second, NOW + 1)
            .await
            .unwrap_err();

        match err {
            RegistryError::KeyMismatch { pinned, presented } => {
                assert_eq!(pinned, first.fingerprint());
                assert_eq!(presented, second.fingerprint());
            }
            other => panic!("expected key mismatch, got {other:?}"),
        }

        // The binding survives the attempt untouched.
        let identity = registry.lookup("alice").await.unwrap().unwrap();
        assert_eq!(identity.public_key, first);
        assert_eq!(identity.last_seen_at, NOW);
    }

    #[tokio::test]
    async fn test_lookup_unknown_handle() {
        let registry = test_registry().await;
        assert!(registry.lookup("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handles_are_independent() {
        let registry = test_registry().await;
        let alice = test_key();
        let bob = test_key();

        registry.authenticate("alice", &alice, NOW).await.unwrap();
        let binding = registry.authenticate("bob", &bob, NOW).await.unwrap();
        assert_eq!(binding, Binding::Established);
    }

    #[tokio::test]
    async fn test_file_backed_registry_persists_bindings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identities.db");
        let key = test_key();

        {
            let registry = IdentityRegistry::open(&path).await.unwrap();
            registry.authenticate("alice", &key, NOW).await.unwrap();
        }

        // A fresh open over the same file sees the binding.
        let registry = IdentityRegistry::open(&path).await.unwrap();
        let identity = registry.lookup("alice").await.unwrap().unwrap();
        assert_eq!(identity.public_key, key);

        let other = test_key();
        let err = registry.authenticate("alice", &other, NOW).await.unwrap_err();
        assert!(matches!(err, RegistryError::KeyMismatch { .. }));
    }

    #[tokio::test]
    async fn test_concurrent_first_contact_single_winner() {
        let registry = Arc::new(test_registry().await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = Arc::clone(&registry);
            let key = test_key();
            handles.push(tokio::spawn(async move {
                registry.authenticate("mallory", &key, NOW).await
            }));
        }

        let mut established = 0;
        let mut mismatches = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(Binding::Established) => established += 1,
                Err(RegistryError::KeyMismatch { .. }) => mismatches += 1,
                other => panic!("unexpected outcome: {other:?}"),
            }
        }

        assert_eq!(established, 1, "exactly one first contact may win");
        assert_eq!(mismatches, 7);
    }
}
