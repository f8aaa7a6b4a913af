//! termtalk relay: a chat relay that admits terminal clients only after
//! they prove possession of a long-lived keypair.
//!
//! The handshake core lives in three modules:
//! - [`session`] - per-connection challenge lifecycle and verification
//! - [`registry`] - durable handle → key bindings (trust on first use)
//! - [`gateway`] - websocket transport hooks and chat broadcast
//!
//! [`wire`] defines the frames exchanged with clients and [`error`] the
//! failure taxonomy surfaced on the wire.

pub mod config;
pub mod error;
pub mod gateway;
pub mod registry;
pub mod session;
pub mod wire;
