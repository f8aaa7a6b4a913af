//! Frames exchanged with terminal clients.
//!
//! JSON text frames tagged by `type`. Deserialization is the schema check:
//! the gateway never touches untyped data past this boundary — a frame
//! either parses into one of these variants or is rejected as
//! `InvalidRequest`.
//!
//! Signatures and nonces travel base64-encoded. The client signs the UTF-8
//! bytes of the `nonce` field exactly as delivered in `auth_challenge`.

use serde::{Deserialize, Serialize};

use crate::error::AuthErrorKind;

/// Frames the client sends to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Response to the connection's challenge.
    AuthVerify(AuthVerifyRequest),
    /// Chat traffic; only accepted from authenticated connections.
    Message(ChatMessage),
}

/// Frames the relay sends to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Issued once per connection, immediately after attach.
    #[serde(rename_all = "camelCase")]
    AuthChallenge { nonce: String, expires_at: i64 },
    /// The handshake completed; the connection may now chat.
    AuthSuccess { handle: String, fingerprint: String },
    /// A handshake step was rejected.
    AuthError { kind: AuthErrorKind, message: String },
    /// Chat traffic relayed to authenticated connections.
    Message(ChatMessage),
}

/// The client's answer to a challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthVerifyRequest {
    /// Handle the client wants to authenticate as.
    pub handle: String,
    /// Base64 detached signature over the nonce string.
    pub signature: String,
    /// Echo of the challenged nonce.
    pub nonce: String,
    /// PEM public key; may be omitted once the handle is registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// A chat message as relayed between clients.
///
/// The relay overwrites `sender` with the verified session identity before
/// broadcasting; whatever the client put there is discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: MessageSender,
    pub payload: MessagePayload,
    pub context: MessageContext,
}

/// Verified author of a relayed message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSender {
    pub handle: String,
    pub public_key_fingerprint: String,
}

/// Message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Text,
    Code,
    System,
    Reaction,
}

/// Client context attached to a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageContext {
    pub mode: ChatMode,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatMode {
    Chill,
    Dev,
}

/// Optional ambient context a client may attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spotify_track: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
}
