use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MediaKind, NotificationKind, PublicProfile};

// -- JWT Claims --

/// JWT claims shared across ripple-api (REST middleware) and the gateway
/// upgrade handler. Canonical definition lives here in ripple-types to
/// eliminate duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Messages --

/// Raw media attached to an outgoing message, resolved to a URL through the
/// media collaborator before the message is created.
#[derive(Debug, Deserialize)]
pub struct MediaPayload {
    /// Base64-encoded bytes
    pub data: String,
    pub kind: MediaKind,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub text: Option<String>,
    pub media: Option<MediaPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

// -- Conversations --

/// Denormalized summary of the newest message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub text: String,
    pub sender_id: Option<Uuid>,
    pub seen: bool,
}

/// A conversation as seen by one participant: the requester is stripped out
/// and `participant` is always the counterpart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub participant: PublicProfile,
    pub last_message: LastMessage,
    pub last_activity_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// -- Notifications --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractionRequest {
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub related_post_id: Option<Uuid>,
    pub message: String,
}

/// Outcome tag for a fan-out: persistence and push are independent effects
/// of the one logical operation, never an all-or-nothing transaction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NotifyOutcome {
    pub persisted: bool,
    pub pushed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub sender: PublicProfile,
    pub kind: NotificationKind,
    pub related_post_id: Option<Uuid>,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
