use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::MessageResponse;
use crate::models::NotificationKind;

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// Full set of currently online users, sent to every connected client
    /// after each connect and disconnect
    OnlineUsers { user_ids: Vec<Uuid> },

    /// A new direct message addressed to this client
    NewMessage { message: MessageResponse },

    /// The other participant has seen everything in the conversation
    MessagesSeen { conversation_id: Uuid },

    /// An interaction (like/comment/follow) addressed to this client
    NewNotification {
        kind: NotificationKind,
        sender_id: Uuid,
        related_post_id: Option<Uuid>,
        message: String,
    },
}

/// Commands sent FROM client TO server over WebSocket.
///
/// Message composition is deliberately not a live command: sends go through
/// the REST surface so the durable write always precedes the push.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Mark every message in the conversation not authored by this
    /// connection's user as seen
    MarkSeen { conversation_id: Uuid },
}
