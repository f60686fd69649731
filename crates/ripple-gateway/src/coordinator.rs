use std::sync::Arc;

use anyhow::anyhow;
use tracing::warn;
use uuid::Uuid;

use ripple_db::Database;
use ripple_db::models::{ConversationListRow, MessageRow, NotificationRow};
use ripple_types::api::{
    ConversationResponse, LastMessage, MessageResponse, NotificationResponse, NotifyOutcome,
};
use ripple_types::error::CoreError;
use ripple_types::events::GatewayEvent;
use ripple_types::models::{
    MediaKind, NotificationKind, PublicProfile, parse_db_timestamp,
};

use crate::dispatcher::Dispatcher;
use crate::media::MediaStore;

/// Raw media attached to an outgoing message.
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub kind: MediaKind,
}

/// Pairs every durable operation with its best-effort live push. Sole writer
/// of conversations, messages and notifications; the registry never
/// persists anything.
#[derive(Clone)]
pub struct Coordinator {
    db: Arc<Database>,
    dispatcher: Dispatcher,
    media: Arc<dyn MediaStore>,
}

impl Coordinator {
    pub fn new(db: Arc<Database>, dispatcher: Dispatcher, media: Arc<dyn MediaStore>) -> Self {
        Self {
            db,
            dispatcher,
            media,
        }
    }

    /// Send a direct message: find-or-create the pair's conversation, append
    /// the message, overwrite the summary, then push to the recipient if a
    /// live connection exists. Media resolves to a URL through the
    /// collaborator before anything is persisted.
    pub async fn send_message(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        text: Option<String>,
        media: Option<MediaUpload>,
    ) -> Result<MessageResponse, CoreError> {
        let text = text.filter(|t| !t.trim().is_empty());
        if text.is_none() && media.is_none() {
            return Err(CoreError::Validation(
                "message needs text or media".to_string(),
            ));
        }

        // Both identities must resolve before any other effect.
        self.run_db(move |db| {
            for id in [sender_id, recipient_id] {
                if db.get_user_by_id(&id.to_string())?.is_none() {
                    return Err(CoreError::NotFound(format!("unknown user {}", id)));
                }
            }
            Ok(())
        })
        .await?;

        let media_url = match media {
            Some(upload) => Some(self.media.upload(upload.bytes, upload.kind).await?),
            None => None,
        };

        let message_id = Uuid::new_v4();
        // Used only if the pair has no conversation yet.
        let new_conversation_id = Uuid::new_v4();

        let row = self
            .run_db(move |db| {
                let conversation = db.find_or_create_conversation(
                    &new_conversation_id.to_string(),
                    &sender_id.to_string(),
                    &recipient_id.to_string(),
                )?;
                Ok(db.append_message(
                    &message_id.to_string(),
                    &conversation.id,
                    &sender_id.to_string(),
                    text.as_deref(),
                    media_url.as_deref(),
                )?)
            })
            .await?;

        let message = message_response(row);

        // Best-effort: an offline recipient is the normal case, not an error.
        self.dispatcher
            .send_to_user(
                recipient_id,
                GatewayEvent::NewMessage {
                    message: message.clone(),
                },
            )
            .await;

        Ok(message)
    }

    /// Flip seen on every message the viewer has not authored, flip the
    /// conversation's denormalized seen flag, and tell the other participant.
    /// Idempotent; the flips are scoped to messages existing at call time.
    pub async fn mark_seen(&self, conversation_id: Uuid, viewer_id: Uuid) -> Result<(), CoreError> {
        let other = self
            .run_db(move |db| {
                let conversation = db
                    .get_conversation(&conversation_id.to_string())?
                    .ok_or_else(|| {
                        CoreError::NotFound(format!("unknown conversation {}", conversation_id))
                    })?;

                let viewer = viewer_id.to_string();
                let other = if conversation.participant_a == viewer {
                    conversation.participant_b
                } else if conversation.participant_b == viewer {
                    conversation.participant_a
                } else {
                    // A non-participant sees the conversation as nonexistent.
                    return Err(CoreError::NotFound(format!(
                        "unknown conversation {}",
                        conversation_id
                    )));
                };

                db.mark_messages_seen(&conversation_id.to_string(), &viewer)?;
                Ok(other)
            })
            .await?;

        let other_id: Uuid = other
            .parse()
            .map_err(|_| CoreError::Internal(anyhow!("corrupt participant id '{}'", other)))?;

        self.dispatcher
            .send_to_user(other_id, GatewayEvent::MessagesSeen { conversation_id })
            .await;

        Ok(())
    }

    /// All conversations the user participates in, newest activity first.
    /// The requester is stripped out: each entry exposes only the
    /// counterpart's public profile.
    pub async fn list_conversations(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationResponse>, CoreError> {
        let rows = self
            .run_db(move |db| Ok(db.list_conversations_for(&user_id.to_string())?))
            .await?;

        let me = user_id.to_string();
        Ok(rows
            .into_iter()
            .map(|row| conversation_response(row, &me))
            .collect())
    }

    /// All messages in the conversation, newest first.
    pub async fn list_messages(
        &self,
        conversation_id: Uuid,
    ) -> Result<Vec<MessageResponse>, CoreError> {
        let rows = self
            .run_db(move |db| {
                if db.get_conversation(&conversation_id.to_string())?.is_none() {
                    return Err(CoreError::NotFound(format!(
                        "unknown conversation {}",
                        conversation_id
                    )));
                }
                Ok(db.list_messages(&conversation_id.to_string())?)
            })
            .await?;

        Ok(rows.into_iter().map(message_response).collect())
    }

    /// Fan out an interaction: persist the notification row, then attempt a
    /// live push. The two effects are independent — the row is written even
    /// with no live connection, and a push failure never rolls it back.
    pub async fn notify(
        &self,
        recipient_id: Uuid,
        sender_id: Uuid,
        kind: NotificationKind,
        related_post_id: Option<Uuid>,
        message: String,
    ) -> Result<NotifyOutcome, CoreError> {
        // A user never notifies themselves.
        if recipient_id == sender_id {
            return Ok(NotifyOutcome {
                persisted: false,
                pushed: false,
            });
        }

        let notification_id = Uuid::new_v4();
        let text = message.clone();
        self.run_db(move |db| {
            if db.get_user_by_id(&recipient_id.to_string())?.is_none() {
                return Err(CoreError::NotFound(format!("unknown user {}", recipient_id)));
            }
            db.insert_notification(
                &notification_id.to_string(),
                &recipient_id.to_string(),
                &sender_id.to_string(),
                kind.as_str(),
                related_post_id.map(|p| p.to_string()).as_deref(),
                &text,
            )?;
            Ok(())
        })
        .await?;

        let pushed = self
            .dispatcher
            .send_to_user(
                recipient_id,
                GatewayEvent::NewNotification {
                    kind,
                    sender_id,
                    related_post_id,
                    message,
                },
            )
            .await;

        Ok(NotifyOutcome {
            persisted: true,
            pushed,
        })
    }

    /// All notifications addressed to the user, newest first, with the
    /// sender's public profile attached.
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<NotificationResponse>, CoreError> {
        let rows = self
            .run_db(move |db| Ok(db.list_notifications_for(&user_id.to_string())?))
            .await?;

        Ok(rows.into_iter().filter_map(notification_response).collect())
    }

    /// Idempotent false→true flip of a notification's read flag.
    pub async fn mark_read(&self, notification_id: Uuid) -> Result<(), CoreError> {
        self.run_db(move |db| {
            if !db.mark_notification_read(&notification_id.to_string())? {
                return Err(CoreError::NotFound(format!(
                    "unknown notification {}",
                    notification_id
                )));
            }
            Ok(())
        })
        .await
    }

    /// Run blocking SQLite work off the async runtime.
    async fn run_db<T, F>(&self, f: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T, CoreError> + Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| CoreError::Internal(anyhow!("blocking task join error: {}", e)))?
    }
}

fn parse_uuid(raw: &str, context: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt id '{}' on {}: {}", raw, context, e);
        Uuid::default()
    })
}

fn message_response(row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: parse_uuid(&row.id, "message"),
        conversation_id: parse_uuid(&row.conversation_id, "message"),
        sender_id: parse_uuid(&row.sender_id, "message"),
        text: row.text,
        media_url: row.media_url,
        seen: row.seen,
        created_at: parse_db_timestamp(&row.created_at, "message"),
    }
}

fn conversation_response(row: ConversationListRow, me: &str) -> ConversationResponse {
    let participant = if row.participant_a == me {
        PublicProfile {
            id: parse_uuid(&row.participant_b, "conversation"),
            username: row.b_username,
            profile_pic: row.b_profile_pic,
        }
    } else {
        PublicProfile {
            id: parse_uuid(&row.participant_a, "conversation"),
            username: row.a_username,
            profile_pic: row.a_profile_pic,
        }
    };

    ConversationResponse {
        id: parse_uuid(&row.id, "conversation"),
        participant,
        last_message: LastMessage {
            text: row.last_message_text,
            sender_id: row.last_message_sender.and_then(|s| s.parse().ok()),
            seen: row.last_message_seen,
        },
        last_activity_at: parse_db_timestamp(&row.last_activity_at, "conversation"),
        created_at: parse_db_timestamp(&row.created_at, "conversation"),
    }
}

fn notification_response(row: NotificationRow) -> Option<NotificationResponse> {
    let kind = match NotificationKind::parse(&row.kind) {
        Some(kind) => kind,
        None => {
            warn!("Corrupt kind '{}' on notification '{}'", row.kind, row.id);
            return None;
        }
    };

    Some(NotificationResponse {
        id: parse_uuid(&row.id, "notification"),
        sender: PublicProfile {
            id: parse_uuid(&row.sender_id, "notification"),
            username: row.sender_username,
            profile_pic: row.sender_profile_pic,
        },
        kind,
        related_post_id: row.related_post_id.and_then(|p| p.parse().ok()),
        message: row.message,
        is_read: row.is_read,
        created_at: parse_db_timestamp(&row.created_at, "notification"),
    })
}
