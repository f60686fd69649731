/// Database row types — these map directly to SQLite rows.
/// Distinct from the ripple-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub profile_pic: String,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub last_message_text: String,
    pub last_message_sender: Option<String>,
    pub last_message_seen: bool,
    pub last_activity_at: String,
    pub created_at: String,
}

/// Listing row: a conversation plus both participants' joined public
/// profiles. The caller picks the counterpart relative to the requester.
pub struct ConversationListRow {
    pub id: String,
    pub participant_a: String,
    pub participant_b: String,
    pub a_username: String,
    pub a_profile_pic: String,
    pub b_username: String,
    pub b_profile_pic: String,
    pub last_message_text: String,
    pub last_message_sender: Option<String>,
    pub last_message_seen: bool,
    pub last_activity_at: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub seen: bool,
    pub created_at: String,
}

pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    pub sender_username: String,
    pub sender_profile_pic: String,
    pub kind: String,
    pub related_post_id: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}
