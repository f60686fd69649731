use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub profile_pic: String,
    pub created_at: DateTime<Utc>,
}

/// Public projection of a user, attached to conversation and notification
/// listings. Never carries credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub profile_pic: String,
}

/// Closed set of interaction kinds that fan out as notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Follow,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Comment => "comment",
            Self::Follow => "follow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(Self::Like),
            "comment" => Some(Self::Comment),
            "follow" => Some(Self::Follow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

/// SQLite stores timestamps as text — millisecond precision via strftime, or
/// plain "YYYY-MM-DD HH:MM:SS" from older rows. Parse leniently; a corrupt
/// value logs and collapses to the epoch rather than failing a whole listing.
pub fn parse_db_timestamp(raw: &str, context: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on {}: {}", raw, context, e);
            DateTime::default()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_millisecond_and_second_timestamps() {
        let ms = parse_db_timestamp("2026-08-07 12:30:45.123", "test");
        let s = parse_db_timestamp("2026-08-07 12:30:45", "test");
        assert_eq!(ms.timestamp(), s.timestamp());
        assert_eq!(ms.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn corrupt_timestamp_collapses_to_epoch() {
        assert_eq!(
            parse_db_timestamp("not-a-time", "test"),
            DateTime::<Utc>::default()
        );
    }

    #[test]
    fn notification_kind_round_trips_through_storage_text() {
        for kind in [
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::Follow,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("repost"), None);
    }
}
