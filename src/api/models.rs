use std::cmp::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Server-assigned commit time, split the way the document store reports it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanoseconds: u32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanoseconds: u32) -> Self {
        Self { seconds, nanoseconds }
    }

    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self {
            seconds: i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX),
            nanoseconds: elapsed.subsec_nanos(),
        }
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seconds
            .cmp(&other.seconds)
            .then(self.nanoseconds.cmp(&other.nanoseconds))
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A committed chat message as delivered in a snapshot and mirrored in the cache.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub text: Option<String>,
    pub user: String,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
    #[serde(default)]
    pub image_base64: Option<String>,
}

impl Message {
    pub fn is_from(&self, user: &str) -> bool {
        self.user == user
    }
}

/// Outbound record. `id` and `createdAt` are filled in by the stream on append.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    pub text: Option<String>,
    pub user: String,
    pub image_base64: Option<String>,
}

impl NewMessage {
    pub fn text(user: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            text: Some(body.into()),
            user: user.into(),
            image_base64: None,
        }
    }

    pub fn image(user: impl Into<String>, image_base64: String, caption: Option<String>) -> Self {
        Self {
            text: caption,
            user: user.into(),
            image_base64: Some(image_base64),
        }
    }

    /// Turns the draft into a committed message once the stream has assigned its fields.
    pub fn commit(self, id: impl Into<String>, created_at: Timestamp) -> Message {
        Message {
            id: id.into(),
            text: self.text,
            user: self.user,
            created_at: Some(created_at),
            image_base64: self.image_base64,
        }
    }
}
