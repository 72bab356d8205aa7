use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One syndicated entry surfaced to the user.
///
/// `feed_id` is the stable identifier of the owning [`Feed`](super::Feed),
/// resolved through the manager's feed list rather than held as a reference.
/// Items are immutable once constructed, except for the `read` flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub feed_id: String,
    pub id: String,
    /// Publish time reported by the source (receipt time when absent).
    pub timestamp: DateTime<Utc>,
    /// Local receipt time, used for age-based purging.
    pub received: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub link: String,
    pub author: String,
    #[serde(default)]
    pub read: bool,
}

impl Item {
    /// Derive a stable identity token from the first available identity
    /// source of an entry (native id, link or title).
    pub fn identity_token(feed_uuid: &str, key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(feed_uuid.as_bytes());
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// A random token for entries with no identity source at all, so they
    /// are never spuriously deduplicated.
    pub fn random_token() -> String {
        hex::encode(rand::random::<[u8; 16]>())
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }
}
