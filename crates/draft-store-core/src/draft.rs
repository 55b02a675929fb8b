use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier used when the host does not supply one.
pub const DEFAULT_DRAFT_ID: &str = "default";

/// A persisted draft record.
///
/// At most one record per `id` exists in a durable store; writes are upserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: String,
    /// Draft text. An empty string means "no draft" and is never persisted on edit.
    pub content: String,
    /// Last update instant, non-decreasing per identifier.
    pub timestamp: DateTime<Utc>,
}

impl Draft {
    /// Create a draft stamped with the current time.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create the successor of a draft whose last known timestamp is `previous`.
    ///
    /// Wall clocks can step backwards; the new timestamp is clamped so it never
    /// precedes `previous`.
    pub fn successor(
        id: impl Into<String>,
        content: impl Into<String>,
        previous: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        let timestamp = match previous {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        Self {
            id: id.into(),
            content: content.into(),
            timestamp,
        }
    }

    /// Whether this record carries any text.
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Short digest of draft text, safe to put in logs.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..6])
}

/// Lifecycle status of a draft session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DraftStatus {
    #[default]
    Idle,
    Saving,
    Recovered,
    Uploading,
    Uploaded,
    Error,
    SavedOffline,
}

impl DraftStatus {
    /// Statuses that revert on a display timer rather than on an operation completing.
    pub fn reverts_on_timer(self) -> bool {
        !matches!(
            self,
            DraftStatus::Idle | DraftStatus::Saving | DraftStatus::Uploading
        )
    }
}

impl std::fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DraftStatus::Idle => write!(f, "idle"),
            DraftStatus::Saving => write!(f, "saving"),
            DraftStatus::Recovered => write!(f, "recovered"),
            DraftStatus::Uploading => write!(f, "uploading"),
            DraftStatus::Uploaded => write!(f, "uploaded"),
            DraftStatus::Error => write!(f, "error"),
            DraftStatus::SavedOffline => write!(f, "saved-offline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_successor_never_goes_backwards() {
        let future = Utc::now() + Duration::hours(1);
        let draft = Draft::successor("default", "hello", Some(future));
        assert_eq!(draft.timestamp, future);

        let past = Utc::now() - Duration::hours(1);
        let draft = Draft::successor("default", "hello", Some(past));
        assert!(draft.timestamp > past);
    }

    #[test]
    fn test_record_schema() {
        let draft = Draft::new("default", "hello");
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["id"], "default");
        assert_eq!(json["content"], "hello");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&DraftStatus::SavedOffline).unwrap(),
            "\"saved-offline\""
        );
        assert_eq!(DraftStatus::SavedOffline.to_string(), "saved-offline");
        assert!(DraftStatus::Recovered.reverts_on_timer());
        assert!(!DraftStatus::Saving.reverts_on_timer());
    }

    #[test]
    fn test_digest_is_stable_and_short() {
        assert_eq!(content_digest("hello"), content_digest("hello"));
        assert_ne!(content_digest("hello"), content_digest("hello!"));
        assert_eq!(content_digest("hello").len(), 12);
    }
}
