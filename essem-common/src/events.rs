//! Event types for the essence lifecycle
//!
//! Provides the shared definitions for the three inbound essence events and
//! the outbound get-metadata request payload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Essence lifecycle events
///
/// The event kind is determined by the delivery routing key, not by a
/// discriminator inside the body, so the enum is not serde-tagged. Each
/// variant carries exactly the fields its kind requires; construction goes
/// through the classifier, which enforces presence.
#[derive(Debug, Clone, PartialEq)]
pub enum EssenceEvent {
    /// An essence was linked to its parent object record.
    ///
    /// The only kind that can cascade into a get-metadata request.
    EssenceLinked {
        /// Repository object id of the essence
        object_id: String,
        /// Archive-side essence id
        essence_id: String,
        /// MD5 checksum of the essence file, when the producer supplies one
        md5: Option<String>,
        /// Filename of the essence as stored
        filename: String,
        /// Media id used downstream as the correlation id
        media_id: String,
        /// Event creation time
        timestamp: DateTime<Utc>,
    },

    /// An essence was disassociated from its parent object record.
    ///
    /// Informational with respect to the get-metadata cascade.
    EssenceUnlinked {
        object_id: String,
        essence_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The parent object record was removed.
    ObjectDeleted {
        object_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl EssenceEvent {
    /// Stable kind label for logging
    pub fn kind(&self) -> &'static str {
        match self {
            EssenceEvent::EssenceLinked { .. } => "essence-linked",
            EssenceEvent::EssenceUnlinked { .. } => "essence-unlinked",
            EssenceEvent::ObjectDeleted { .. } => "object-deleted",
        }
    }

    /// Object id carried by every kind
    pub fn object_id(&self) -> &str {
        match self {
            EssenceEvent::EssenceLinked { object_id, .. }
            | EssenceEvent::EssenceUnlinked { object_id, .. }
            | EssenceEvent::ObjectDeleted { object_id, .. } => object_id,
        }
    }
}

/// Payload of the outbound get-metadata request
///
/// The correlation id equals the media id: downstream consumers correlate
/// the metadata response with the essence through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetMetadataRequest {
    pub object_id: String,
    pub media_id: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap()
    }

    #[test]
    fn kind_labels_are_stable() {
        let linked = EssenceEvent::EssenceLinked {
            object_id: "O1".into(),
            essence_id: "E1".into(),
            md5: None,
            filename: "a.mp4".into(),
            media_id: "M1".into(),
            timestamp: ts(),
        };
        assert_eq!(linked.kind(), "essence-linked");
        assert_eq!(linked.object_id(), "O1");

        let deleted = EssenceEvent::ObjectDeleted {
            object_id: "O2".into(),
            timestamp: ts(),
        };
        assert_eq!(deleted.kind(), "object-deleted");
        assert_eq!(deleted.object_id(), "O2");
    }

    #[test]
    fn get_metadata_request_round_trips_field_names() {
        let request = GetMetadataRequest {
            object_id: "O1".into(),
            media_id: "M1".into(),
            correlation_id: "M1".into(),
            timestamp: ts(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["object_id"], "O1");
        assert_eq!(json["media_id"], "M1");
        assert_eq!(json["correlation_id"], "M1");
    }
}
