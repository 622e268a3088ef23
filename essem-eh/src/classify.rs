//! Event classification and validation
//!
//! Turns a raw delivery (routing key + JSON body) into a typed
//! [`EssenceEvent`]. The routing key selects the event kind against the
//! configured routing-key table; the body supplies the fields. Pure
//! functions, no I/O.

use chrono::{DateTime, Utc};
use essem_common::config::RoutingKeys;
use essem_common::events::EssenceEvent;
use serde::Deserialize;
use thiserror::Error;

/// Classification errors
///
/// All of these mean the message is malformed input: not retryable, the
/// dispatcher drops the message after acknowledging it.
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("unrecognized routing key: {0}")]
    UnknownRoutingKey(String),

    #[error("event payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("required field '{0}' is missing or empty")]
    MalformedPayload(&'static str),
}

#[derive(Debug, Deserialize)]
struct LinkedPayload {
    object_id: Option<String>,
    essence_id: Option<String>,
    md5: Option<String>,
    filename: Option<String>,
    media_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct UnlinkedPayload {
    object_id: Option<String>,
    essence_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct DeletedPayload {
    object_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
}

/// Classify a raw delivery into a typed essence event.
///
/// The routing key must match one of the three configured inbound keys;
/// the body must parse as JSON and carry every field the kind requires,
/// non-empty.
pub fn classify(
    routing_key: &str,
    payload: &[u8],
    routing: &RoutingKeys,
) -> Result<EssenceEvent, ClassificationError> {
    if routing_key == routing.essence_linked {
        let raw: LinkedPayload = serde_json::from_slice(payload)?;
        Ok(EssenceEvent::EssenceLinked {
            object_id: required(raw.object_id, "object_id")?,
            essence_id: required(raw.essence_id, "essence_id")?,
            md5: raw.md5.filter(|m| !m.trim().is_empty()),
            filename: required(raw.filename, "filename")?,
            media_id: required(raw.media_id, "media_id")?,
            timestamp: required_timestamp(raw.timestamp)?,
        })
    } else if routing_key == routing.essence_unlinked {
        let raw: UnlinkedPayload = serde_json::from_slice(payload)?;
        Ok(EssenceEvent::EssenceUnlinked {
            object_id: required(raw.object_id, "object_id")?,
            essence_id: required(raw.essence_id, "essence_id")?,
            timestamp: required_timestamp(raw.timestamp)?,
        })
    } else if routing_key == routing.object_deleted {
        let raw: DeletedPayload = serde_json::from_slice(payload)?;
        Ok(EssenceEvent::ObjectDeleted {
            object_id: required(raw.object_id, "object_id")?,
            timestamp: required_timestamp(raw.timestamp)?,
        })
    } else {
        Err(ClassificationError::UnknownRoutingKey(
            routing_key.to_string(),
        ))
    }
}

fn required(
    value: Option<String>,
    field: &'static str,
) -> Result<String, ClassificationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ClassificationError::MalformedPayload(field)),
    }
}

fn required_timestamp(
    value: Option<DateTime<Utc>>,
) -> Result<DateTime<Utc>, ClassificationError> {
    value.ok_or(ClassificationError::MalformedPayload("timestamp"))
}
