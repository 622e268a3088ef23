//! Outbound get-metadata message construction
//!
//! Maps a qualifying linked event and its repository record into the
//! get-metadata request published downstream. Only the decision logic
//! constructs these, and only on the linked-success path.

use chrono::{DateTime, Utc};
use essem_common::events::GetMetadataRequest;
use thiserror::Error;

use crate::services::repository::EssenceRecord;

/// Builder errors
#[derive(Debug, Error)]
pub enum BuilderError {
    /// Neither the event nor the record carries a usable correlation id.
    /// The classifier makes this unreachable for well-formed events; hitting
    /// it means a contract violation upstream.
    #[error("no correlation id available from event or repository record")]
    MissingCorrelationId,
}

/// A message ready to publish: routing key plus typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub routing_key: String,
    pub payload: GetMetadataRequest,
}

/// Build the get-metadata request for a linked essence.
///
/// The media id is taken from the event, falling back to the repository
/// record; the correlation id equals the media id.
pub fn build_get_metadata_request(
    object_id: &str,
    event_media_id: &str,
    timestamp: DateTime<Utc>,
    record: &EssenceRecord,
    get_metadata_key: &str,
) -> Result<OutboundMessage, BuilderError> {
    if object_id.trim().is_empty() {
        return Err(BuilderError::MissingCorrelationId);
    }

    let media_id = if !event_media_id.trim().is_empty() {
        event_media_id.to_string()
    } else {
        record
            .media_id
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
            .ok_or(BuilderError::MissingCorrelationId)?
    };

    Ok(OutboundMessage {
        routing_key: get_metadata_key.to_string(),
        payload: GetMetadataRequest {
            object_id: object_id.to_string(),
            correlation_id: media_id.clone(),
            media_id,
            timestamp,
        },
    })
}
