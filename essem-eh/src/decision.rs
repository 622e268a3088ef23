//! Decision logic
//!
//! Given a validated event, decides whether the get-metadata cascade runs.
//! Linked events trigger exactly one repository lookup; unlinked and
//! deleted events never touch the repository. Deterministic for identical
//! (event, lookup result) input.

use essem_common::events::EssenceEvent;

use crate::outbound::{build_get_metadata_request, OutboundMessage};
use crate::services::repository::{EssenceLookup, LookupResult};

/// Terminal outcome for one inbound message
///
/// Drives the dispatcher's ack/nack/publish behavior; lives only within one
/// processing cycle.
#[derive(Debug, Clone)]
pub enum ProcessingOutcome {
    /// Publish the outbound message, then acknowledge the inbound one.
    Proceed(OutboundMessage),
    /// Business no-op: acknowledge, nothing published.
    Ignore(&'static str),
    /// Transient or contract failure: negatively acknowledge so the broker's
    /// dead-letter policy handles retry.
    Reject(String),
}

/// Decide the outcome for a classified event.
///
/// For linked events the lookup is invoked exactly once with the event's
/// object id. "Not found" is an expected business condition (ignore), a
/// failed lookup is a transient dependency failure (reject).
pub async fn decide<L>(
    event: &EssenceEvent,
    lookup: &L,
    get_metadata_key: &str,
) -> ProcessingOutcome
where
    L: EssenceLookup + ?Sized,
{
    match event {
        EssenceEvent::EssenceLinked {
            object_id,
            media_id,
            timestamp,
            ..
        } => match lookup.lookup(object_id).await {
            LookupResult::Found(record) => {
                if !record.qualifies() {
                    return ProcessingOutcome::Ignore(
                        "record does not qualify for metadata retrieval",
                    );
                }
                match build_get_metadata_request(
                    object_id,
                    media_id,
                    *timestamp,
                    &record,
                    get_metadata_key,
                ) {
                    Ok(message) => ProcessingOutcome::Proceed(message),
                    // Unreachable for classifier-validated events; treated as
                    // a per-message contract violation, never a crash.
                    Err(e) => ProcessingOutcome::Reject(format!("outbound build failed: {}", e)),
                }
            }
            LookupResult::NotFound => ProcessingOutcome::Ignore("object not found in repository"),
            LookupResult::LookupFailed(reason) => {
                ProcessingOutcome::Reject(format!("repository lookup failed: {}", reason))
            }
        },
        EssenceEvent::EssenceUnlinked { .. } | EssenceEvent::ObjectDeleted { .. } => {
            ProcessingOutcome::Ignore("no downstream action required")
        }
    }
}
