//! Per-message dispatch
//!
//! Drives one inbound message through classify → decide → publish and
//! returns the acknowledgement decision as a typed [`Disposition`]. The
//! transport applies the disposition; the dispatcher itself never touches
//! broker acknowledgements.
//!
//! One processing cycle per message. Cycles hold no shared mutable state,
//! so independent messages only interleave at the transport layer (bounded
//! by the prefetch count).

use async_trait::async_trait;
use essem_common::config::RoutingKeys;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::classify::classify;
use crate::decision::{decide, ProcessingOutcome};
use crate::outbound::OutboundMessage;
use crate::services::repository::EssenceLookup;

/// One inbound delivery, borrowed for the duration of a processing cycle.
#[derive(Debug, Clone, Copy)]
pub struct RawMessage<'a> {
    pub routing_key: &'a str,
    pub payload: &'a [u8],
}

/// Acknowledgement decision for one inbound message.
///
/// Made exactly once per message, after every downstream effect for that
/// message has resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge and move on.
    Ack,
    /// Negatively acknowledge; `requeue: false` routes the message to the
    /// broker's dead-letter policy.
    Nack { requeue: bool },
}

/// Publish failure reported by the transport seam.
#[derive(Debug, Error)]
#[error("publish failed: {0}")]
pub struct PublishError(pub String);

/// Outbound seam between the dispatcher and the transport.
///
/// Production uses the AMQP client; tests inject fakes.
#[async_trait]
pub trait MetadataRequestPublisher: Send + Sync {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError>;
}

/// Processes inbound messages one at a time.
pub struct Dispatcher<L, P> {
    lookup: L,
    publisher: P,
    routing: RoutingKeys,
}

impl<L, P> Dispatcher<L, P>
where
    L: EssenceLookup,
    P: MetadataRequestPublisher,
{
    pub fn new(lookup: L, publisher: P, routing: RoutingKeys) -> Self {
        Self {
            lookup,
            publisher,
            routing,
        }
    }

    /// Run one full processing cycle for an inbound message.
    ///
    /// Emits exactly one terminal log record per message. Malformed input is
    /// acknowledged and dropped (it would fail identically on redelivery);
    /// rejects and failed publishes are negatively acknowledged so the
    /// broker's dead-letter policy takes over.
    pub async fn process(&self, raw: &RawMessage<'_>) -> Disposition {
        let event = match classify(raw.routing_key, raw.payload, &self.routing) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    routing_key = raw.routing_key,
                    error = %e,
                    outcome = "dropped",
                    "Dropping unclassifiable message"
                );
                return Disposition::Ack;
            }
        };

        let outcome = decide(&event, &self.lookup, &self.routing.get_metadata).await;

        match outcome {
            ProcessingOutcome::Proceed(message) => match self.publisher.publish(&message).await {
                Ok(()) => {
                    info!(
                        kind = event.kind(),
                        object_id = event.object_id(),
                        media_id = %message.payload.media_id,
                        outcome = "published",
                        "Get-metadata request sent"
                    );
                    Disposition::Ack
                }
                Err(e) => {
                    error!(
                        kind = event.kind(),
                        object_id = event.object_id(),
                        error = %e,
                        outcome = "publish-failed",
                        "Publish failed, returning message to the broker"
                    );
                    Disposition::Nack { requeue: false }
                }
            },
            ProcessingOutcome::Ignore(reason) => {
                info!(
                    kind = event.kind(),
                    object_id = event.object_id(),
                    reason,
                    outcome = "ignored",
                    "Event requires no downstream action"
                );
                Disposition::Ack
            }
            ProcessingOutcome::Reject(reason) => {
                error!(
                    kind = event.kind(),
                    object_id = event.object_id(),
                    reason = %reason,
                    outcome = "rejected",
                    "Event handling failed"
                );
                Disposition::Nack { requeue: false }
            }
        }
    }
}
