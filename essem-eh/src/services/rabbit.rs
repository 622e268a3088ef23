//! AMQP transport
//!
//! Owns the broker connection, channel, and topology: one durable topic
//! exchange, one durable queue bound under the three inbound routing keys.
//! Publishes run with publisher confirms so the dispatcher can ack the
//! inbound message only after the broker accepted the outbound one.

use async_trait::async_trait;
use essem_common::config::AmqpConfig;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    BasicQosOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
    QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use thiserror::Error;
use tracing::info;

use crate::dispatch::{Dispatcher, Disposition, MetadataRequestPublisher, PublishError, RawMessage};
use crate::outbound::OutboundMessage;
use crate::services::repository::EssenceLookup;

const CONSUMER_TAG: &str = "essem-eh";

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("broker negatively confirmed publish")]
    Unconfirmed,

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// AMQP client: connection setup, topology, consume loop, publish.
#[derive(Clone)]
pub struct RabbitClient {
    channel: Channel,
    config: AmqpConfig,
}

impl RabbitClient {
    /// Connect to the broker, set the prefetch window, enable publisher
    /// confirms, and declare the topology.
    pub async fn connect(config: &AmqpConfig) -> Result<Self, TransportError> {
        let vhost = if config.vhost == "/" {
            "%2f".to_string()
        } else {
            config.vhost.clone()
        };
        let uri = format!(
            "amqp://{}:{}@{}:{}/{}",
            config.username, config.password, config.host, config.port, vhost
        );

        let connection = Connection::connect(&uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        channel
            .basic_qos(config.prefetch_count, BasicQosOptions::default())
            .await?;

        let client = Self {
            channel,
            config: config.clone(),
        };
        client.declare_topology().await?;

        info!(
            exchange = %client.config.exchange,
            queue = %client.config.queue,
            prefetch = client.config.prefetch_count,
            "Connected to broker"
        );
        Ok(client)
    }

    async fn declare_topology(&self) -> Result<(), TransportError> {
        self.channel
            .exchange_declare(
                &self.config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        self.channel
            .queue_declare(
                &self.config.queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        for routing_key in [
            &self.config.routing.essence_linked,
            &self.config.routing.essence_unlinked,
            &self.config.routing.object_deleted,
        ] {
            self.channel
                .queue_bind(
                    &self.config.queue,
                    &self.config.exchange,
                    routing_key,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await?;
        }

        Ok(())
    }

    /// Consume deliveries one at a time, applying the dispatcher's
    /// disposition to each. Returns when the consumer stream ends (broker
    /// closed the channel).
    pub async fn run<L, P>(&self, dispatcher: &Dispatcher<L, P>) -> Result<(), TransportError>
    where
        L: EssenceLookup,
        P: MetadataRequestPublisher,
    {
        let mut consumer = self
            .channel
            .basic_consume(
                &self.config.queue,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue = %self.config.queue, "Consuming essence events");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let raw = RawMessage {
                routing_key: delivery.routing_key.as_str(),
                payload: &delivery.data,
            };

            match dispatcher.process(&raw).await {
                Disposition::Ack => delivery.ack(BasicAckOptions::default()).await?,
                Disposition::Nack { requeue } => {
                    delivery
                        .nack(BasicNackOptions {
                            requeue,
                            ..Default::default()
                        })
                        .await?
                }
            }
        }

        Ok(())
    }

    async fn confirmed_publish(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let payload = serde_json::to_vec(&message.payload)?;

        let confirm = self
            .channel
            .basic_publish(
                &self.config.exchange,
                &message.routing_key,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_content_type("application/json".into())
                    .with_delivery_mode(2),
            )
            .await?;

        match confirm.await? {
            Confirmation::Nack(_) => Err(TransportError::Unconfirmed),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl MetadataRequestPublisher for RabbitClient {
    async fn publish(&self, message: &OutboundMessage) -> Result<(), PublishError> {
        self.confirmed_publish(message)
            .await
            .map_err(|e| PublishError(e.to_string()))
    }
}
