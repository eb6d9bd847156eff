use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use tracing::debug;

use crate::error::Result;

/// A message ready to be handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    /// Retained messages stay on the broker for late subscribers.
    pub retain: bool,
}

impl OutboundMessage {
    pub fn retained(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }

    pub fn transient(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Outbound side of the transport.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<()>;
}

/// Publishes through a `rumqttc` client.
///
/// `AsyncClient::publish` only queues the request; the supervisor's event
/// loop performs the network write.
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<()> {
        debug!(
            topic = %message.topic,
            retain = message.retain,
            bytes = message.payload.len(),
            "Publishing"
        );
        self.client
            .publish(message.topic, QoS::AtMostOnce, message.retain, message.payload)
            .await?;
        Ok(())
    }
}
