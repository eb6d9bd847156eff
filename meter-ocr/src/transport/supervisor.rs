use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, MqttConfig, SensorConfig, TopicConfig};
use crate::error::Result;
use crate::pipeline::discovery_message;

use super::publisher::{MqttPublisher, OutboundMessage};

/// Requests buffered between the client handles and the event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 32;

/// Largest packet accepted from or sent to the broker. Camera frames are far
/// bigger than the client's default limit.
const MAX_PACKET_BYTES: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

pub fn mqtt_options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.broker, config.port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    options.set_max_packet_size(MAX_PACKET_BYTES, MAX_PACKET_BYTES);
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }
    options
}

/// Session-level requests issued from inside the event loop.
///
/// Calls must not wait on the request channel: the loop that drains it is the
/// caller.
pub trait SessionClient: Send {
    fn subscribe(&self, topic: &str) -> Result<()>;
    fn announce(&self, message: OutboundMessage) -> Result<()>;
    fn disconnect(&self) -> Result<()>;
}

impl SessionClient for AsyncClient {
    fn subscribe(&self, topic: &str) -> Result<()> {
        self.try_subscribe(topic, QoS::AtMostOnce)?;
        Ok(())
    }

    fn announce(&self, message: OutboundMessage) -> Result<()> {
        self.try_publish(
            message.topic,
            QoS::AtMostOnce,
            message.retain,
            message.payload,
        )?;
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        self.try_disconnect()?;
        Ok(())
    }
}

/// Owns the broker session.
///
/// Drives the MQTT event loop, reconnecting forever with a fixed delay. Every
/// successful connection subscribes to the image topic and re-announces the
/// discovery config. Image payloads are forwarded to the dispatch worker and
/// never processed here, so keep-alives continue while OCR runs.
pub struct ConnectionSupervisor {
    client: Box<dyn SessionClient>,
    eventloop: EventLoop,
    topics: TopicConfig,
    sensor: SensorConfig,
    retry: Duration,
    images: mpsc::Sender<Vec<u8>>,
    state: SessionState,
}

impl ConnectionSupervisor {
    /// Build the supervisor and a publisher sharing its connection.
    pub fn new(config: &Config, images: mpsc::Sender<Vec<u8>>) -> (Self, MqttPublisher) {
        let (client, eventloop) =
            AsyncClient::new(mqtt_options(&config.mqtt), REQUEST_CHANNEL_CAPACITY);
        let publisher = MqttPublisher::new(client.clone());

        let supervisor = Self {
            client: Box::new(client),
            eventloop,
            topics: config.topics.clone(),
            sensor: config.sensor.clone(),
            retry: Duration::from_secs(config.mqtt.retry_secs),
            images,
            state: SessionState::Disconnected,
        };

        (supervisor, publisher)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run until the token is cancelled. Connection failures are never fatal.
    pub async fn run(mut self, token: CancellationToken) {
        loop {
            if self.state == SessionState::Disconnected {
                info!("Connecting to MQTT broker...");
                self.state = SessionState::Connecting;
            }

            let polled = tokio::select! {
                _ = token.cancelled() => break,
                polled = self.eventloop.poll() => polled,
            };

            match polled {
                Ok(event) => {
                    if let Err(e) = self.handle_event(event) {
                        error!("Failed to handle MQTT event: {}", e);
                    }
                }
                Err(e) => {
                    if self.state == SessionState::Connected {
                        warn!("Connection to MQTT broker lost: {}", e);
                    } else {
                        warn!("Connection failed: {}", e);
                    }
                    self.state = SessionState::Disconnected;
                    info!("Retrying in {} seconds...", self.retry.as_secs());

                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(self.retry) => {}
                    }
                }
            }
        }

        info!("Connection supervisor shutting down...");
        if let Err(e) = self.client.disconnect() {
            debug!("Disconnect request not sent: {}", e);
        }
    }

    fn handle_event(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Incoming(Packet::ConnAck(ack)) if ack.code == ConnectReturnCode::Success => {
                self.state = SessionState::Connected;
                self.on_connected()
            }
            Event::Incoming(Packet::Publish(publish)) => {
                self.forward_image(&publish.topic, publish.payload.to_vec());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_connected(&mut self) -> Result<()> {
        info!(
            "Connected to MQTT broker, subscribing to {}",
            self.topics.image
        );
        self.client.subscribe(&self.topics.image)?;
        self.client
            .announce(discovery_message(&self.sensor, &self.topics)?)?;
        info!("Published discovery config to {}", self.topics.config);
        Ok(())
    }

    fn forward_image(&self, topic: &str, payload: Vec<u8>) {
        debug!(topic = %topic, bytes = payload.len(), "Inbound image");
        match self.images.try_send(payload) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Dispatch worker busy, dropping image from {}", topic)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Dispatch worker stopped, dropping image from {}", topic)
            }
        }
    }
}
