//! MQTT plumbing: the connection supervisor that owns the broker session and
//! the publisher the dispatch worker writes through.

mod publisher;
mod supervisor;

pub use publisher::{MqttPublisher, OutboundMessage, Publisher};
pub use supervisor::{mqtt_options, ConnectionSupervisor, SessionClient, SessionState};
