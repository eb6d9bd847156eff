use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{SensorConfig, TopicConfig};
use crate::error::Result;
use crate::reading::Reading;
use crate::transport::OutboundMessage;

pub const STATE_CLASS_TOTAL_INCREASING: &str = "total_increasing";

const HUMAN_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Detail record published next to the plain state value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingDetail {
    pub reading: Reading,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// Local wall-clock time, `%Y-%m-%d %H:%M:%S`.
    pub timestamp_human: String,
}

impl ReadingDetail {
    pub fn new(reading: Reading, at: DateTime<Utc>) -> Self {
        Self {
            reading,
            timestamp: at.timestamp_millis() as f64 / 1000.0,
            timestamp_human: at.with_timezone(&Local).format(HUMAN_TIME_FORMAT).to_string(),
        }
    }
}

/// Home Assistant MQTT discovery payload for the meter sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub unit_of_measurement: String,
    pub device_class: String,
    pub state_class: String,
    pub icon: String,
}

impl DiscoveryConfig {
    pub fn new(sensor: &SensorConfig, topics: &TopicConfig) -> Self {
        Self {
            name: sensor.name.clone(),
            unique_id: sensor.unique_id.clone(),
            state_topic: topics.state.clone(),
            unit_of_measurement: sensor.unit.clone(),
            device_class: sensor.device_class.clone(),
            state_class: STATE_CLASS_TOTAL_INCREASING.to_string(),
            icon: sensor.icon.clone(),
        }
    }
}

/// Retained announcement on the config topic. Republishing overwrites the
/// previous one, so sending it on every connect is harmless.
pub fn discovery_message(sensor: &SensorConfig, topics: &TopicConfig) -> Result<OutboundMessage> {
    let payload = serde_json::to_vec(&DiscoveryConfig::new(sensor, topics))?;
    Ok(OutboundMessage::retained(topics.config.clone(), payload))
}

/// The two messages published for an accepted reading: the retained state
/// value and the transient detail record.
pub fn reading_messages(
    topics: &TopicConfig,
    reading: Reading,
    at: DateTime<Utc>,
) -> Result<[OutboundMessage; 2]> {
    let state = OutboundMessage::retained(topics.state.clone(), reading.to_string());
    let detail = serde_json::to_vec(&ReadingDetail::new(reading, at))?;
    let detail = OutboundMessage::transient(topics.reading.clone(), detail);
    Ok([state, detail])
}
