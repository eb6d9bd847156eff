use serde::Deserialize;
use std::env;

use crate::error::{MeterError, Result};

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

fn env_or(var: &str, default: &str) -> String {
    env::var(var).unwrap_or_else(|_| default.to_string())
}

pub const DEFAULT_IMAGE_TOPIC: &str = "home/meter/electric/image";

/// Derive the detail topic from the image topic.
///
/// Every `/image` occurrence is replaced, so `home/meter/electric/image`
/// becomes `home/meter/electric/reading` and `cams/images/image` becomes
/// `cams/readings/reading`. Topics without `/image` get `/reading` appended.
pub fn derive_reading_topic(image_topic: &str) -> String {
    if image_topic.contains("/image") {
        image_topic.replace("/image", "/reading")
    } else {
        format!("{}/reading", image_topic.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    pub topics: TopicConfig,
    pub sensor: SensorConfig,
    pub ocr: OcrConfig,
    pub gate: GateConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: String,
    pub keep_alive_secs: u64,
    /// Fixed delay between connection attempts.
    pub retry_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicConfig {
    pub image: String,
    pub state: String,
    pub config: String,
    pub reading: String,
}

/// Home Assistant discovery metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub unique_id: String,
    pub unit: String,
    pub device_class: String,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OcrConfig {
    pub languages: String,
    pub data_path: Option<String>,
    pub timeout_secs: u64,
    pub max_image_dimension: u32,
    pub contrast_factor: f32,
}

/// Bounds applied by the plausibility gate, relative to the last accepted
/// reading. Meter OCR tends to clip a trailing digit, so small backward drift
/// is tolerated while forward jumps get a wider window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct GateConfig {
    pub max_decrease: u32,
    pub max_increase: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_decrease: 10,
            max_increase: 1000,
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "eng".to_string(),
            data_path: None,
            timeout_secs: 60,
            max_image_dimension: 4096,
            contrast_factor: 2.0,
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            name: "Electric Meter Reading".to_string(),
            unique_id: "electric_meter_reading".to_string(),
            unit: "kWh".to_string(),
            device_class: "energy".to_string(),
            icon: "mdi:counter".to_string(),
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE_TOPIC.to_string(),
            state: "homeassistant/sensor/electric_meter/state".to_string(),
            config: "homeassistant/sensor/electric_meter/config".to_string(),
            reading: derive_reading_topic(DEFAULT_IMAGE_TOPIC),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let image_topic = env_or("IMAGE_TOPIC", DEFAULT_IMAGE_TOPIC);
        let reading_topic =
            env::var("READING_TOPIC").unwrap_or_else(|_| derive_reading_topic(&image_topic));

        Self {
            mqtt: MqttConfig {
                broker: env_or("MQTT_BROKER", "localhost"),
                port: parse_env_or("MQTT_PORT", 1883),
                username: env::var("MQTT_USER").ok().filter(|u| !u.is_empty()),
                password: env::var("MQTT_PASS").ok(),
                client_id: env::var("MQTT_CLIENT_ID")
                    .unwrap_or_else(|_| format!("meter-ocr-{}", std::process::id())),
                keep_alive_secs: parse_env_or("MQTT_KEEP_ALIVE_SECS", 60),
                retry_secs: parse_env_or("MQTT_RETRY_SECS", 5),
            },
            topics: TopicConfig {
                image: image_topic,
                state: env_or("STATE_TOPIC", "homeassistant/sensor/electric_meter/state"),
                config: env_or("CONFIG_TOPIC", "homeassistant/sensor/electric_meter/config"),
                reading: reading_topic,
            },
            sensor: SensorConfig {
                name: env_or("METER_NAME", "Electric Meter Reading"),
                unique_id: env_or("METER_ID", "electric_meter_reading"),
                unit: env_or("METER_UNIT", "kWh"),
                device_class: env_or("DEVICE_CLASS", "energy"),
                icon: env_or("METER_ICON", "mdi:counter"),
            },
            ocr: OcrConfig {
                languages: env_or("OCR_LANGUAGES", "eng"),
                data_path: parse_env_opt("OCR_DATA_PATH"),
                timeout_secs: parse_env_or("OCR_TIMEOUT", 60),
                max_image_dimension: parse_env_or("OCR_MAX_DIMENSION", 4096),
                contrast_factor: parse_env_or("OCR_CONTRAST_FACTOR", 2.0),
            },
            gate: GateConfig {
                max_decrease: parse_env_or("GATE_MAX_DECREASE", 10),
                max_increase: parse_env_or("GATE_MAX_INCREASE", 1000),
            },
            history: HistoryConfig {
                capacity: parse_env_or("HISTORY_CAPACITY", 100),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.topics.image.trim().is_empty() {
            return Err(MeterError::Config("IMAGE_TOPIC must not be empty".to_string()));
        }
        if self.history.capacity == 0 {
            return Err(MeterError::Config(
                "HISTORY_CAPACITY must be at least 1".to_string(),
            ));
        }
        if self.ocr.timeout_secs == 0 {
            return Err(MeterError::Config("OCR_TIMEOUT must be at least 1".to_string()));
        }
        Ok(())
    }
}
