// Common test utilities for integration tests
#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use image::{DynamicImage, GrayImage, ImageFormat};

use meter_ocr::config::{
    Config, GateConfig, HistoryConfig, MqttConfig, OcrConfig, SensorConfig, TopicConfig,
};
use meter_ocr::error::{MeterError, Result};
use meter_ocr::ocr::Recognizer;
use meter_ocr::transport::{OutboundMessage, Publisher};

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// A config that never touches the environment.
pub fn test_config() -> Config {
    Config {
        mqtt: MqttConfig {
            broker: "localhost".to_string(),
            port: 1883,
            username: None,
            password: None,
            client_id: "meter-ocr-test".to_string(),
            keep_alive_secs: 60,
            retry_secs: 5,
        },
        topics: TopicConfig::default(),
        sensor: SensorConfig::default(),
        ocr: OcrConfig::default(),
        gate: GateConfig::default(),
        history: HistoryConfig::default(),
    }
}

/// Encode a blank frame, standing in for a camera JPEG.
pub fn blank_frame(format: ImageFormat) -> Vec<u8> {
    let mut output = Vec::new();
    DynamicImage::new_rgb8(160, 48)
        .write_to(&mut Cursor::new(&mut output), format)
        .expect("Failed to encode test frame");
    output
}

/// Returns scripted OCR results in order, then errors.
pub struct ScriptedRecognizer {
    texts: Mutex<Vec<Result<String>>>,
}

impl ScriptedRecognizer {
    pub fn new(texts: &[&str]) -> Self {
        let mut texts: Vec<Result<String>> = texts.iter().map(|t| Ok(t.to_string())).collect();
        texts.reverse();
        Self {
            texts: Mutex::new(texts),
        }
    }

    pub fn with_results(mut results: Vec<Result<String>>) -> Self {
        results.reverse();
        Self {
            texts: Mutex::new(results),
        }
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, _image: &GrayImage) -> Result<String> {
        self.texts
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(MeterError::Recognition("script exhausted".to_string())))
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn state_values(&self, state_topic: &str) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|m| m.topic == state_topic)
            .filter_map(|m| m.payload_str().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, message: OutboundMessage) -> Result<()> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
