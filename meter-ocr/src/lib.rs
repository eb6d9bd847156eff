//! Utility meter OCR bridge.
//!
//! Receives meter photos over MQTT, reads the counter with Tesseract, rejects
//! implausible values and publishes accepted readings for Home Assistant.

pub mod config;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod reading;
pub mod transport;
