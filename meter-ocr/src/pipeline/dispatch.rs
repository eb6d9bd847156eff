use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, GateConfig, OcrConfig, TopicConfig};
use crate::ocr::{normalize_image, Recognizer};
use crate::reading::{
    extract_candidate, GateDecision, GateState, HistoryLedger, PlausibilityGate, Reading,
    Rejection,
};
use crate::transport::Publisher;

use super::messages::reading_messages;

/// Why an image produced no output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// The payload was not a decodable image.
    Decode(String),
    /// The OCR engine failed, timed out or is unavailable.
    Recognition(String),
    /// No run of 6 or 7 digits in the recognized text.
    NoCandidate { cleaned: String },
    /// The candidate failed the plausibility check.
    Rejected(Rejection),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Published(Reading),
    Dropped(DropReason),
}

/// Running counters for the dispatch worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub published: u64,
    pub decode_failures: u64,
    pub recognition_failures: u64,
    pub no_candidate: u64,
    pub rejected: u64,
    pub publish_failures: u64,
}

impl DispatchStats {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Published(_) => self.published += 1,
            DispatchOutcome::Dropped(DropReason::Decode(_)) => self.decode_failures += 1,
            DispatchOutcome::Dropped(DropReason::Recognition(_)) => {
                self.recognition_failures += 1
            }
            DispatchOutcome::Dropped(DropReason::NoCandidate { .. }) => self.no_candidate += 1,
            DispatchOutcome::Dropped(DropReason::Rejected(_)) => self.rejected += 1,
        }
    }
}

/// Runs one image at a time through normalize, recognize, extract and gate,
/// and publishes accepted readings.
///
/// The dispatcher exclusively owns the gate state and the history ledger;
/// `handle` takes `&mut self`, so decisions are never interleaved.
pub struct Dispatcher {
    recognizer: Arc<dyn Recognizer>,
    publisher: Arc<dyn Publisher>,
    ocr_config: OcrConfig,
    topics: TopicConfig,
    unit: String,
    gate: PlausibilityGate,
    state: GateState,
    history: HistoryLedger,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        publisher: Arc<dyn Publisher>,
        config: &Config,
    ) -> Self {
        Self {
            recognizer,
            publisher,
            ocr_config: config.ocr.clone(),
            topics: config.topics.clone(),
            unit: config.sensor.unit.clone(),
            gate: PlausibilityGate::new(config.gate),
            state: GateState::new(),
            history: HistoryLedger::new(config.history.capacity),
            stats: DispatchStats::default(),
        }
    }

    /// Process a single inbound image payload.
    ///
    /// Never fails: every problem becomes a `DispatchOutcome::Dropped`. A
    /// failed publish is logged but does not undo the accepted reading.
    pub async fn handle(&mut self, payload: &[u8]) -> DispatchOutcome {
        self.stats.received += 1;
        info!(bytes = payload.len(), "Image received");

        let outcome = self.process(payload).await;
        self.finish(outcome)
    }

    /// Run already-recognized text through extraction, the gate and
    /// publishing. Counted and logged like an image, except for `received`.
    pub async fn process_text(&mut self, text: &str) -> DispatchOutcome {
        let outcome = self.evaluate_text(text).await;
        self.finish(outcome)
    }

    fn finish(&mut self, outcome: DispatchOutcome) -> DispatchOutcome {
        self.stats.record(&outcome);

        if let DispatchOutcome::Dropped(reason) = &outcome {
            match reason {
                DropReason::Decode(e) => warn!("Dropping image, decode failed: {}", e),
                DropReason::Recognition(e) => warn!("Dropping image, OCR failed: {}", e),
                DropReason::NoCandidate { cleaned } => {
                    info!(cleaned = %cleaned, "No valid 6-7 digit reading found")
                }
                DropReason::Rejected(rejection) => {
                    warn!("Skipping potentially incorrect reading, {}", rejection)
                }
            }
        }

        outcome
    }

    async fn process(&mut self, payload: &[u8]) -> DispatchOutcome {
        let raster = match normalize_image(payload, &self.ocr_config) {
            Ok(raster) => raster,
            Err(e) => return DispatchOutcome::Dropped(DropReason::Decode(e.to_string())),
        };

        let text = match self.recognizer.recognize(&raster).await {
            Ok(text) => text,
            Err(e) => return DispatchOutcome::Dropped(DropReason::Recognition(e.to_string())),
        };

        self.evaluate_text(&text).await
    }

    async fn evaluate_text(&mut self, text: &str) -> DispatchOutcome {
        let extraction = extract_candidate(text);
        debug!(raw = %text.trim(), cleaned = %extraction.cleaned, "OCR text");

        let Some(candidate) = extraction.candidate else {
            return DispatchOutcome::Dropped(DropReason::NoCandidate {
                cleaned: extraction.cleaned,
            });
        };

        let reading =
            match self
                .gate
                .admit(&mut self.state, &mut self.history, candidate, text)
            {
                GateDecision::Accepted(reading) => reading,
                GateDecision::Rejected(rejection) => {
                    return DispatchOutcome::Dropped(DropReason::Rejected(rejection))
                }
            };

        info!(reading = %reading, unit = %self.unit, "Reading extracted");
        self.publish_reading(reading).await;

        DispatchOutcome::Published(reading)
    }

    async fn publish_reading(&mut self, reading: Reading) {
        let at = self
            .history
            .latest()
            .map(|entry| entry.timestamp)
            .unwrap_or_else(Utc::now);

        let messages = match reading_messages(&self.topics, reading, at) {
            Ok(messages) => messages,
            Err(e) => {
                error!("Failed to build output messages for {}: {}", reading, e);
                self.stats.publish_failures += 1;
                return;
            }
        };

        for message in messages {
            let topic = message.topic.clone();
            if let Err(e) = self.publisher.publish(message).await {
                error!("Failed to publish to {}: {}", topic, e);
                self.stats.publish_failures += 1;
            }
        }

        info!(reading = %reading, unit = %self.unit, "Published reading");
    }

    pub fn history(&self) -> &HistoryLedger {
        &self.history
    }

    pub fn last_accepted(&self) -> Option<Reading> {
        self.state.last_accepted()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn gate_config(&self) -> GateConfig {
        self.gate.config()
    }
}

/// Consume image payloads until the channel closes or the token is cancelled.
///
/// Returns the dispatcher so its history and counters can be inspected after
/// shutdown.
pub async fn run_dispatch_worker(
    mut dispatcher: Dispatcher,
    mut images: mpsc::Receiver<Vec<u8>>,
    token: CancellationToken,
) -> Dispatcher {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!("Dispatch worker shutting down...");
                break;
            }
            payload = images.recv() => {
                match payload {
                    Some(payload) => {
                        dispatcher.handle(&payload).await;
                    }
                    None => {
                        info!("Image channel closed, dispatch worker stopping");
                        break;
                    }
                }
            }
        }
    }

    let stats = dispatcher.stats();
    info!(
        "Dispatch summary: {} received, {} published, {} decode failures, {} OCR failures, {} without candidate, {} rejected, {} publish failures",
        stats.received,
        stats.published,
        stats.decode_failures,
        stats.recognition_failures,
        stats.no_candidate,
        stats.rejected,
        stats.publish_failures
    );

    dispatcher
}
