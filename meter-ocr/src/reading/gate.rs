use chrono::Utc;
use std::fmt;

use crate::config::GateConfig;

use super::{HistoryEntry, HistoryLedger, Reading};

/// The last reading the gate accepted.
///
/// Starts empty, so the first candidate after a restart is always accepted.
/// Only [`PlausibilityGate::admit`] writes to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateState {
    last_accepted: Option<Reading>,
}

impl GateState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_accepted(&self) -> Option<Reading> {
        self.last_accepted
    }
}

/// Why a candidate was judged implausible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Fell below `last - max_decrease`, usually a dropped digit.
    Decrease { last: Reading, candidate: Reading },
    /// Rose above `last + max_increase`, usually a spurious high digit.
    Increase { last: Reading, candidate: Reading },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Decrease { last, candidate } => {
                write!(f, "reading decreased suspiciously: {last} -> {candidate}")
            }
            Rejection::Increase { last, candidate } => {
                write!(f, "reading increased suspiciously: {last} -> {candidate}")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Accepted(Reading),
    Rejected(Rejection),
}

impl GateDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, GateDecision::Accepted(_))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlausibilityGate {
    config: GateConfig,
}

impl PlausibilityGate {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> GateConfig {
        self.config
    }

    /// Judge a candidate without touching any state.
    ///
    /// Accepts iff `last - max_decrease <= candidate <= last + max_increase`,
    /// or unconditionally when there is no previous reading.
    pub fn evaluate(&self, state: &GateState, candidate: Reading) -> GateDecision {
        let Some(last) = state.last_accepted else {
            return GateDecision::Accepted(candidate);
        };

        // Widen to u64 so bounds near zero or u32::MAX don't wrap.
        let last_v = u64::from(last.value());
        let value = u64::from(candidate.value());

        if value + u64::from(self.config.max_decrease) < last_v {
            GateDecision::Rejected(Rejection::Decrease { last, candidate })
        } else if value > last_v + u64::from(self.config.max_increase) {
            GateDecision::Rejected(Rejection::Increase { last, candidate })
        } else {
            GateDecision::Accepted(candidate)
        }
    }

    /// Judge a candidate and commit it on acceptance.
    ///
    /// An accepted candidate becomes the new baseline and is appended to the
    /// ledger together with the OCR text it came from. A rejection leaves
    /// both untouched.
    pub fn admit(
        &self,
        state: &mut GateState,
        ledger: &mut HistoryLedger,
        candidate: Reading,
        raw_text: &str,
    ) -> GateDecision {
        let decision = self.evaluate(state, candidate);
        if let GateDecision::Accepted(reading) = decision {
            state.last_accepted = Some(reading);
            ledger.push(HistoryEntry {
                reading,
                timestamp: Utc::now(),
                raw_text: raw_text.trim().to_string(),
            });
        }
        decision
    }
}
