//! Reading extraction and validation.
//!
//! Everything in this module is synchronous and free of I/O:
//! - `extract` turns raw OCR text into an optional candidate
//! - `gate` decides whether a candidate is plausible against the last
//!   accepted reading
//! - `history` keeps a bounded log of accepted readings for diagnostics

mod extract;
mod gate;
mod history;

pub use extract::{clean_digits, extract_candidate, Extraction};
pub use gate::{GateDecision, GateState, PlausibilityGate, Rejection};
pub use history::{HistoryEntry, HistoryLedger};

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cumulative meter counter value, as read from a 6 or 7 digit display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading(u32);

impl Reading {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<u32> for Reading {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
