use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

use super::Reading;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub reading: Reading,
    pub timestamp: DateTime<Utc>,
    pub raw_text: String,
}

/// Bounded log of accepted readings, oldest first.
///
/// Once full, every push evicts the oldest entry. The gate never reads it
/// back.
#[derive(Debug, Clone)]
pub struct HistoryLedger {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryLedger {
    /// # Panics
    /// Panics if capacity is 0
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be non-zero");
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: HistoryEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(value: u32) -> HistoryEntry {
        HistoryEntry {
            reading: Reading::new(value),
            timestamp: Utc::now(),
            raw_text: value.to_string(),
        }
    }

    #[test]
    fn test_push_until_full() {
        let mut ledger = HistoryLedger::new(3);
        assert!(ledger.is_empty());

        ledger.push(entry(1));
        ledger.push(entry(2));
        ledger.push(entry(3));

        assert_eq!(ledger.len(), 3);
        assert_eq!(ledger.latest().unwrap().reading, Reading::new(3));
    }

    #[test]
    fn test_evicts_oldest_first() {
        let mut ledger = HistoryLedger::default();
        for value in 1..=101 {
            ledger.push(entry(value));
        }

        assert_eq!(ledger.len(), 100);
        let readings: Vec<u32> = ledger.iter().map(|e| e.reading.value()).collect();
        assert_eq!(readings.first(), Some(&2));
        assert_eq!(readings.last(), Some(&101));
        assert!(!readings.contains(&1));
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut ledger = HistoryLedger::new(5);
        for value in 0..50 {
            ledger.push(entry(value));
            assert!(ledger.len() <= ledger.capacity());
        }
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_capacity_panics() {
        let _ = HistoryLedger::new(0);
    }
}
