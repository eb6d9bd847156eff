use regex::Regex;
use std::sync::OnceLock;

use super::Reading;

fn candidate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]{6,7}").expect("candidate pattern is valid"))
}

/// Result of scanning raw OCR text for a meter reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The input with every non-digit removed.
    pub cleaned: String,
    /// The leftmost 6 or 7 digit run of `cleaned`, if any.
    pub candidate: Option<Reading>,
}

/// Remove every character that is not an ASCII decimal digit.
pub fn clean_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Find the candidate reading in raw OCR text.
///
/// Non-digits are stripped first, so digits separated by spaces or noise
/// characters join into a single run. The first match of 6 or 7 digits wins
/// (greedy, so 7 digits are taken when available); later runs are ignored.
/// Leading zeros are part of the run but not of the value.
pub fn extract_candidate(raw: &str) -> Extraction {
    let cleaned = clean_digits(raw);

    // A 7 digit run always fits in u32.
    let candidate = candidate_pattern()
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(Reading::new);

    Extraction { cleaned, candidate }
}
