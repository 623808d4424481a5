//! Deterministic request fingerprinting
//!
//! Derives a stable cache/coalescing key from the normalized content of a
//! prediction request. Two requests that differ only in subject ordering,
//! casing, or surrounding whitespace produce the same fingerprint.

use crate::models::PredictionRequest;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable hash key identifying a semantically unique request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Construct from a precomputed hex digest. Intended for tests.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short prefix is enough to correlate log lines
        write!(f, "{}", &self.0[..self.0.len().min(16)])
    }
}

/// Derives fingerprints from request content. Pure, no I/O.
#[derive(Debug, Clone, Default)]
pub struct Fingerprinter;

impl Fingerprinter {
    pub fn new() -> Self {
        Self
    }

    /// Compute the fingerprint of a request
    pub fn fingerprint(&self, request: &PredictionRequest) -> Fingerprint {
        let mut hasher = Sha256::new();

        for subject in normalize_subjects(&request.subjects) {
            hasher.update(subject.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update([0xff]);

        hasher.update(normalize_text(&request.query).as_bytes());
        hasher.update([0xff]);

        // BTreeMap iterates in key order, so param ordering is canonical
        for (key, value) in &request.params {
            hasher.update(key.as_bytes());
            hasher.update([0u8]);
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }

        Fingerprint(hex::encode(hasher.finalize()))
    }
}

/// Lower-case, trim, sort, and de-duplicate the subject list
fn normalize_subjects(subjects: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = subjects
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Lower-case and collapse internal whitespace
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(subjects: &[&str], query: &str) -> PredictionRequest {
        PredictionRequest::new(subjects.iter().map(|s| s.to_string()).collect(), query)
    }

    #[test]
    fn test_subject_order_is_irrelevant() {
        let fp = Fingerprinter::new();
        let a = fp.fingerprint(&request(&["AAPL", "MSFT"], "payout_rating"));
        let b = fp.fingerprint(&request(&["MSFT", "AAPL"], "payout_rating"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_subject_case_and_whitespace_normalized() {
        let fp = Fingerprinter::new();
        let a = fp.fingerprint(&request(&["aapl"], "payout_rating"));
        let b = fp.fingerprint(&request(&[" AAPL "], "Payout_Rating"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_subjects_collapse() {
        let fp = Fingerprinter::new();
        let a = fp.fingerprint(&request(&["AAPL", "AAPL"], "payout_rating"));
        let b = fp.fingerprint(&request(&["AAPL"], "payout_rating"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_queries_differ() {
        let fp = Fingerprinter::new();
        let a = fp.fingerprint(&request(&["AAPL"], "payout_rating"));
        let b = fp.fingerprint(&request(&["AAPL"], "price forecast"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_params_change_fingerprint() {
        let fp = Fingerprinter::new();
        let base = request(&["AAPL"], "price forecast");
        let with_horizon = base.clone().with_param("horizon", "30d");
        assert_ne!(fp.fingerprint(&base), fp.fingerprint(&with_horizon));
    }

    #[test]
    fn test_param_insertion_order_is_irrelevant() {
        let fp = Fingerprinter::new();
        let a = request(&["AAPL"], "forecast")
            .with_param("horizon", "30d")
            .with_param("currency", "usd");
        let b = request(&["AAPL"], "forecast")
            .with_param("currency", "usd")
            .with_param("horizon", "30d");
        assert_eq!(fp.fingerprint(&a), fp.fingerprint(&b));
    }

    #[test]
    fn test_subject_boundary_is_unambiguous() {
        // ["ab", "c"] must not collide with ["a", "bc"]
        let fp = Fingerprinter::new();
        let a = fp.fingerprint(&request(&["ab", "c"], "q"));
        let b = fp.fingerprint(&request(&["a", "bc"], "q"));
        assert_ne!(a, b);
    }
}
