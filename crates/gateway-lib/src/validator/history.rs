//! Historical value cross-referencing
//!
//! Keeps a rolling window of recently served prediction values per
//! (query type, subject) series and exposes mean/std-dev so the
//! validator can z-score a new value against what the gateway has
//! recently seen for the same series.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default rolling window (24 hours)
const DEFAULT_WINDOW_SECS: u64 = 24 * 60 * 60;

/// Minimum samples before the cross-reference is meaningful
pub const MIN_SAMPLES_FOR_CROSSREF: usize = 10;

/// Windowed mean and standard deviation for one series
#[derive(Debug, Clone)]
pub struct SeriesStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: u64,
}

impl SeriesStats {
    pub fn has_sufficient_data(&self) -> bool {
        self.count >= MIN_SAMPLES_FOR_CROSSREF as u64
    }

    /// Z-score of `value` against this series, None when degenerate
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if !self.has_sufficient_data() || self.std_dev < f64::EPSILON {
            return None;
        }
        Some((value - self.mean) / self.std_dev)
    }
}

#[derive(Debug)]
struct Series {
    samples: VecDeque<(i64, f64)>,
}

impl Series {
    fn new() -> Self {
        Self {
            samples: VecDeque::new(),
        }
    }

    fn add(&mut self, timestamp: i64, value: f64, window_secs: i64) {
        let cutoff = timestamp - window_secs;
        while let Some((ts, _)) = self.samples.front() {
            if *ts < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
        self.samples.push_back((timestamp, value));
    }

    fn stats(&self) -> SeriesStats {
        let count = self.samples.len() as u64;
        if count == 0 {
            return SeriesStats {
                mean: 0.0,
                std_dev: 0.0,
                count: 0,
            };
        }
        let sum: f64 = self.samples.iter().map(|(_, v)| v).sum();
        let mean = sum / count as f64;

        let std_dev = if count > 1 {
            // Sample variance (Bessel's correction)
            let variance: f64 = self
                .samples
                .iter()
                .map(|(_, v)| (v - mean).powi(2))
                .sum::<f64>()
                / (count - 1) as f64;
            variance.sqrt()
        } else {
            0.0
        };

        SeriesStats {
            mean,
            std_dev,
            count,
        }
    }
}

/// Per-series rolling history shared by all validator calls
pub struct HistoryStore {
    window_secs: i64,
    series: Mutex<HashMap<String, Series>>,
}

impl HistoryStore {
    pub fn new(window: Duration) -> Self {
        Self {
            window_secs: window.as_secs() as i64,
            series: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Series>> {
        match self.series.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record an observed value for a series
    pub fn record(&self, key: &str, timestamp: i64, value: f64) {
        let mut series = self.lock();
        series
            .entry(key.to_string())
            .or_insert_with(Series::new)
            .add(timestamp, value, self.window_secs);
    }

    /// Snapshot of the series statistics, None if the series is unknown
    pub fn stats(&self, key: &str) -> Option<SeriesStats> {
        let series = self.lock();
        series.get(key).map(|s| s.stats())
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_WINDOW_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_series_has_no_stats() {
        let store = HistoryStore::default();
        assert!(store.stats("quant_forecast:aapl").is_none());
    }

    #[test]
    fn test_mean_and_std_dev() {
        let store = HistoryStore::default();
        for i in 1..=20 {
            store.record("s", i * 60, i as f64);
        }
        let stats = store.stats("s").unwrap();
        assert!((stats.mean - 10.5).abs() < 0.01);
        assert!(stats.std_dev > 0.0);
        assert_eq!(stats.count, 20);
    }

    #[test]
    fn test_z_score_needs_sufficient_samples() {
        let store = HistoryStore::default();
        for i in 0..5 {
            store.record("s", i * 60, 1.0);
        }
        let stats = store.stats("s").unwrap();
        assert!(!stats.has_sufficient_data());
        assert!(stats.z_score(100.0).is_none());
    }

    #[test]
    fn test_z_score_for_outlier() {
        let store = HistoryStore::default();
        for i in 0..50 {
            store.record("s", i * 60, 100.0 + (i % 5) as f64);
        }
        let stats = store.stats("s").unwrap();
        let z = stats.z_score(200.0).unwrap();
        assert!(z > 5.0, "z was {}", z);
    }

    #[test]
    fn test_window_expires_old_samples() {
        let store = HistoryStore::new(Duration::from_secs(3600));
        for i in 0..120 {
            store.record("s", i * 60, 0.5);
        }
        let stats = store.stats("s").unwrap();
        assert!(stats.count <= 61);
        assert!(stats.count >= 59);
    }

    #[test]
    fn test_series_are_independent() {
        let store = HistoryStore::default();
        for i in 0..20 {
            store.record("a", i * 60, 1.0);
        }
        assert!(store.stats("a").unwrap().count == 20);
        assert!(store.stats("b").is_none());
    }
}
