//! Domain bounds for raw prediction values
//!
//! Every query type carries a hard range (values outside it are flatly
//! implausible, e.g. a yield above 100 percent) and a soft range of
//! expected values. Severity escalates with how far outside the soft
//! range a value lands; beyond the hard range it is always high.

use crate::models::{AnomalySeverity, QueryType};

/// Plausibility ranges for one kind of value
#[derive(Debug, Clone, Copy)]
pub struct DomainBounds {
    pub hard_min: f64,
    pub hard_max: f64,
    pub soft_min: f64,
    pub soft_max: f64,
}

/// Outcome of a bounds check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundsCheck {
    Within,
    /// Outside the soft range; ratio is distance relative to soft width
    BeyondSoft { deviation_ratio: f64 },
    BeyondHard,
}

impl DomainBounds {
    pub fn check(&self, value: f64) -> BoundsCheck {
        if !value.is_finite() || value < self.hard_min || value > self.hard_max {
            return BoundsCheck::BeyondHard;
        }
        if value >= self.soft_min && value <= self.soft_max {
            return BoundsCheck::Within;
        }
        let width = (self.soft_max - self.soft_min).max(f64::EPSILON);
        let distance = if value < self.soft_min {
            self.soft_min - value
        } else {
            value - self.soft_max
        };
        BoundsCheck::BeyondSoft {
            deviation_ratio: distance / width,
        }
    }
}

/// Bounds per query type, with unit overrides
///
/// The unit reported by the backend wins over the query-type default,
/// so a percent-valued forecast gets percent bounds even when the type
/// default assumes a price.
pub struct BoundsTable;

impl BoundsTable {
    pub fn new() -> Self {
        Self
    }

    pub fn bounds_for(&self, query_type: QueryType, unit: Option<&str>) -> DomainBounds {
        match unit {
            Some("percent") => PERCENT_BOUNDS,
            Some("usd") => PRICE_BOUNDS,
            Some("score") => SCORE_BOUNDS,
            _ => match query_type {
                QueryType::PayoutScore => SCORE_BOUNDS,
                QueryType::QuantForecast => PRICE_BOUNDS,
                QueryType::QuickQuote => PRICE_BOUNDS,
                QueryType::ChartAnalysis | QueryType::General => WIDE_BOUNDS,
            },
        }
    }

    pub fn check(&self, query_type: QueryType, unit: Option<&str>, value: f64) -> BoundsCheck {
        self.bounds_for(query_type, unit).check(value)
    }
}

impl Default for BoundsTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a bounds check to an anomaly severity
pub fn severity_for(check: BoundsCheck) -> Option<AnomalySeverity> {
    match check {
        BoundsCheck::Within => None,
        BoundsCheck::BeyondSoft { deviation_ratio } => {
            if deviation_ratio > 0.5 {
                Some(AnomalySeverity::Medium)
            } else {
                Some(AnomalySeverity::Low)
            }
        }
        BoundsCheck::BeyondHard => Some(AnomalySeverity::High),
    }
}

/// Yields and other percentages; nothing pays above 100 percent
const PERCENT_BOUNDS: DomainBounds = DomainBounds {
    hard_min: -100.0,
    hard_max: 100.0,
    soft_min: -20.0,
    soft_max: 40.0,
};

/// Per-share prices in USD
const PRICE_BOUNDS: DomainBounds = DomainBounds {
    hard_min: 0.0,
    hard_max: 10_000_000.0,
    soft_min: 0.01,
    soft_max: 100_000.0,
};

/// 0-10 rating scale used by the scoring models
const SCORE_BOUNDS: DomainBounds = DomainBounds {
    hard_min: 0.0,
    hard_max: 10.0,
    soft_min: 0.5,
    soft_max: 9.5,
};

/// Catch-all for narratives whose numeric payload is secondary
const WIDE_BOUNDS: DomainBounds = DomainBounds {
    hard_min: -1e12,
    hard_max: 1e12,
    soft_min: -1e9,
    soft_max: 1e9,
};
