//! Result validation
//!
//! Runs a secondary, independent check against raw backend output:
//! domain bounds per query type, cross-reference against recently served
//! values for the same series, and a confidence score. A daily budget
//! caps how many secondary checks run; past it, results come back
//! flagged unvalidated instead of blocking the response.

mod bounds;
mod budget;
mod history;

pub use bounds::{severity_for, BoundsCheck, BoundsTable, DomainBounds};
pub use budget::EvaluationBudget;
pub use history::{HistoryStore, SeriesStats, MIN_SAMPLES_FOR_CROSSREF};

use crate::models::{
    AnomalyFlag, AnomalySeverity, EvaluationResult, PredictionRequest, QueryType, RawPrediction,
    Verdict,
};
use std::time::Duration;

/// Validator tuning knobs
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Secondary checks allowed per UTC day
    pub daily_budget: u32,
    /// Rolling window for historical cross-referencing
    pub history_window: Duration,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            daily_budget: 50_000,
            history_window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Confidence used when the backend reports none of its own
const BASE_CONFIDENCE: f32 = 0.7;

/// Secondary checker for raw backend output
pub struct ResultValidator {
    bounds: BoundsTable,
    history: HistoryStore,
    budget: EvaluationBudget,
}

impl ResultValidator {
    pub fn new(config: ValidatorConfig) -> Self {
        Self {
            bounds: BoundsTable::new(),
            history: HistoryStore::new(config.history_window),
            budget: EvaluationBudget::new(config.daily_budget),
        }
    }

    /// Evaluate a raw prediction for the given request
    pub fn evaluate(
        &self,
        request: &PredictionRequest,
        query_type: QueryType,
        raw: &RawPrediction,
    ) -> EvaluationResult {
        if !self.budget.try_acquire() {
            return EvaluationResult {
                verdict: Verdict::Uncertain,
                confidence: raw.model_confidence.unwrap_or(0.5).clamp(0.0, 1.0),
                anomaly: None,
                explanation: "daily validation budget exhausted, secondary check skipped"
                    .to_string(),
                unvalidated: true,
            };
        }

        let check = self.bounds.check(query_type, raw.unit.as_deref(), raw.value);
        let bounds_severity = severity_for(check);

        let key = series_key(query_type, request);
        let stats = self.history.stats(&key);
        let z_score = stats.as_ref().and_then(|s| s.z_score(raw.value));
        let history_severity = z_score.map(|z| z.abs()).and_then(severity_for_z);

        let severity = bounds_severity.max(history_severity);
        let has_history = stats
            .as_ref()
            .map(|s| s.has_sufficient_data())
            .unwrap_or(false);

        let verdict = match severity {
            Some(AnomalySeverity::High) => Verdict::Disagree,
            Some(_) => Verdict::PartiallyAgree,
            None if has_history => Verdict::Agree,
            None => Verdict::Uncertain,
        };

        let mut confidence = raw.model_confidence.unwrap_or(BASE_CONFIDENCE);
        confidence *= match severity {
            Some(AnomalySeverity::High) => 0.2,
            Some(AnomalySeverity::Medium) => 0.5,
            Some(AnomalySeverity::Low) => 0.75,
            None => 1.0,
        };
        if !has_history {
            confidence *= 0.9;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let explanation = explain(check, z_score, has_history);
        let anomaly = severity.map(|severity| AnomalyFlag {
            detail: explanation.clone(),
            severity,
        });

        // Implausible values are not fed back into the series, so one bad
        // backend response cannot poison the cross-reference window
        if check != BoundsCheck::BeyondHard {
            self.history
                .record(&key, chrono::Utc::now().timestamp(), raw.value);
        }

        EvaluationResult {
            verdict,
            confidence,
            anomaly,
            explanation,
            unvalidated: false,
        }
    }

    /// Remaining secondary checks today, for observability
    pub fn budget_remaining(&self) -> u32 {
        self.budget.remaining_today()
    }
}

fn series_key(query_type: QueryType, request: &PredictionRequest) -> String {
    let mut subjects: Vec<String> = request
        .subjects
        .iter()
        .map(|s| s.trim().to_lowercase())
        .collect();
    subjects.sort();
    subjects.dedup();
    format!("{}:{}", query_type.as_str(), subjects.join("+"))
}

/// Severity ladder for z-scored deviations
fn severity_for_z(z: f64) -> Option<AnomalySeverity> {
    if z >= 5.0 {
        Some(AnomalySeverity::High)
    } else if z >= 4.0 {
        Some(AnomalySeverity::Medium)
    } else if z >= 3.0 {
        Some(AnomalySeverity::Low)
    } else {
        None
    }
}

fn explain(check: BoundsCheck, z_score: Option<f64>, has_history: bool) -> String {
    let mut parts: Vec<String> = Vec::new();
    match check {
        BoundsCheck::Within => parts.push("value within expected bounds".to_string()),
        BoundsCheck::BeyondSoft { deviation_ratio } => parts.push(format!(
            "value {:.0}% outside the expected range",
            deviation_ratio * 100.0
        )),
        BoundsCheck::BeyondHard => parts.push("value beyond plausible domain bounds".to_string()),
    }
    match (z_score, has_history) {
        (Some(z), _) => parts.push(format!("deviates {:.1} std devs from recent history", z)),
        (None, true) => parts.push("consistent with recent history".to_string()),
        (None, false) => parts.push("no recent history to cross-reference".to_string()),
    }
    parts.join("; ")
}
