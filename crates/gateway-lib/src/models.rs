//! Core data models for the prediction gateway

use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A backend-agnostic prediction query from the chat layer
///
/// Immutable once constructed. `query` carries the query-type tag or
/// free-text intent (e.g. "payout_rating", "analyze this chart"); `params`
/// is an ordered map so iteration order is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Subject identifiers, typically ticker symbols
    pub subjects: Vec<String>,
    /// Query type tag or textual intent
    pub query: String,
    /// Additional parameters (horizon, currency, chart payload reference, ...)
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl PredictionRequest {
    pub fn new(subjects: Vec<String>, query: impl Into<String>) -> Self {
        Self {
            subjects,
            query: query.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Query categories the router classifies requests into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// Scoring queries (payout ratings, dividend safety scores)
    PayoutScore,
    /// Quantitative forecasts (price targets, yield projections)
    QuantForecast,
    /// Multimodal chart/image analysis
    ChartAnalysis,
    /// Fast lookups answered by the quote service
    QuickQuote,
    /// Everything else, handled by the general LLM backend
    General,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::PayoutScore => "payout_score",
            QueryType::QuantForecast => "quant_forecast",
            QueryType::ChartAnalysis => "chart_analysis",
            QueryType::QuickQuote => "quick_quote",
            QueryType::General => "general",
        }
    }
}

/// Raw output of a backend adapter before validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPrediction {
    /// Primary numeric prediction (score, price, yield percent, ...)
    pub value: f64,
    /// Unit of the value ("percent", "usd", "score", ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Optional free-text narrative from an LLM backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// Confidence reported by the backend itself, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_confidence: Option<f32>,
    /// Version of the model that produced the value
    pub model_version: String,
}

/// Validation verdict for a raw prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Agree,
    PartiallyAgree,
    Uncertain,
    Disagree,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Agree => "agree",
            Verdict::PartiallyAgree => "partially_agree",
            Verdict::Uncertain => "uncertain",
            Verdict::Disagree => "disagree",
        }
    }
}

/// Severity of a detected anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

impl AnomalySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalySeverity::Low => "low",
            AnomalySeverity::Medium => "medium",
            AnomalySeverity::High => "high",
        }
    }
}

/// Anomaly flag attached to a validated result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyFlag {
    pub severity: AnomalySeverity,
    pub detail: String,
}

/// Outcome of the result validator's secondary check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub verdict: Verdict,
    /// Confidence score in [0, 1]
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<AnomalyFlag>,
    pub explanation: String,
    /// True when the daily budget skipped the secondary check
    #[serde(default)]
    pub unvalidated: bool,
}

/// Cache tier identifiers, fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTier {
    L1,
    L2,
    L3,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::L1 => "l1",
            CacheTier::L2 => "l2",
            CacheTier::L3 => "l3",
        }
    }
}

/// Where a returned result came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum ResultOrigin {
    /// Fresh result from the named backend
    Backend(String),
    /// Served from a cache tier
    Cache(CacheTier),
}

/// The gateway's response to one prediction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub fingerprint: Fingerprint,
    pub query_type: QueryType,
    pub prediction: RawPrediction,
    pub evaluation: EvaluationResult,
    pub origin: ResultOrigin,
    pub generated_at: i64,
    pub latency_ms: u64,
}

/// The router's classification and backend selection for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDecision {
    pub query_type: QueryType,
    /// Primary backend id
    pub backend: String,
    /// Ordered fallback backend ids
    pub fallbacks: Vec<String>,
    /// Why the classifier chose this route (for audit)
    pub reason: String,
}

impl RouteDecision {
    /// Primary backend followed by fallbacks, in routing order
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.backend.as_str()).chain(self.fallbacks.iter().map(|s| s.as_str()))
    }
}

/// Cache lookup outcome recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "result", content = "tier")]
pub enum CacheOutcome {
    Hit(CacheTier),
    Miss,
}

/// Final outcome of one gateway transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "kind")]
pub enum RequestOutcome {
    Success,
    Error(String),
}

/// Immutable append-only record of one gateway transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub fingerprint: Fingerprint,
    pub cache: CacheOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<RouteDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<EvaluationResult>,
    pub outcome: RequestOutcome,
    pub latency_ms: u64,
    pub timestamp: i64,
}
