//! Gateway configuration

use anyhow::Result;
use serde::Deserialize;

/// Gateway configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Instance name used in structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// API server port for predictions, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// L1 cache capacity (entries)
    #[serde(default = "default_l1_capacity")]
    pub l1_capacity: usize,

    /// L1 cache TTL in seconds
    #[serde(default = "default_l1_ttl")]
    pub l1_ttl_secs: u64,

    /// L2 cache TTL in seconds
    #[serde(default = "default_l2_ttl")]
    pub l2_ttl_secs: u64,

    /// L3 cache TTL in seconds
    #[serde(default = "default_l3_ttl")]
    pub l3_ttl_secs: u64,

    /// Per-call backend timeout in seconds
    #[serde(default = "default_backend_timeout")]
    pub backend_timeout_secs: u64,

    /// Per-backend concurrency bound
    #[serde(default = "default_backend_concurrency")]
    pub backend_concurrency: usize,

    /// Consecutive failures before a backend's breaker opens
    #[serde(default = "default_breaker_threshold")]
    pub breaker_failure_threshold: u32,

    /// Breaker cool-down in seconds
    #[serde(default = "default_breaker_cooldown")]
    pub breaker_cooldown_secs: u64,

    /// Secondary validation checks allowed per UTC day
    #[serde(default = "default_validation_budget")]
    pub validation_daily_budget: u32,

    /// Backend endpoints
    #[serde(default = "default_llm_primary_url")]
    pub llm_primary_url: String,
    #[serde(default = "default_llm_secondary_url")]
    pub llm_secondary_url: String,
    #[serde(default = "default_llm_vision_url")]
    pub llm_vision_url: String,
    #[serde(default = "default_ml_scoring_url")]
    pub ml_scoring_url: String,
    #[serde(default = "default_ml_forecast_url")]
    pub ml_forecast_url: String,
    #[serde(default = "default_quote_service_url")]
    pub quote_service_url: String,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "gateway-0".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_l1_capacity() -> usize {
    1024
}

fn default_l1_ttl() -> u64 {
    10 * 60
}

fn default_l2_ttl() -> u64 {
    60 * 60
}

fn default_l3_ttl() -> u64 {
    6 * 60 * 60
}

fn default_backend_timeout() -> u64 {
    10
}

fn default_backend_concurrency() -> usize {
    32
}

fn default_breaker_threshold() -> u32 {
    3
}

fn default_breaker_cooldown() -> u64 {
    30
}

fn default_validation_budget() -> u32 {
    50_000
}

fn default_llm_primary_url() -> String {
    "http://llm-primary:9000/v1/predict".to_string()
}

fn default_llm_secondary_url() -> String {
    "http://llm-secondary:9000/v1/predict".to_string()
}

fn default_llm_vision_url() -> String {
    "http://llm-vision:9000/v1/predict".to_string()
}

fn default_ml_scoring_url() -> String {
    "http://ml-scoring:9100/v1/predict".to_string()
}

fn default_ml_forecast_url() -> String {
    "http://ml-forecast:9100/v1/predict".to_string()
}

fn default_quote_service_url() -> String {
    "http://quote-service:9200/v1/quote".to_string()
}

impl GatewayConfig {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("GATEWAY"))
            .build()?;

        Ok(config.try_deserialize().unwrap_or_else(|_| GatewayConfig {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            l1_capacity: default_l1_capacity(),
            l1_ttl_secs: default_l1_ttl(),
            l2_ttl_secs: default_l2_ttl(),
            l3_ttl_secs: default_l3_ttl(),
            backend_timeout_secs: default_backend_timeout(),
            backend_concurrency: default_backend_concurrency(),
            breaker_failure_threshold: default_breaker_threshold(),
            breaker_cooldown_secs: default_breaker_cooldown(),
            validation_daily_budget: default_validation_budget(),
            llm_primary_url: default_llm_primary_url(),
            llm_secondary_url: default_llm_secondary_url(),
            llm_vision_url: default_llm_vision_url(),
            ml_scoring_url: default_ml_scoring_url(),
            ml_forecast_url: default_ml_forecast_url(),
            quote_service_url: default_quote_service_url(),
        }))
    }

    /// Backend id to endpoint pairs for adapter registration
    pub fn backend_endpoints(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("llm-primary", self.llm_primary_url.as_str()),
            ("llm-secondary", self.llm_secondary_url.as_str()),
            ("llm-vision", self.llm_vision_url.as_str()),
            ("ml-scoring", self.ml_scoring_url.as_str()),
            ("ml-forecast", self.ml_forecast_url.as_str()),
            ("quote-service", self.quote_service_url.as_str()),
        ]
    }
}
