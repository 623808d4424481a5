//! Query classification rules
//!
//! Classification is a priority-ordered table of compiled keyword rules.
//! Rules are sorted by specificity (total matched keyword length) at
//! construction and evaluated in that order, so a compound intent like
//! "forecast from this chart" is never shadowed by the generic
//! "forecast" rule.

use crate::models::{PredictionRequest, QueryType};
use std::collections::HashMap;

/// Primary backend and ordered fallbacks for one query type
#[derive(Debug, Clone)]
pub struct BackendRoute {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

impl BackendRoute {
    pub fn new(primary: impl Into<String>, fallbacks: &[&str]) -> Self {
        Self {
            primary: primary.into(),
            fallbacks: fallbacks.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// One classification rule before compilation
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub query_type: QueryType,
    /// Keywords that must all appear in the normalized query text
    pub keywords: Vec<String>,
    /// Request params whose presence matches regardless of text
    pub param_keys: Vec<String>,
}

impl RouteRule {
    pub fn keywords(query_type: QueryType, keywords: &[&str]) -> Self {
        Self {
            query_type,
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            param_keys: Vec::new(),
        }
    }

    pub fn params(query_type: QueryType, param_keys: &[&str]) -> Self {
        Self {
            query_type,
            keywords: Vec::new(),
            param_keys: param_keys.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Longer/compound rules sort first
    fn specificity(&self) -> usize {
        let keyword_len: usize = self.keywords.iter().map(|k| k.len()).sum();
        let param_len: usize = self.param_keys.iter().map(|k| k.len()).sum();
        keyword_len + param_len
    }
}

/// Compiled, priority-ordered routing table
///
/// Built once at startup; classification is a linear scan over the
/// pre-sorted rules with no per-request allocation beyond the reason
/// string.
pub struct RouteTable {
    rules: Vec<RouteRule>,
    routes: HashMap<QueryType, BackendRoute>,
    default_route: BackendRoute,
}

impl RouteTable {
    pub fn new(
        mut rules: Vec<RouteRule>,
        routes: HashMap<QueryType, BackendRoute>,
        default_route: BackendRoute,
    ) -> Self {
        rules.sort_by(|a, b| b.specificity().cmp(&a.specificity()));
        Self {
            rules,
            routes,
            default_route,
        }
    }

    /// The conventional table used by the service binary and tests
    pub fn standard() -> Self {
        let rules = vec![
            // Compound rules first in spirit; ordering is by specificity
            RouteRule::keywords(QueryType::ChartAnalysis, &["chart", "forecast"]),
            RouteRule::keywords(QueryType::ChartAnalysis, &["chart", "pattern"]),
            RouteRule::keywords(QueryType::ChartAnalysis, &["candlestick"]),
            RouteRule::keywords(QueryType::ChartAnalysis, &["chart"]),
            RouteRule::params(QueryType::ChartAnalysis, &["chart_data", "image_ref"]),
            RouteRule::keywords(QueryType::PayoutScore, &["dividend", "safety"]),
            RouteRule::keywords(QueryType::PayoutScore, &["payout"]),
            RouteRule::keywords(QueryType::PayoutScore, &["rating"]),
            RouteRule::keywords(QueryType::QuantForecast, &["price", "target"]),
            RouteRule::keywords(QueryType::QuantForecast, &["projection"]),
            RouteRule::keywords(QueryType::QuantForecast, &["forecast"]),
            RouteRule::keywords(QueryType::QuickQuote, &["current", "price"]),
            RouteRule::keywords(QueryType::QuickQuote, &["quote"]),
        ];

        let mut routes = HashMap::new();
        routes.insert(
            QueryType::PayoutScore,
            BackendRoute::new("ml-scoring", &["llm-primary"]),
        );
        routes.insert(
            QueryType::QuantForecast,
            BackendRoute::new("ml-forecast", &["llm-primary"]),
        );
        routes.insert(
            QueryType::ChartAnalysis,
            BackendRoute::new("llm-vision", &["llm-primary"]),
        );
        routes.insert(
            QueryType::QuickQuote,
            BackendRoute::new("quote-service", &["llm-primary"]),
        );

        let default_route = BackendRoute::new("llm-primary", &["llm-secondary"]);
        Self::new(rules, routes, default_route)
    }

    /// Classify a request, returning the query type and the audit reason
    pub fn classify(&self, request: &PredictionRequest) -> (QueryType, String) {
        let text = normalize(&request.query);
        for rule in &self.rules {
            if !rule.keywords.is_empty() && rule.keywords.iter().all(|k| text.contains(k.as_str()))
            {
                return (
                    rule.query_type,
                    format!("matched keywords {:?}", rule.keywords),
                );
            }
            if !rule.param_keys.is_empty()
                && rule
                    .param_keys
                    .iter()
                    .any(|k| request.params.contains_key(k))
            {
                return (
                    rule.query_type,
                    format!("matched params {:?}", rule.param_keys),
                );
            }
        }
        (
            QueryType::General,
            "no rule matched, defaulting to general".to_string(),
        )
    }

    /// Backend route for a classified query type
    pub fn route_for(&self, query_type: QueryType) -> &BackendRoute {
        self.routes.get(&query_type).unwrap_or(&self.default_route)
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str) -> PredictionRequest {
        PredictionRequest::new(vec!["AAPL".to_string()], query)
    }

    #[test]
    fn test_payout_tag_classifies_as_scoring() {
        let table = RouteTable::standard();
        let (qt, reason) = table.classify(&request("payout_rating"));
        assert_eq!(qt, QueryType::PayoutScore);
        assert!(reason.contains("payout"));
    }

    #[test]
    fn test_forecast_classifies_as_quant() {
        let table = RouteTable::standard();
        let (qt, _) = table.classify(&request("30 day price forecast"));
        assert_eq!(qt, QueryType::QuantForecast);
    }

    #[test]
    fn test_compound_intent_not_shadowed_by_generic_rule() {
        // "forecast" alone is QuantForecast, but together with "chart"
        // the compound chart rule must win
        let table = RouteTable::standard();
        let (qt, reason) = table.classify(&request("forecast from this chart"));
        assert_eq!(qt, QueryType::ChartAnalysis);
        assert!(reason.contains("chart"));
    }

    #[test]
    fn test_param_rule_matches_without_text() {
        let table = RouteTable::standard();
        let req = request("what do you see here").with_param("chart_data", "ref-123");
        let (qt, reason) = table.classify(&req);
        assert_eq!(qt, QueryType::ChartAnalysis);
        assert!(reason.contains("params"));
    }

    #[test]
    fn test_unmatched_query_defaults_to_general() {
        let table = RouteTable::standard();
        let (qt, reason) = table.classify(&request("tell me about this company"));
        assert_eq!(qt, QueryType::General);
        assert!(reason.contains("defaulting"));
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        let table = RouteTable::standard();
        let (qt, _) = table.classify(&request("PAYOUT Rating"));
        assert_eq!(qt, QueryType::PayoutScore);
    }

    #[test]
    fn test_route_lookup() {
        let table = RouteTable::standard();
        let route = table.route_for(QueryType::QuantForecast);
        assert_eq!(route.primary, "ml-forecast");
        assert_eq!(route.fallbacks, vec!["llm-primary".to_string()]);

        let general = table.route_for(QueryType::General);
        assert_eq!(general.primary, "llm-primary");
    }
}
