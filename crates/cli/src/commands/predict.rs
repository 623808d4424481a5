//! Prediction command

use anyhow::{bail, Result};
use std::collections::BTreeMap;
use tabled::Tabled;

use crate::client::{ApiClient, PredictionRequestBody, PredictionResponse};
use crate::output::{
    color_confidence, color_severity, color_verdict, format_latency, print_info, print_table,
    print_warning, OutputFormat,
};

/// Row for the prediction summary table
#[derive(Tabled, serde::Serialize)]
struct PredictionRow {
    #[tabled(rename = "Subjects")]
    subjects: String,
    #[tabled(rename = "Type")]
    query_type: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Confidence")]
    confidence: String,
    #[tabled(rename = "Origin")]
    origin: String,
    #[tabled(rename = "Generated")]
    generated: String,
    #[tabled(rename = "Latency")]
    latency: String,
}

fn format_generated_at(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms)
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Issue a prediction request and render the result
pub async fn run(
    client: &ApiClient,
    subjects: Vec<String>,
    query: &str,
    params: &[String],
    format: OutputFormat,
) -> Result<()> {
    let body = PredictionRequestBody {
        subjects: subjects.clone(),
        query: query.to_string(),
        params: parse_params(params)?,
    };

    let response: PredictionResponse = client.post("v1/predictions", &body).await?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Table => {
            let value = match &response.prediction.unit {
                Some(unit) => format!("{} {}", response.prediction.value, unit),
                None => response.prediction.value.to_string(),
            };
            let row = PredictionRow {
                subjects: subjects.join(", "),
                query_type: response.query_type.clone(),
                value,
                verdict: color_verdict(&response.evaluation.verdict),
                confidence: color_confidence(response.evaluation.confidence),
                origin: format_origin(&response),
                generated: format_generated_at(response.generated_at),
                latency: format_latency(response.latency_ms),
            };
            print_table(&[row], format);

            if let Some(anomaly) = &response.evaluation.anomaly {
                print_warning(&format!(
                    "anomaly ({}): {}",
                    color_severity(&anomaly.severity),
                    anomaly.detail
                ));
            }
            if response.evaluation.unvalidated {
                print_warning("result returned unvalidated (daily budget exhausted)");
            }
            if let Some(narrative) = &response.prediction.narrative {
                print_info(narrative);
            }
        }
    }

    Ok(())
}

fn format_origin(response: &PredictionResponse) -> String {
    let id = response
        .origin
        .id
        .as_str()
        .map(|s| s.to_string())
        .unwrap_or_else(|| response.origin.id.to_string());
    match response.origin.kind.as_str() {
        "cache" => format!("cache ({})", id),
        _ => id,
    }
}

/// Parse key=value parameter pairs
fn parse_params(params: &[String]) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for param in params {
        match param.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                map.insert(key.to_string(), value.to_string());
            }
            _ => bail!("invalid parameter '{}', expected KEY=VALUE", param),
        }
    }
    Ok(map)
}
