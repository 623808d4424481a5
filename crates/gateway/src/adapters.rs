//! HTTP backend adapters
//!
//! Thin reqwest-based [`BackendAdapter`] implementations for prediction
//! backends that speak JSON over HTTP. The wire protocol is a POST of
//! the request body; the backend answers with a `RawPrediction`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use gateway_lib::backend::BackendAdapter;
use gateway_lib::models::{PredictionRequest, RawPrediction};
use gateway_lib::BackendError;
use reqwest::StatusCode;
use std::time::Duration;

/// JSON-over-HTTP adapter for one backend
pub struct HttpBackend {
    id: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(id: &str, endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            id: id.to_string(),
            endpoint: endpoint.to_string(),
            timeout,
            client,
        })
    }
}

#[async_trait]
impl BackendAdapter for HttpBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn call(&self, request: &PredictionRequest) -> Result<RawPrediction, BackendError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        backend: self.id.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    }
                } else {
                    BackendError::Unavailable {
                        backend: self.id.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        if let Some(err) = classify_status(&self.id, response.status(), self.timeout) {
            return Err(err);
        }

        response
            .json::<RawPrediction>()
            .await
            .map_err(|e| BackendError::Unavailable {
                backend: self.id.clone(),
                reason: format!("invalid response body: {}", e),
            })
    }
}

/// Map non-success HTTP statuses onto the backend error taxonomy
fn classify_status(backend: &str, status: StatusCode, timeout: Duration) -> Option<BackendError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited {
            backend: backend.to_string(),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => BackendError::Timeout {
            backend: backend.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        },
        other => BackendError::Unavailable {
            backend: backend.to_string(),
            reason: format!("HTTP status {}", other),
        },
    })
}
