//! HTTP client for the third-party accrual calculator.
//!
//! Grounded on `examples/original_source/internal/order_created/clients/accrual_client.go`:
//! `POST /api/orders` to kick off a calculation (success = 202), `GET
//! /api/orders/{number}` to poll its result, with a typed error carrying
//! `retry_after` when the calculator responds 429.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One line item priced into an order, as the calculator expects it.
#[derive(Debug, Clone, Serialize)]
pub struct CalculateGood {
    pub description: String,
    pub price: i64,
}

/// Body of the `POST /api/orders` request.
#[derive(Debug, Clone, Serialize)]
pub struct CalculateRequest {
    pub order: String,
    pub goods: Vec<CalculateGood>,
}

/// The upstream accrual status the calculator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualStatus {
    /// Not yet settled; the caller should re-poll.
    #[must_use]
    pub const fn is_pending(self) -> bool {
        matches!(self, AccrualStatus::Registered | AccrualStatus::Processing)
    }
}

/// Body of the `GET /api/orders/{number}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualResult {
    pub order: String,
    #[serde(default)]
    pub accrual: f64,
    pub status: AccrualStatus,
}

/// Errors from talking to the calculator.
#[derive(Debug, Error)]
pub enum CalculatorError {
    /// The calculator responded 429; sleep `retry_after` and re-enqueue —
    /// do not mutate the database for this error.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Calculate request did not return 202 Accepted.
    #[error("calculate request failed with status {status}: {body}")]
    CalculateRejected { status: u16, body: String },

    /// Network/transport failure.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    /// A `Retry-After` header was present but not a valid integer, or the
    /// result body wasn't valid JSON for the documented shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// The two operations the poll daemon needs from the calculator, factored
/// out so daemon code can run against an in-memory fake in tests.
#[async_trait::async_trait]
pub trait CalculatorApi: Send + Sync {
    /// See [`CalculatorClient::calculate`].
    async fn calculate(&self, request: &CalculateRequest) -> Result<(), CalculatorError>;
    /// See [`CalculatorClient::result`].
    async fn result(&self, order_number: &str) -> Result<AccrualResult, CalculatorError>;
}

/// Thin `reqwest`-backed client for the calculator's two endpoints.
pub struct CalculatorClient {
    http: reqwest::Client,
    base_url: String,
}

impl CalculatorClient {
    /// Build a client targeting `base_url` (e.g. `http://127.0.0.1:8080`).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// `POST /api/orders`. Any response other than 202 Accepted is an error.
    pub async fn calculate(&self, request: &CalculateRequest) -> Result<(), CalculatorError> {
        let response = self
            .http
            .post(format!("{}/api/orders", self.base_url))
            .json(request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::ACCEPTED {
            return Ok(());
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(order = %request.order, status, "calculate request rejected by calculator");
        Err(CalculatorError::CalculateRejected { status, body })
    }

    /// `GET /api/orders/{number}`. A 429 response yields
    /// `CalculatorError::RateLimited` carrying the `Retry-After` header
    /// (parsed as whole seconds, matching the original's `strconv.Atoi`).
    pub async fn result(&self, order_number: &str) -> Result<AccrualResult, CalculatorError> {
        let response = self
            .http
            .get(format!("{}/api/orders/{order_number}", self.base_url))
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .ok_or_else(|| CalculatorError::Malformed("missing or non-numeric Retry-After header".into()))?;

            tracing::debug!(order_number, retry_after_secs, "calculator responded 429");
            return Err(CalculatorError::RateLimited {
                retry_after: Duration::from_secs(retry_after_secs),
            });
        }

        response
            .json::<AccrualResult>()
            .await
            .map_err(|e| CalculatorError::Malformed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl CalculatorApi for CalculatorClient {
    async fn calculate(&self, request: &CalculateRequest) -> Result<(), CalculatorError> {
        Self::calculate(self, request).await
    }

    async fn result(&self, order_number: &str) -> Result<AccrualResult, CalculatorError> {
        Self::result(self, order_number).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn pending_statuses_are_registered_and_processing_only() {
        assert!(AccrualStatus::Registered.is_pending());
        assert!(AccrualStatus::Processing.is_pending());
        assert!(!AccrualStatus::Invalid.is_pending());
        assert!(!AccrualStatus::Processed.is_pending());
    }

    #[test]
    fn accrual_result_parses_documented_shape() {
        let body = serde_json::json!({"order": "42", "accrual": 12.34, "status": "PROCESSED"});
        let parsed: AccrualResult = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.order, "42");
        assert!((parsed.accrual - 12.34).abs() < f64::EPSILON);
        assert_eq!(parsed.status, AccrualStatus::Processed);
    }
}
