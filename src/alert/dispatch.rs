//! Alert dispatch gateway client.
//!
//! The threshold engine hands finished alert records to an [`AlertSink`];
//! the production sink posts them to the backend's `/alerts/create` endpoint
//! with bearer-token authentication. Dispatch is fire-and-forget from the
//! engine's perspective: the response body is never needed for correctness.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::DispatchError;

/// One persisted alert exceedance.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    /// Which resource crossed its limit: `"CPU"` or `"Memory"`.
    pub resource_type: String,
    /// The configured limit at the time of the crossing.
    pub threshold: f64,
    /// The sample value that crossed it.
    pub current_value: f64,
    /// Identity of the monitoring user.
    pub user_id: String,
}

/// Accepts alert records for persistence.
#[async_trait]
pub trait AlertSink: Send + Sync + Debug {
    /// Persist one alert record. At-most-once; the engine never retries.
    async fn create_alert(&self, alert: &AlertRecord) -> Result<(), DispatchError>;
}

/// REST implementation of [`AlertSink`].
#[derive(Debug, Clone)]
pub struct HttpAlertSink {
    client: Client,
    endpoint: String,
    token: String,
}

impl HttpAlertSink {
    /// Create a sink posting to `{endpoint}/alerts/create`.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl AlertSink for HttpAlertSink {
    async fn create_alert(&self, alert: &AlertRecord) -> Result<(), DispatchError> {
        let url = format!("{}/alerts/create", self.endpoint);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(alert)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(DispatchError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_record_wire_shape() {
        let record = AlertRecord {
            resource_type: "CPU".to_string(),
            threshold: 80.0,
            current_value: 92.5,
            user_id: "alice".to_string(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "resource_type": "CPU",
                "threshold": 80.0,
                "current_value": 92.5,
                "user_id": "alice"
            })
        );
    }
}
