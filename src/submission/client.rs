use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::{RecordSink, SaveDataResponse, SubmissionRecord};
use crate::config::{RecordStoreConfig, RequestConfig};
use crate::error::{SubmissionError, SubmissionResult};

/// Path of the save-data endpoint under the record store base URL.
const SAVE_DATA_PATH: &str = "/api/save-data";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveDataBody<'a> {
    user_data: &'a SubmissionRecord,
}

/// HTTP client for the record store's save-data endpoint
#[derive(Clone)]
pub struct RecordStoreClient {
    client: Client,
    base_url: String,
    request_config: RequestConfig,
}

impl RecordStoreClient {
    /// Create a new record store client
    pub fn new(config: &RecordStoreConfig, request_config: RequestConfig) -> SubmissionResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(SubmissionError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_config,
        })
    }

    /// Execute a single save request (internal)
    async fn execute_request(&self, record: &SubmissionRecord) -> SubmissionResult<()> {
        let url = format!("{}{}", self.base_url, SAVE_DATA_PATH);
        debug!(examinee = %record.name, url = %url, "Posting assessment record");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&SaveDataBody { user_data: record })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SubmissionError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    SubmissionError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<SaveDataResponse>(&error_body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(error_body);
            return Err(SubmissionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: SaveDataResponse =
            response
                .json()
                .await
                .map_err(|e| SubmissionError::InvalidResponse {
                    message: format!("Failed to parse save-data response: {}", e),
                })?;

        if !reply.success {
            return Err(SubmissionError::Rejected {
                message: reply
                    .error
                    .unwrap_or_else(|| "Record store reported failure".to_string()),
            });
        }

        Ok(())
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RecordSink for RecordStoreClient {
    async fn save(&self, record: &SubmissionRecord) -> SubmissionResult<()> {
        let start = Instant::now();
        self.execute_request(record).await?;
        info!(
            examinee = %record.name,
            latency_ms = start.elapsed().as_millis(),
            "Record store accepted submission"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_trims_trailing_slash() {
        let config = RecordStoreConfig {
            base_url: "http://localhost:3000/".to_string(),
        };

        let client = RecordStoreClient::new(&config, RequestConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "http://localhost:3000");
    }
}
