use super::{ResultReporter, ScanOutcome};
use crate::config::ReporterConfig;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct ScanRequest<'a> {
    code: &'a str,
}

/// Posts `{"code": ...}` as JSON to the configured endpoint
pub struct HttpReporter {
    client: reqwest::Client,
    config: ReporterConfig,
}

impl HttpReporter {
    pub fn new(config: ReporterConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ScanError::system(format!("Failed to build HTTP client: {}", e)))?;

        info!("Reporting scanned codes to {}", config.endpoint);
        Ok(Self { client, config })
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl ResultReporter for HttpReporter {
    async fn report(&self, code: &str) -> ScanOutcome {
        debug!("POST {} ({} chars)", self.config.endpoint, code.len());

        let response = match self
            .client
            .post(&self.config.endpoint)
            .json(&ScanRequest { code })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Reporter request failed: {}", e);
                return ScanOutcome::failure(self.config.failure_message.clone());
            }
        };

        let status = response.status();
        let message = match response.text().await {
            Ok(body) => serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string)),
            Err(e) => {
                debug!("Could not read reporter response body: {}", e);
                None
            }
        };

        if status.is_success() {
            info!("Backend accepted code ({})", status);
            ScanOutcome::success(message.unwrap_or_else(|| self.config.success_message.clone()))
        } else {
            warn!("Backend rejected code with {}", status);
            ScanOutcome::failure(message.unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.to_string())
            }))
        }
    }
}
