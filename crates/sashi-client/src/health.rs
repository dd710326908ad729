//! Health probe against the grading service.

use async_trait::async_trait;
use sashi_core::config::{ClientConfig, Routes};
use sashi_core::{Result, SashiError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Parsed reply from `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub model_loaded: bool,
    #[serde(default)]
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_info: Option<ModelInfo>,
}

impl HealthStatus {
    /// The service is up and its model is ready to grade.
    pub fn is_healthy(&self) -> bool {
        (self.status == "healthy" || self.status == "ok") && self.model_loaded
    }
}

/// Model metadata reported by the service. Every field is optional;
/// older service builds omit most of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_params: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prediction_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_inference_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Vec<u32>>,
}

/// Seam for probing service health, mockable in tests.
#[async_trait]
pub trait HealthTransport: Send + Sync {
    async fn probe(&self) -> Result<HealthStatus>;
}

/// Production probe over reqwest with a short timeout; a health check
/// that takes longer than a few seconds is itself an unhealthy signal.
pub struct ReqwestHealthTransport {
    client: reqwest::Client,
    health_url: String,
}

impl ReqwestHealthTransport {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base = base_url
            .unwrap_or(ClientConfig::DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::Client::builder()
            .user_agent("sashi-client")
            .timeout(ClientConfig::HEALTH_TIMEOUT)
            .build()
            .map_err(|e| SashiError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
                cause: None,
            })?;
        Ok(Self {
            client,
            health_url: format!("{}{}", base, Routes::HEALTH_PATH),
        })
    }
}

#[async_trait]
impl HealthTransport for ReqwestHealthTransport {
    async fn probe(&self) -> Result<HealthStatus> {
        debug!("GET {}", self.health_url);
        let response = self.client.get(&self.health_url).send().await?;
        let status = response.status().as_u16();
        if !(200..=299).contains(&status) {
            return Err(SashiError::Server {
                status,
                message: format!("Health endpoint returned HTTP {}", status),
            });
        }
        let health = response.json::<HealthStatus>().await?;
        Ok(health)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_healthy_status_requires_loaded_model() {
        let health: HealthStatus = serde_json::from_str(
            r#"{"status":"healthy","model_loaded":true,"timestamp":"2025-06-01T12:00:00"}"#,
        )
        .unwrap();
        assert!(health.is_healthy());

        let unloaded: HealthStatus =
            serde_json::from_str(r#"{"status":"healthy","model_loaded":false}"#).unwrap();
        assert!(!unloaded.is_healthy());

        let degraded: HealthStatus =
            serde_json::from_str(r#"{"status":"degraded","model_loaded":true}"#).unwrap();
        assert!(!degraded.is_healthy());
    }

    #[test]
    fn test_model_info_fields_are_optional() {
        let health: HealthStatus = serde_json::from_str(
            r#"{
                "status": "ok",
                "model_loaded": true,
                "model_info": {"model_name": "marble-net", "total_params": 11689512}
            }"#,
        )
        .unwrap();
        let info = health.model_info.unwrap();
        assert_eq!(info.model_name.as_deref(), Some("marble-net"));
        assert_eq!(info.total_params, Some(11_689_512));
        assert!(info.average_inference_time.is_none());
    }
}
