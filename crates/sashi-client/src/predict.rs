//! Resilient prediction client.
//!
//! Wraps the `POST /api/predict` call with a per-attempt timeout, bounded
//! retry, and a strict single-in-flight state machine. Retry handling is an
//! explicit loop with an attempt history, so the maximum-attempts bound is
//! structurally enforced and every outcome is observable afterwards.
//!
//! Outcome classification per attempt:
//! - 2xx: success, parsed result returned.
//! - timeout: terminal. A prediction that is already slow is not repeated.
//! - 5xx or transport failure: retryable.
//! - 4xx: terminal, surfaced with the status.

use crate::transport::HttpReply;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sashi_core::config::{ClientConfig, Routes};
use sashi_core::{Result, SashiError};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Phase of a prediction submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    Submitting,
    Retrying,
    Succeeded,
    Failed,
}

impl CallPhase {
    /// A non-terminal phase blocks further submissions (single-flight).
    pub fn is_in_flight(&self) -> bool {
        matches!(self, CallPhase::Submitting | CallPhase::Retrying)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallPhase::Succeeded | CallPhase::Failed)
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Pending,
    Ok,
    RetryableError(String),
    FatalError(String),
    TimedOut,
}

/// Bookkeeping for one attempt; kept in the call history after it resolves.
#[derive(Debug, Clone)]
pub struct CallAttempt {
    pub index: u32,
    pub started_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

/// Owned state of one submission: phase plus the ordered attempt history.
#[derive(Debug, Clone)]
pub struct PredictionCallState {
    pub phase: CallPhase,
    pub attempts: Vec<CallAttempt>,
}

impl PredictionCallState {
    fn idle() -> Self {
        Self {
            phase: CallPhase::Idle,
            attempts: Vec::new(),
        }
    }
}

impl Default for PredictionCallState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Retry policy: fixed delay, no jitter by default, matching the service's
/// deployed behavior. The jitter knob exists for hardened deployments.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay between attempts.
    pub delay: Duration,
    /// Multiply the delay by a random factor in [0.5, 1.5).
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: ClientConfig::MAX_RETRIES,
            delay: ClientConfig::RETRY_DELAY,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the next attempt.
    pub fn next_delay(&self) -> Duration {
        if self.jitter {
            use rand::Rng;
            let factor = rand::rng().random_range(0.5..1.5);
            Duration::from_secs_f64(self.delay.as_secs_f64() * factor)
        } else {
            self.delay
        }
    }
}

/// The image payload submitted for grading.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl ImagePayload {
    pub fn jpeg(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: "image/jpeg".to_string(),
            bytes: bytes.into(),
        }
    }

    pub fn png(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: "image/png".to_string(),
            bytes: bytes.into(),
        }
    }

    /// Mirror of the server's 413 bound, checked before any bytes go out.
    pub fn validate(&self) -> Result<()> {
        let actual = self.bytes.len() as u64;
        if actual > ClientConfig::MAX_IMAGE_BYTES {
            return Err(SashiError::PayloadTooLarge {
                limit_bytes: ClientConfig::MAX_IMAGE_BYTES,
                actual_bytes: actual,
            });
        }
        Ok(())
    }
}

/// Binary marbling grade returned by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Prediction {
    High,
    Low,
}

/// Parsed success response from the prediction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    pub status: String,
    pub prediction: Prediction,
    /// Confidence in the predicted side, already folded to [0.5, 1].
    pub confidence: f64,
    /// Display label assigned by the service (e.g. the cut grade).
    pub classification: String,
    /// Server-side processing time in seconds.
    pub processing_time: f64,
    /// ISO-8601 timestamp from the service.
    pub timestamp: String,
}

impl PredictionResult {
    /// Whether the item graded as the premium (HIGH) class.
    pub fn is_high(&self) -> bool {
        self.prediction == Prediction::High
    }
}

/// Seam between the retry machine and the actual multipart upload.
#[async_trait]
pub trait PredictTransport: Send + Sync {
    /// Upload the payload and return the raw status and body. Transport
    /// failures (DNS, refused connection) surface as errors; HTTP error
    /// statuses surface as replies.
    async fn send(&self, payload: &ImagePayload) -> Result<HttpReply>;
}

/// Production transport over reqwest multipart.
///
/// Deliberately built without a client-level timeout: the retry machine
/// bounds each attempt itself.
pub struct ReqwestPredictTransport {
    client: reqwest::Client,
    predict_url: String,
}

impl ReqwestPredictTransport {
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base = base_url
            .unwrap_or(ClientConfig::DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        let client = reqwest::Client::builder()
            .user_agent("sashi-client")
            .build()
            .map_err(|e| SashiError::Transport {
                message: format!("Failed to build HTTP client: {}", e),
                cause: None,
            })?;
        Ok(Self {
            client,
            predict_url: format!("{}{}", base, Routes::PREDICT_PATH),
        })
    }
}

#[async_trait]
impl PredictTransport for ReqwestPredictTransport {
    async fn send(&self, payload: &ImagePayload) -> Result<HttpReply> {
        let part = reqwest::multipart::Part::bytes(payload.bytes.to_vec())
            .file_name(payload.file_name.clone())
            .mime_str(&payload.mime)
            .map_err(|e| SashiError::Config {
                message: format!("Invalid payload mime type {}: {}", payload.mime, e),
            })?;
        let form = reqwest::multipart::Form::new().part("image", part);

        debug!("POST {} ({} bytes)", self.predict_url, payload.bytes.len());
        let response = self.client.post(&self.predict_url).multipart(form).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(HttpReply { status, body })
    }
}

/// Prediction client with timeout, bounded retry, and single-flight.
pub struct ResilientAPIClient {
    transport: Arc<dyn PredictTransport>,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    state: Mutex<PredictionCallState>,
}

impl ResilientAPIClient {
    /// Client against the given base URL (default `http://127.0.0.1:5000`).
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        Ok(Self::with_transport(Arc::new(ReqwestPredictTransport::new(
            base_url,
        )?)))
    }

    /// Client over a custom transport, with default policy and timeout.
    pub fn with_transport(transport: Arc<dyn PredictTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            attempt_timeout: ClientConfig::ATTEMPT_TIMEOUT,
            state: Mutex::new(PredictionCallState::idle()),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Snapshot of the current call state.
    pub fn call_state(&self) -> PredictionCallState {
        self.state.lock().unwrap().clone()
    }

    /// Acknowledge a terminal call, returning the state to `Idle`.
    /// No-op while a call is in flight.
    pub fn acknowledge(&self) {
        let mut state = self.state.lock().unwrap();
        if state.phase.is_terminal() {
            *state = PredictionCallState::idle();
        }
    }

    /// Submit an image for grading.
    ///
    /// Rejects immediately with [`SashiError::Busy`] if a prior call is
    /// still in flight; a terminal (unacknowledged) state is replaced.
    pub async fn submit(&self, payload: &ImagePayload) -> Result<PredictionResult> {
        self.begin()?;

        if let Err(e) = payload.validate() {
            self.set_phase(CallPhase::Failed);
            return Err(e);
        }

        let mut attempt: u32 = 0;
        loop {
            self.record_attempt_start(attempt);

            let outcome =
                tokio::time::timeout(self.attempt_timeout, self.transport.send(payload)).await;

            let error = match outcome {
                // Attempt timed out: cancel it and fail terminally.
                Err(_) => {
                    self.record_outcome(AttemptOutcome::TimedOut);
                    self.set_phase(CallPhase::Failed);
                    warn!("Prediction attempt {} timed out", attempt + 1);
                    return Err(SashiError::Timeout(self.attempt_timeout));
                }
                Ok(Err(e)) => e,
                Ok(Ok(reply)) => match self.parse_reply(reply, payload) {
                    Ok(result) => {
                        self.record_outcome(AttemptOutcome::Ok);
                        self.set_phase(CallPhase::Succeeded);
                        info!(
                            "Prediction succeeded on attempt {}: {:?} ({:.1}%)",
                            attempt + 1,
                            result.prediction,
                            result.confidence * 100.0
                        );
                        return Ok(result);
                    }
                    Err(e) => e,
                },
            };

            if error.is_retryable() && attempt < self.policy.max_retries {
                self.record_outcome(AttemptOutcome::RetryableError(error.to_string()));
                self.set_phase(CallPhase::Retrying);
                let delay = self.policy.next_delay();
                warn!(
                    "Prediction attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt + 1,
                    self.policy.max_retries + 1,
                    error,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if error.is_retryable() {
                self.record_outcome(AttemptOutcome::RetryableError(error.to_string()));
                warn!(
                    "All {} prediction attempts exhausted. Last error: {}",
                    self.policy.max_retries + 1,
                    error
                );
            } else {
                let outcome = match &error {
                    SashiError::Timeout(_) => AttemptOutcome::TimedOut,
                    other => AttemptOutcome::FatalError(other.to_string()),
                };
                self.record_outcome(outcome);
            }
            self.set_phase(CallPhase::Failed);
            return Err(error);
        }
    }

    /// Classify a raw reply into a parsed result or a typed error.
    fn parse_reply(&self, reply: HttpReply, payload: &ImagePayload) -> Result<PredictionResult> {
        match reply.status {
            200..=299 => serde_json::from_slice(&reply.body).map_err(SashiError::from),
            413 => Err(SashiError::PayloadTooLarge {
                limit_bytes: ClientConfig::MAX_IMAGE_BYTES,
                actual_bytes: payload.bytes.len() as u64,
            }),
            status @ 500..=599 => Err(SashiError::Server {
                status,
                message: reply.error_message(),
            }),
            status => Err(SashiError::Client {
                status,
                message: reply.error_message(),
            }),
        }
    }

    /// Single-flight gate: reject while in flight, reset otherwise.
    fn begin(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.phase.is_in_flight() {
            return Err(SashiError::Busy);
        }
        *state = PredictionCallState {
            phase: CallPhase::Submitting,
            attempts: Vec::new(),
        };
        Ok(())
    }

    fn record_attempt_start(&self, index: u32) {
        let started_at = Utc::now();
        let deadline = started_at
            + chrono::Duration::from_std(self.attempt_timeout).unwrap_or_default();
        self.state.lock().unwrap().attempts.push(CallAttempt {
            index,
            started_at,
            deadline,
            outcome: AttemptOutcome::Pending,
        });
    }

    fn record_outcome(&self, outcome: AttemptOutcome) {
        if let Some(attempt) = self.state.lock().unwrap().attempts.last_mut() {
            attempt.outcome = outcome;
        }
    }

    fn set_phase(&self, phase: CallPhase) {
        self.state.lock().unwrap().phase = phase;
    }
}
