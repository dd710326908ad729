//! End-to-end resilience scenarios through the public API: an outage,
//! a verified reconnect, and a successful resubmission.

use async_trait::async_trait;
use bytes::Bytes;
use sashi_client::{
    AttemptOutcome, BackgroundSyncCoordinator, CallPhase, ConnectivityState, HealthStatus,
    HealthTransport, HttpReply, ImagePayload, PredictTransport, Prediction, ResilientAPIClient,
    RetryPolicy,
};
use sashi_core::{Result, SashiError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const SUCCESS_BODY: &str = r#"{
    "status": "success",
    "prediction": "HIGH",
    "confidence": 0.875,
    "classification": "premium",
    "processing_time": 2.3,
    "timestamp": "2025-06-01T12:00:00"
}"#;

/// Simulated service: a shared queue of outcomes consumed by both the
/// prediction and health transports.
struct FlakyService {
    predict_replies: Mutex<VecDeque<Result<HttpReply>>>,
    health_replies: Mutex<VecDeque<Result<HealthStatus>>>,
}

impl FlakyService {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            predict_replies: Mutex::new(VecDeque::new()),
            health_replies: Mutex::new(VecDeque::new()),
        })
    }

    fn push_predict(&self, reply: Result<HttpReply>) {
        self.predict_replies.lock().unwrap().push_back(reply);
    }

    fn push_health(&self, reply: Result<HealthStatus>) {
        self.health_replies.lock().unwrap().push_back(reply);
    }
}

#[async_trait]
impl PredictTransport for FlakyService {
    async fn send(&self, _payload: &ImagePayload) -> Result<HttpReply> {
        self.predict_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(offline)
    }
}

#[async_trait]
impl HealthTransport for FlakyService {
    async fn probe(&self) -> Result<HealthStatus> {
        self.health_replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(SashiError::Transport {
                    message: "connection refused".into(),
                    cause: None,
                })
            })
    }
}

fn offline<T>() -> Result<T> {
    Err(SashiError::Transport {
        message: "connection refused".into(),
        cause: None,
    })
}

fn ok_reply() -> Result<HttpReply> {
    Ok(HttpReply {
        status: 200,
        body: Bytes::from_static(SUCCESS_BODY.as_bytes()),
    })
}

fn healthy() -> Result<HealthStatus> {
    Ok(HealthStatus {
        status: "healthy".to_string(),
        model_loaded: true,
        timestamp: "2025-06-01T12:00:00".to_string(),
        version: None,
        model_info: None,
    })
}

fn sample_image() -> ImagePayload {
    ImagePayload::jpeg("sample.jpg", vec![0xd8u8; 2 * 1024 * 1024])
}

#[tokio::test(start_paused = true)]
async fn test_outage_reconnect_and_resubmit() {
    let service = FlakyService::new();
    let client = ResilientAPIClient::with_transport(service.clone());
    let coordinator = BackgroundSyncCoordinator::new(service.clone());
    let mut sync_events = coordinator.subscribe();

    // Submission during the outage exhausts every retry.
    let err = client.submit(&sample_image()).await.unwrap_err();
    assert!(matches!(err, SashiError::Transport { .. }));
    let state = client.call_state();
    assert_eq!(state.phase, CallPhase::Failed);
    assert_eq!(state.attempts.len(), 4);
    coordinator.notice_offline();
    assert_eq!(coordinator.connectivity(), ConnectivityState::Offline);

    // A reconnect signal while the service is still down changes nothing.
    assert!(!coordinator.on_reconnect().await);
    assert!(sync_events.try_recv().is_err());

    // The service comes back; the next reconnect verifies and announces it.
    service.push_health(healthy());
    assert!(coordinator.on_reconnect().await);
    assert_eq!(coordinator.connectivity(), ConnectivityState::Online);
    assert!(sync_events.try_recv().is_ok());

    // The resubmission now goes through on the first attempt.
    service.push_predict(ok_reply());
    let result = client.submit(&sample_image()).await.unwrap();
    assert_eq!(result.prediction, Prediction::High);
    assert_eq!(result.classification, "premium");

    let state = client.call_state();
    assert_eq!(state.phase, CallPhase::Succeeded);
    assert_eq!(state.attempts.len(), 1);
    assert_eq!(state.attempts[0].outcome, AttemptOutcome::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_brief_blip_recovers_within_one_submission() {
    let service = FlakyService::new();
    let client = ResilientAPIClient::with_transport(service.clone())
        .with_policy(RetryPolicy::new().with_delay(Duration::from_secs(1)));

    // Two failed attempts, then the service recovers mid-call.
    service.push_predict(offline());
    service.push_predict(Ok(HttpReply {
        status: 503,
        body: Bytes::from_static(br#"{"status":"error","message":"warming up"}"#),
    }));
    service.push_predict(ok_reply());

    let result = client.submit(&sample_image()).await.unwrap();
    assert!(result.is_high());

    let state = client.call_state();
    assert_eq!(state.phase, CallPhase::Succeeded);
    assert_eq!(state.attempts.len(), 3);
    assert!(matches!(
        state.attempts[0].outcome,
        AttemptOutcome::RetryableError(_)
    ));
    assert!(matches!(
        state.attempts[1].outcome,
        AttemptOutcome::RetryableError(_)
    ));
    assert_eq!(state.attempts[2].outcome, AttemptOutcome::Ok);
}

#[tokio::test(start_paused = true)]
async fn test_acknowledged_failure_allows_fresh_call() {
    let service = FlakyService::new();
    let client = ResilientAPIClient::with_transport(service.clone());

    let _ = client.submit(&sample_image()).await.unwrap_err();
    assert_eq!(client.call_state().phase, CallPhase::Failed);

    client.acknowledge();
    assert_eq!(client.call_state().phase, CallPhase::Idle);
    assert!(client.call_state().attempts.is_empty());

    service.push_predict(ok_reply());
    let result = client.submit(&sample_image()).await.unwrap();
    assert_eq!(result.status, "success");
}
