//! Background sync coordination.
//!
//! When connectivity returns, the coordinator verifies the service is
//! actually ready (reachable and with its model loaded) before announcing
//! a completed sync to subscribers. A reachable-but-degraded service does
//! not count as a sync.

use crate::health::HealthTransport;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Last observed connectivity, as seen by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Unknown = 0,
    Online = 1,
    Offline = 2,
}

/// Lock-free holder for [`ConnectivityState`].
struct AtomicConnectivity(AtomicU8);

impl AtomicConnectivity {
    fn new() -> Self {
        Self(AtomicU8::new(ConnectivityState::Unknown as u8))
    }

    fn load(&self) -> ConnectivityState {
        match self.0.load(Ordering::SeqCst) {
            1 => ConnectivityState::Online,
            2 => ConnectivityState::Offline,
            _ => ConnectivityState::Unknown,
        }
    }

    fn store(&self, state: ConnectivityState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Broadcast to subscribers after a verified reconnect.
#[derive(Debug, Clone)]
pub struct SyncEvent {
    pub completed_at: DateTime<Utc>,
}

/// Verifies service readiness on reconnect and fans the result out.
pub struct BackgroundSyncCoordinator {
    health: Arc<dyn HealthTransport>,
    events: broadcast::Sender<SyncEvent>,
    connectivity: AtomicConnectivity,
}

impl BackgroundSyncCoordinator {
    pub fn new(health: Arc<dyn HealthTransport>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            health,
            events,
            connectivity: AtomicConnectivity::new(),
        }
    }

    /// Subscribe to sync-completed events. Safe to call before or after
    /// reconnects; each subscriber only sees events from after it joined.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn connectivity(&self) -> ConnectivityState {
        self.connectivity.load()
    }

    /// Record a connectivity loss, e.g. after a transport failure.
    pub fn notice_offline(&self) {
        self.connectivity.store(ConnectivityState::Offline);
    }

    /// Handle a reconnect signal: probe the service and, if it is healthy,
    /// broadcast a [`SyncEvent`]. Returns whether the sync completed.
    pub async fn on_reconnect(&self) -> bool {
        match self.health.probe().await {
            Ok(health) if health.is_healthy() => {
                self.connectivity.store(ConnectivityState::Online);
                let event = SyncEvent {
                    completed_at: Utc::now(),
                };
                // Zero subscribers is fine; the state update alone is useful.
                let _ = self.events.send(event);
                info!("Reconnect sync completed, service healthy");
                true
            }
            Ok(health) => {
                self.connectivity.store(ConnectivityState::Online);
                warn!(
                    "Service reachable but not ready (status {:?}, model_loaded {})",
                    health.status, health.model_loaded
                );
                false
            }
            Err(e) => {
                self.connectivity.store(ConnectivityState::Offline);
                warn!("Reconnect probe failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthStatus;
    use async_trait::async_trait;
    use sashi_core::{Result, SashiError};
    use std::sync::Mutex;

    struct ScriptedHealth {
        replies: Mutex<Vec<Result<HealthStatus>>>,
    }

    impl ScriptedHealth {
        fn new(mut replies: Vec<Result<HealthStatus>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
            })
        }
    }

    #[async_trait]
    impl HealthTransport for ScriptedHealth {
        async fn probe(&self) -> Result<HealthStatus> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(SashiError::Busy))
        }
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

    fn unloaded() -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            model_loaded: false,
            timestamp: String::new(),
            version: None,
            model_info: None,
        })
    }

    fn unreachable() -> Result<HealthStatus> {
        Err(SashiError::Transport {
            message: "connection refused".into(),
            cause: None,
        })
    }

    #[tokio::test]
    async fn test_reconnect_broadcasts_when_healthy() {
        let coordinator = BackgroundSyncCoordinator::new(ScriptedHealth::new(vec![healthy()]));
        let mut events = coordinator.subscribe();

        assert!(coordinator.on_reconnect().await);
        assert_eq!(coordinator.connectivity(), ConnectivityState::Online);
        assert!(events.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_degraded_service_does_not_broadcast() {
        let coordinator = BackgroundSyncCoordinator::new(ScriptedHealth::new(vec![unloaded()]));
        let mut events = coordinator.subscribe();

        assert!(!coordinator.on_reconnect().await);
        // Reachable, so connectivity is online even without a sync.
        assert_eq!(coordinator.connectivity(), ConnectivityState::Online);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_probe_marks_offline() {
        let coordinator =
            BackgroundSyncCoordinator::new(ScriptedHealth::new(vec![unreachable()]));
        let mut events = coordinator.subscribe();

        assert!(!coordinator.on_reconnect().await);
        assert_eq!(coordinator.connectivity(), ConnectivityState::Offline);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recovers_after_offline() {
        let coordinator = BackgroundSyncCoordinator::new(ScriptedHealth::new(vec![
            unreachable(),
            healthy(),
        ]));

        assert!(!coordinator.on_reconnect().await);
        assert_eq!(coordinator.connectivity(), ConnectivityState::Offline);

        assert!(coordinator.on_reconnect().await);
        assert_eq!(coordinator.connectivity(), ConnectivityState::Online);
    }

    #[tokio::test]
    async fn test_notice_offline() {
        let coordinator = BackgroundSyncCoordinator::new(ScriptedHealth::new(vec![]));
        assert_eq!(coordinator.connectivity(), ConnectivityState::Unknown);
        coordinator.notice_offline();
        assert_eq!(coordinator.connectivity(), ConnectivityState::Offline);
    }
}
