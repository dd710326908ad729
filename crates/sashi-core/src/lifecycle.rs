//! Cache generation lifecycle.
//!
//! A controller owns one generation of the cache. Install pre-warms the new
//! STATIC namespace from the asset manifest (all-or-nothing); activation
//! swaps the live namespace pair, reclaims every superseded namespace, and
//! broadcasts a claim event so already-open sessions re-route through the
//! new generation without a reload.

use crate::config::{StaticManifest, StrategyConfig};
use crate::error::{Result, SashiError};
use crate::http::{Fetcher, HttpFetcher, Request, RequestIdentity, ResponseSnapshot};
use crate::store::{ActiveNamespaces, CacheNamespace, CacheStore, NamespaceRole};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{info, warn};
use url::Url;

/// Controller state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Pre-warming the new STATIC namespace.
    Installing,
    /// Install complete, waiting for activation.
    Waiting,
    /// This generation serves all traffic.
    Active,
    /// A manifest asset failed to pre-fetch; this generation can never
    /// activate and the previous one keeps serving.
    InstallFailed,
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecyclePhase::Installing => write!(f, "installing"),
            LifecyclePhase::Waiting => write!(f, "waiting"),
            LifecyclePhase::Active => write!(f, "active"),
            LifecyclePhase::InstallFailed => write!(f, "install_failed"),
        }
    }
}

/// Control messages from operational tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate a waiting generation immediately.
    Activate,
    /// Report the live namespace identifiers.
    QueryNamespaces,
}

/// Replies to control messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReply {
    Activated { generation: u32 },
    Namespaces { static_ns: String, dynamic_ns: String },
}

/// Broadcast to open sessions when a generation takes over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Activated { generation: u32 },
}

/// Manages install, activation, and takeover for one cache generation.
pub struct LifecycleController {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    base: Url,
    manifest: Vec<String>,
    generation: u32,
    auto_activate: bool,
    phase: RwLock<LifecyclePhase>,
    active: Arc<RwLock<ActiveNamespaces>>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl LifecycleController {
    /// Create a controller for `generation`. Until activation, the
    /// previous generation's namespaces keep serving.
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        base: Url,
        generation: u32,
    ) -> Self {
        let previous = generation.saturating_sub(1);
        let (events, _) = broadcast::channel(16);
        Self {
            store,
            fetcher,
            base,
            manifest: StaticManifest::ASSETS.iter().map(|s| s.to_string()).collect(),
            generation,
            auto_activate: false,
            phase: RwLock::new(LifecyclePhase::Installing),
            active: Arc::new(RwLock::new(ActiveNamespaces::for_generation(previous))),
            events,
        }
    }

    /// Controller with the default HTTP fetcher.
    pub fn with_http(store: Arc<dyn CacheStore>, base: Url, generation: u32) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::new(StrategyConfig::INSTALL_FETCH_TIMEOUT)?);
        Ok(Self::new(store, fetcher, base, generation))
    }

    /// Replace the asset manifest.
    pub fn with_manifest(mut self, paths: Vec<String>) -> Self {
        self.manifest = paths;
        self
    }

    /// Activate immediately after a successful install.
    pub fn with_auto_activate(mut self, auto: bool) -> Self {
        self.auto_activate = auto;
        self
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.read().unwrap()
    }

    /// Shared handle to the live namespace pair, for the strategy engine
    /// and the fallback generator.
    pub fn active_namespaces(&self) -> Arc<RwLock<ActiveNamespaces>> {
        self.active.clone()
    }

    /// Subscribe to takeover events.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Pre-warm the new STATIC namespace from the asset manifest.
    ///
    /// All-or-nothing: if any single asset fails to fetch, nothing is
    /// written, the phase becomes `InstallFailed`, and the previous
    /// generation continues serving.
    pub async fn install(&self) -> Result<()> {
        if self.phase() != LifecyclePhase::Installing {
            return Err(SashiError::InvalidPhase {
                phase: self.phase().to_string(),
                operation: "install".to_string(),
            });
        }

        let ns = CacheNamespace::new(NamespaceRole::Static, self.generation);
        info!(
            "Installing generation {}: pre-warming {} ({} assets)",
            self.generation,
            ns,
            self.manifest.len()
        );

        // Fetch everything before writing anything, so a partial install
        // never becomes visible.
        let mut fetched: Vec<(RequestIdentity, ResponseSnapshot)> = Vec::new();
        for path in &self.manifest {
            match self.fetch_asset(path).await {
                Ok((identity, snapshot)) => fetched.push((identity, snapshot)),
                Err(e) => {
                    *self.phase.write().unwrap() = LifecyclePhase::InstallFailed;
                    warn!("Install of generation {} failed: {}", self.generation, e);
                    return Err(e);
                }
            }
        }

        for (identity, snapshot) in &fetched {
            if let Err(e) = self.store.put(&ns, identity, snapshot) {
                *self.phase.write().unwrap() = LifecyclePhase::InstallFailed;
                // Drop whatever landed; the namespace is not current yet.
                let _ = self.store.delete_namespace(&ns.name());
                return Err(SashiError::InstallFailed {
                    asset: identity.url.clone(),
                    message: e.to_string(),
                });
            }
        }

        *self.phase.write().unwrap() = LifecyclePhase::Waiting;
        info!("Generation {} installed, waiting for activation", self.generation);

        if self.auto_activate {
            self.activate().await?;
        }
        Ok(())
    }

    /// Make this generation current: swap the live namespace pair, reclaim
    /// superseded namespaces, and claim open sessions.
    ///
    /// A namespace that fails to delete is logged and skipped; it does not
    /// block activation.
    pub async fn activate(&self) -> Result<()> {
        if self.phase() != LifecyclePhase::Waiting {
            return Err(SashiError::InvalidPhase {
                phase: self.phase().to_string(),
                operation: "activate".to_string(),
            });
        }

        let current = ActiveNamespaces::for_generation(self.generation);
        *self.active.write().unwrap() = current;

        match self.store.list_namespaces() {
            Ok(names) => {
                for name in names {
                    if current.is_current(&name) {
                        continue;
                    }
                    match self.store.delete_namespace(&name) {
                        Ok(()) => info!("Reclaimed superseded namespace {}", name),
                        Err(e) => warn!("Failed to reclaim namespace {}, skipping: {}", name, e),
                    }
                }
            }
            Err(e) => warn!("Could not enumerate namespaces for reclaim: {}", e),
        }

        *self.phase.write().unwrap() = LifecyclePhase::Active;
        let receivers = self
            .events
            .send(LifecycleEvent::Activated {
                generation: self.generation,
            })
            .unwrap_or(0);
        info!(
            "Generation {} active, claimed {} open sessions",
            self.generation, receivers
        );
        Ok(())
    }

    /// Handle a control message from operational tooling.
    pub async fn handle_message(&self, message: ControlMessage) -> Result<ControlReply> {
        match message {
            ControlMessage::Activate => {
                self.activate().await?;
                Ok(ControlReply::Activated {
                    generation: self.generation,
                })
            }
            ControlMessage::QueryNamespaces => {
                let active = *self.active.read().unwrap();
                Ok(ControlReply::Namespaces {
                    static_ns: active.static_ns.name(),
                    dynamic_ns: active.dynamic_ns.name(),
                })
            }
        }
    }

    async fn fetch_asset(&self, path: &str) -> Result<(RequestIdentity, ResponseSnapshot)> {
        let url = self.base.join(path).map_err(|e| SashiError::Config {
            message: format!("Invalid manifest path {}: {}", path, e),
        })?;
        let request = Request::get(url);
        let snapshot = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| SashiError::InstallFailed {
                asset: path.to_string(),
                message: e.to_string(),
            })?;
        if !snapshot.is_success() {
            return Err(SashiError::InstallFailed {
                asset: path.to_string(),
                message: format!("asset fetch returned {}", snapshot.status),
            });
        }
        Ok((request.identity(), snapshot))
    }
}
