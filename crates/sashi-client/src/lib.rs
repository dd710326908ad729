//! Sashi Client - resilient prediction calls and background sync.
//!
//! Companion crate to `sashi-core`: where core routes cacheable traffic,
//! this crate owns the two endpoints that are never cached. Predictions go
//! through [`ResilientAPIClient`] (per-attempt timeout, bounded retry,
//! single-flight), and the health endpoint backs the
//! [`BackgroundSyncCoordinator`]'s reconnect verification.
//!
//! # Example
//!
//! ```rust,ignore
//! use sashi_client::{ImagePayload, ResilientAPIClient};
//!
//! #[tokio::main]
//! async fn main() -> sashi_core::Result<()> {
//!     let client = ResilientAPIClient::new(None)?;
//!     let image = ImagePayload::jpeg("cut.jpg", std::fs::read("cut.jpg")?);
//!     let result = client.submit(&image).await?;
//!     println!("{:?} ({:.1}%)", result.prediction, result.confidence * 100.0);
//!     Ok(())
//! }
//! ```

pub mod health;
pub mod predict;
pub mod sync;
pub mod transport;

// Re-export commonly used types
pub use health::{HealthStatus, HealthTransport, ModelInfo, ReqwestHealthTransport};
pub use predict::{
    AttemptOutcome, CallAttempt, CallPhase, ImagePayload, Prediction, PredictionCallState,
    PredictionResult, PredictTransport, ReqwestPredictTransport, ResilientAPIClient, RetryPolicy,
};
pub use sync::{BackgroundSyncCoordinator, ConnectivityState, SyncEvent};
pub use transport::HttpReply;
