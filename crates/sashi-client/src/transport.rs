//! Raw HTTP reply shared by the client transports.

use bytes::Bytes;

/// Status and body of a completed HTTP exchange, before any
/// interpretation. Error statuses are replies, not errors, so the
/// caller decides what is retryable.
#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: u16,
    pub body: Bytes,
}

impl HttpReply {
    /// Human-readable message from an error body.
    ///
    /// The service reports errors as `{"status": "error", "message": ...}`;
    /// anything else falls back to a truncated body dump.
    pub fn error_message(&self) -> String {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            message: String,
        }
        if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(&self.body) {
            return parsed.message;
        }
        let text = String::from_utf8_lossy(&self.body);
        let mut message = text.trim().to_string();
        if message.len() > 200 {
            message.truncate(200);
            message.push_str("...");
        }
        if message.is_empty() {
            message = format!("HTTP {}", self.status);
        }
        message
    }
}
