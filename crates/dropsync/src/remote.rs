//! Remote commerce API boundary.
//!
//! The sync engine never talks to the wire directly: it is handed a
//! [`PageFetcher`] and treats "fetch one page" as an opaque operation. The
//! pagination cursor is a token minted by the remote service and passed
//! back verbatim on the next request; its structure is never interpreted.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced by the remote API.
///
/// The scheduler retries [`RemoteError::RateLimited`] and
/// [`RemoteError::Transient`] up to its budget; [`RemoteError::Permanent`]
/// propagates to the caller immediately.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote service rejected the call for exceeding its rate limit.
    #[error("remote API rate limit hit")]
    RateLimited {
        /// Server-suggested wait before retrying, when the response
        /// carried one. Honored exactly by the scheduler.
        retry_after: Option<Duration>,
    },

    /// A server-side transient failure (5xx, dropped connection).
    #[error("transient remote failure: {message}")]
    Transient { message: String },

    /// Any other remote failure. Not retried.
    #[error("remote API error: {message}")]
    Permanent { message: String },
}

impl RemoteError {
    /// Create a rate limit error, optionally carrying the server's
    /// suggested wait.
    #[inline]
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        Self::RateLimited { retry_after }
    }

    /// Create a transient error.
    #[inline]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create a permanent error.
    #[inline]
    pub fn permanent(message: impl Into<String>) -> Self {
        Self::Permanent {
            message: message.into(),
        }
    }

    /// Whether the scheduler should retry this failure.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transient { .. })
    }
}

/// One order as delivered by the remote API.
///
/// The payload is opaque to the engine; only the stable remote identifier
/// is interpreted, as the idempotency key and the incremental anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOrder {
    /// Stable identifier assigned by the remote API. Monotonically
    /// increasing for newer orders.
    pub id: i64,
    /// When the order was created remotely, if reported.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Full remote payload, stored verbatim.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Parameters for one page request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    /// Continuation cursor from the previous page's response, passed back
    /// verbatim. `None` requests the first page of a walk.
    pub cursor: Option<String>,
    /// Lower bound for an incremental walk: only orders newer than this
    /// identifier. Only meaningful on a cursorless request.
    pub newer_than: Option<i64>,
}

/// One page of the remote collection.
#[derive(Debug, Clone, Default)]
pub struct OrderPage {
    /// Orders on this page, in remote order.
    pub records: Vec<RemoteOrder>,
    /// Cursor for the next page. Must be present when `has_more` is true.
    pub next_cursor: Option<String>,
    /// Whether the remote collection has further pages.
    pub has_more: bool,
}

/// The injected "fetch one page" operation.
///
/// Implementations own authentication and transport; the engine owns
/// pacing (through the scheduler), retries, and persistence.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch a single page of orders for `shop`.
    async fn fetch_page(&self, shop: &str, request: PageRequest) -> Result<OrderPage, RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_and_transient_are_retryable() {
        assert!(RemoteError::rate_limited(None).is_retryable());
        assert!(RemoteError::rate_limited(Some(Duration::from_secs(3))).is_retryable());
        assert!(RemoteError::transient("503 Service Unavailable").is_retryable());
    }

    #[test]
    fn permanent_is_not_retryable() {
        assert!(!RemoteError::permanent("401 Unauthorized").is_retryable());
    }

    #[test]
    fn error_display_includes_message() {
        let err = RemoteError::permanent("404 Not Found");
        assert!(err.to_string().contains("404 Not Found"));

        let err = RemoteError::transient("connection reset");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn page_request_default_is_first_page() {
        let request = PageRequest::default();
        assert!(request.cursor.is_none());
        assert!(request.newer_than.is_none());
    }

    #[test]
    fn remote_order_deserializes_with_missing_optionals() {
        let order: RemoteOrder = serde_json::from_str(r#"{"id": 42}"#).unwrap();
        assert_eq!(order.id, 42);
        assert!(order.created_at.is_none());
        assert!(order.payload.is_null());
    }
}
