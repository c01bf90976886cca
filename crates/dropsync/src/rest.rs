//! reqwest-backed [`PageFetcher`] for JSON order endpoints.
//!
//! Speaks to endpoints of the shape
//! `GET {base}/shops/{shop}/orders?limit=N[&cursor=...][&since_id=...]`
//! returning `{"orders": [...], "next_cursor": ..., "has_more": ...}`.
//! HTTP outcomes are mapped onto the [`RemoteError`] taxonomy here; pacing
//! and retries stay with the scheduler.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::remote::{OrderPage, PageFetcher, PageRequest, RemoteError, RemoteOrder};

/// Default number of orders requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Page fetcher for a REST order endpoint.
#[derive(Clone)]
pub struct RestPageFetcher {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    #[serde(default)]
    orders: Vec<serde_json::Value>,
    #[serde(default)]
    next_cursor: Option<String>,
    #[serde(default)]
    has_more: bool,
}

impl RestPageFetcher {
    /// Create a fetcher for `base_url`, optionally authenticating with a
    /// bearer token.
    pub fn new(base_url: impl Into<String>, access_token: Option<String>) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::permanent(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    /// Override the page size requested from the remote.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn orders_url(&self, shop: &str) -> String {
        format!("{}/shops/{}/orders", self.base_url, shop)
    }
}

#[async_trait]
impl PageFetcher for RestPageFetcher {
    async fn fetch_page(&self, shop: &str, request: PageRequest) -> Result<OrderPage, RemoteError> {
        let mut query: Vec<(&str, String)> = vec![("limit", self.page_size.to_string())];
        if let Some(cursor) = &request.cursor {
            query.push(("cursor", cursor.clone()));
        }
        if let Some(newer_than) = request.newer_than {
            query.push(("since_id", newer_than.to_string()));
        }

        let mut builder = self.client.get(self.orders_url(shop)).query(&query);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::transient(format!("request failed: {e}")))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            return Err(RemoteError::rate_limited(retry_after));
        }
        if status.is_server_error() {
            return Err(RemoteError::transient(format!(
                "server error: {status}"
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::permanent(format!(
                "unexpected status {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: OrdersResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::permanent(format!("malformed order page: {e}")))?;

        let records = body
            .orders
            .iter()
            .map(order_from_value)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(OrderPage {
            records,
            next_cursor: body.next_cursor,
            has_more: body.has_more,
        })
    }
}

/// Parse a `Retry-After` header value given in seconds. HTTP-date forms
/// are rare on this API and fall back to the scheduler's own backoff.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Extract the identity fields from a raw order object, keeping the whole
/// object as the opaque payload.
fn order_from_value(value: &serde_json::Value) -> Result<RemoteOrder, RemoteError> {
    let id = value
        .get("id")
        .and_then(serde_json::Value::as_i64)
        .ok_or_else(|| RemoteError::permanent("order payload missing numeric id"))?;

    let created_at = value
        .get("created_at")
        .and_then(serde_json::Value::as_str)
        .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&chrono::Utc));

    Ok(RemoteOrder {
        id,
        created_at,
        payload: value.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("7"), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after(" 30 "), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn order_from_value_extracts_identity_and_keeps_payload() {
        let raw = serde_json::json!({
            "id": 1001,
            "created_at": "2026-05-01T12:00:00Z",
            "line_items": [{"sku": "DROP-1"}]
        });

        let order = order_from_value(&raw).expect("valid order");
        assert_eq!(order.id, 1001);
        assert!(order.created_at.is_some());
        assert_eq!(order.payload["line_items"][0]["sku"], "DROP-1");
    }

    #[test]
    fn order_from_value_rejects_missing_id() {
        let raw = serde_json::json!({ "created_at": "2026-05-01T12:00:00Z" });
        let err = order_from_value(&raw).expect_err("missing id should fail");
        assert!(matches!(err, RemoteError::Permanent { .. }));
    }

    #[test]
    fn orders_url_joins_cleanly() {
        let fetcher = RestPageFetcher::new("https://api.example.com/", None).expect("fetcher");
        assert_eq!(
            fetcher.orders_url("shop.example"),
            "https://api.example.com/shops/shop.example/orders"
        );
    }

    #[tokio::test]
    async fn fetch_page_parses_a_live_response() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .expect("set_read_timeout");

            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];
            loop {
                match stream.read(&mut tmp) {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&tmp[..n]);
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }

            let request = String::from_utf8_lossy(&buf);
            assert!(
                request.contains("/shops/shop.example/orders"),
                "unexpected request: {request:?}"
            );
            assert!(request.contains("since_id=11"), "expected since_id");

            let body = serde_json::json!({
                "orders": [
                    {"id": 12, "created_at": "2026-05-02T09:00:00Z"},
                    {"id": 13}
                ],
                "next_cursor": "c-next",
                "has_more": true
            })
            .to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).expect("write");
            stream.flush().ok();
        });

        let fetcher =
            RestPageFetcher::new(format!("http://{addr}"), Some("token-1".to_string()))
                .expect("fetcher");
        let page = fetcher
            .fetch_page(
                "shop.example",
                PageRequest {
                    cursor: None,
                    newer_than: Some(11),
                },
            )
            .await
            .expect("fetch should succeed");

        assert_eq!(page.records.len(), 2);
        assert_eq!(page.records[0].id, 12);
        assert_eq!(page.next_cursor.as_deref(), Some("c-next"));
        assert!(page.has_more);

        server.join().expect("server thread");
    }

    #[tokio::test]
    async fn fetch_page_maps_server_errors_to_transient() {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().expect("accept");
            stream
                .set_read_timeout(Some(Duration::from_secs(2)))
                .expect("set_read_timeout");

            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];
            loop {
                match stream.read(&mut tmp) {
                    Ok(0) => break,
                    Ok(n) => {
                        buf.extend_from_slice(&tmp[..n]);
                        if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }

            stream
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .expect("write");
        });

        let fetcher = RestPageFetcher::new(format!("http://{addr}"), None).expect("fetcher");
        let err = fetcher
            .fetch_page("shop.example", PageRequest::default())
            .await
            .expect_err("503 should fail");

        assert!(matches!(err, RemoteError::Transient { .. }));
        assert!(err.is_retryable());

        server.join().expect("server thread");
    }
}
