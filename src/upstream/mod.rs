//! Fetch orchestrator for Xtream panel data
//!
//! Produces fresh category/stream data for a credential triple:
//! cache-first, falling back to an ordered probe of the candidate
//! endpoint paths a panel might expose its API under. Panels are
//! unreliable upstreams - they move between endpoint paths, return
//! inconsistent response shapes, and signal IP bans with a 200 body
//! containing "forbidden" rather than an HTTP status - so every
//! candidate response is validated before it wins.

pub mod client;
pub mod proxy;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cache::{CacheStore, Credentials, Resource};
use crate::logger::{self, LogTag};
use client::HttpClient;

/// Candidate endpoint suffixes, in priority order. Probed sequentially,
/// never in parallel: concurrent speculative requests against one panel
/// risk tripping its abuse detection.
pub const CANDIDATE_ENDPOINTS: [&str; 3] = ["/api.php", "/player_api.php", "/portal.php"];

/// Sentinel category id meaning "no category filter"
pub const ALL_CATEGORIES: &str = "all";

const ACTION_LIVE_CATEGORIES: &str = "get_live_categories";
const ACTION_LIVE_STREAMS: &str = "get_live_streams";

/// Result of a fetch request
///
/// `Unavailable` is an expected operating condition (panel down or
/// blocking this IP), not an error: route handlers map it to an HTTP
/// 200 with `success: false`.
#[derive(Debug)]
pub enum FetchOutcome {
    Success {
        records: Vec<Value>,
        endpoint: String,
        cached: bool,
        cached_at: Option<DateTime<Utc>>,
    },
    Unavailable {
        message: String,
    },
}

/// Cache-first fetcher with multi-endpoint upstream probing
pub struct FetchOrchestrator {
    http: HttpClient,
    store: CacheStore,
}

impl FetchOrchestrator {
    pub fn new(store: CacheStore, probe_timeout_secs: u64) -> Result<Self, String> {
        Ok(Self {
            http: HttpClient::new(probe_timeout_secs)?,
            store,
        })
    }

    /// Fetch the category list for a credential triple
    pub async fn get_categories(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
    ) -> FetchOutcome {
        let creds = Credentials::new(server_url, username, password);

        if let Some(hit) = self.store.lookup(&creds, &Resource::Categories) {
            logger::debug(
                LogTag::Upstream,
                &format!("Categories served from cache for {}", creds.server_url),
            );
            return FetchOutcome::Success {
                records: hit.records,
                endpoint: hit.api_endpoint,
                cached: true,
                cached_at: Some(hit.fetched_at),
            };
        }

        match self
            .probe_endpoints(&creds, ACTION_LIVE_CATEGORIES, None)
            .await
        {
            Some((endpoint, records)) => {
                self.persist(&creds, &Resource::Categories, &records, &endpoint);
                FetchOutcome::Success {
                    records,
                    endpoint,
                    cached: false,
                    cached_at: None,
                }
            }
            None => FetchOutcome::Unavailable {
                message: "Upstream panel did not return usable category data on any known endpoint"
                    .to_string(),
            },
        }
    }

    /// Fetch the stream list for one category (or "all").
    ///
    /// Tries the cache-recorded endpoint as a single-request fast path
    /// before falling back to the full ordered probe.
    pub async fn get_streams(
        &self,
        server_url: &str,
        username: &str,
        password: &str,
        category_id: &str,
    ) -> FetchOutcome {
        let creds = Credentials::new(server_url, username, password);
        let resource = Resource::Streams {
            category_id: category_id.to_string(),
        };
        let category_filter = if category_id == ALL_CATEGORIES {
            None
        } else {
            Some(category_id)
        };

        if let Some(hit) = self.store.lookup(&creds, &resource) {
            logger::debug(
                LogTag::Upstream,
                &format!(
                    "Streams ({}) served from cache for {}",
                    category_id, creds.server_url
                ),
            );
            return FetchOutcome::Success {
                records: hit.records,
                endpoint: hit.api_endpoint,
                cached: true,
                cached_at: Some(hit.fetched_at),
            };
        }

        // Fast path: one request against the endpoint that answered last
        // time. The hint is advisory - on failure the full probe runs.
        if let Some(hint) = self.store.endpoint_hint(&creds) {
            if let Some(records) = self
                .try_candidate(&creds, &hint, ACTION_LIVE_STREAMS, category_filter)
                .await
            {
                self.persist(&creds, &resource, &records, &hint);
                return FetchOutcome::Success {
                    records,
                    endpoint: hint,
                    cached: false,
                    cached_at: None,
                };
            }
            logger::debug(
                LogTag::Upstream,
                &format!("Recorded endpoint {} failed, running full probe", hint),
            );
        }

        match self
            .probe_endpoints(&creds, ACTION_LIVE_STREAMS, category_filter)
            .await
        {
            Some((endpoint, records)) => {
                self.persist(&creds, &resource, &records, &endpoint);
                FetchOutcome::Success {
                    records,
                    endpoint,
                    cached: false,
                    cached_at: None,
                }
            }
            None => FetchOutcome::Unavailable {
                message: "Upstream panel did not return usable stream data on any known endpoint"
                    .to_string(),
            },
        }
    }

    /// Walk the candidate list in order; first usable response wins
    async fn probe_endpoints(
        &self,
        creds: &Credentials,
        action: &str,
        category_id: Option<&str>,
    ) -> Option<(String, Vec<Value>)> {
        for suffix in CANDIDATE_ENDPOINTS {
            if let Some(records) = self.try_candidate(creds, suffix, action, category_id).await {
                logger::debug(
                    LogTag::Upstream,
                    &format!(
                        "Endpoint {} answered with {} records (action={})",
                        suffix,
                        records.len(),
                        action
                    ),
                );
                return Some((suffix.to_string(), records));
            }
        }

        logger::warning(
            LogTag::Upstream,
            &format!(
                "No usable endpoint on {} (action={})",
                creds.server_url, action
            ),
        );
        None
    }

    /// Issue one GET against one candidate and validate the response.
    ///
    /// Every transport failure (timeout, refused connection, malformed
    /// body) is swallowed here so probing continues with the next
    /// candidate.
    async fn try_candidate(
        &self,
        creds: &Credentials,
        suffix: &str,
        action: &str,
        category_id: Option<&str>,
    ) -> Option<Vec<Value>> {
        let url = format!("{}{}", creds.server_url, suffix);

        let mut request = self.http.client().get(&url).query(&[
            ("username", creds.username.as_str()),
            ("password", creds.password.as_str()),
            ("action", action),
        ]);
        if let Some(category) = category_id {
            request = request.query(&[("category_id", category)]);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                logger::debug(
                    LogTag::Upstream,
                    &format!("Endpoint {} not reachable: {}", suffix, e),
                );
                return None;
            }
        };

        if response.status().as_u16() != 200 {
            logger::debug(
                LogTag::Upstream,
                &format!("Endpoint {} returned HTTP {}", suffix, response.status()),
            );
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                logger::debug(
                    LogTag::Upstream,
                    &format!("Endpoint {} body read failed: {}", suffix, e),
                );
                return None;
            }
        };

        normalize_payload(&body)
    }

    /// Persist a successful fetch. Store failures are logged and
    /// swallowed: data delivery takes priority over cache-write success.
    fn persist(&self, creds: &Credentials, resource: &Resource, records: &[Value], endpoint: &str) {
        if let Err(e) = self.store.store(creds, resource, records, endpoint) {
            logger::warning(
                LogTag::Cache,
                &format!("Failed to persist fetch result for {}: {}", creds.server_url, e),
            );
        }
    }
}

/// Validate and normalize one candidate response body.
///
/// Usable iff the body is longer than 2 chars (panels return short
/// garbage strings on error rather than "[]"), parses as JSON (one
/// level of string re-parse allowed for double-encoded bodies), does
/// not contain "forbidden" anywhere in serialized form (panels signal
/// IP bans this way, not via HTTP status), and is either a non-empty
/// array or an object whose `result` field is a non-empty array.
fn normalize_payload(body: &str) -> Option<Vec<Value>> {
    let trimmed = body.trim();
    if trimmed.len() <= 2 {
        return None;
    }

    let payload: Value = serde_json::from_str(trimmed).ok()?;

    // Some panels double-encode the JSON body as a string
    let payload = match payload {
        Value::String(inner) => serde_json::from_str(&inner).ok()?,
        other => other,
    };

    if payload.to_string().to_lowercase().contains("forbidden") {
        return None;
    }

    match payload {
        Value::Array(records) if !records.is_empty() => Some(records),
        Value::Object(mut map) => match map.remove("result") {
            Some(Value::Array(records)) if !records.is_empty() => Some(records),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_payload_rejects_short_bodies() {
        assert!(normalize_payload("").is_none());
        assert!(normalize_payload("[]").is_none());
        assert!(normalize_payload("0").is_none());
        assert!(normalize_payload("  \n").is_none());
    }

    #[test]
    fn test_payload_rejects_non_json() {
        assert!(normalize_payload("IP Forbidden").is_none());
        assert!(normalize_payload("<html>error</html>").is_none());
    }

    #[test]
    fn test_payload_rejects_forbidden_markers() {
        assert!(normalize_payload(r#"["Forbidden"]"#).is_none());
        assert!(normalize_payload(r#"{"result": [{"msg": "IP FORBIDDEN"}]}"#).is_none());
        assert!(normalize_payload(r#""forbidden""#).is_none());
    }

    #[test]
    fn test_payload_rejects_empty_collections() {
        assert!(normalize_payload(r#"[ ]"#).is_none());
        assert!(normalize_payload(r#"{"result": []}"#).is_none());
        assert!(normalize_payload(r#"{"status": "ok"}"#).is_none());
        assert!(normalize_payload(r#""just a string""#).is_none());
    }

    #[test]
    fn test_payload_accepts_plain_array() {
        let records = normalize_payload(r#"[{"category_id": "1"}]"#).unwrap();
        assert_eq!(records, vec![json!({"category_id": "1"})]);
    }

    #[test]
    fn test_payload_accepts_result_wrapper() {
        let records = normalize_payload(r#"{"result": [{"stream_id": 5}]}"#).unwrap();
        assert_eq!(records, vec![json!({"stream_id": 5})]);
    }

    #[test]
    fn test_payload_accepts_double_encoded_body() {
        let records = normalize_payload(r#""[{\"category_id\": \"1\"}]""#).unwrap();
        assert_eq!(records, vec![json!({"category_id": "1"})]);
    }

    // ------------------------------------------------------------------
    // Probe behavior against a fake panel
    // ------------------------------------------------------------------

    /// Minimal HTTP server mapping endpoint paths to canned responses.
    /// Counts requests so tests can assert that cache hits stay local.
    async fn spawn_panel(
        responses: HashMap<&'static str, (u16, &'static str)>,
        hits: Arc<AtomicUsize>,
    ) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                hits.fetch_add(1, Ordering::SeqCst);

                let mut buf = [0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();

                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or("/")
                    .split('?')
                    .next()
                    .unwrap_or("/")
                    .to_string();

                let (status, body) = responses
                    .get(path.as_str())
                    .copied()
                    .unwrap_or((404, "not found"));

                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
            }
        });

        format!("http://{}", addr)
    }

    fn test_orchestrator() -> FetchOrchestrator {
        let store = CacheStore::open(":memory:", Duration::from_secs(300)).unwrap();
        FetchOrchestrator::new(store, 5).unwrap()
    }

    #[tokio::test]
    async fn test_probe_skips_forbidden_and_empty_candidates() {
        let mut responses = HashMap::new();
        responses.insert("/api.php", (200, "IP Forbidden"));
        responses.insert("/player_api.php", (200, "[]"));
        responses.insert("/portal.php", (200, r#"[{"category_id": "1"}]"#));

        let orchestrator = test_orchestrator();
        let base = spawn_panel(responses, Arc::new(AtomicUsize::new(0))).await;

        match orchestrator.get_categories(&base, "u", "p").await {
            FetchOutcome::Success {
                endpoint,
                records,
                cached,
                ..
            } => {
                assert_eq!(endpoint, "/portal.php");
                assert_eq!(records, vec![json!({"category_id": "1"})]);
                assert!(!cached);
            }
            FetchOutcome::Unavailable { message } => panic!("unexpected failure: {}", message),
        }

        // The winning endpoint is what got persisted
        let creds = Credentials::new(&base, "u", "p");
        assert_eq!(
            orchestrator.store.endpoint_hint(&creds),
            Some("/portal.php".to_string())
        );
    }

    #[tokio::test]
    async fn test_all_candidates_down_reports_unavailable() {
        let mut responses = HashMap::new();
        responses.insert("/api.php", (500, "server error"));
        responses.insert("/player_api.php", (503, "down"));
        responses.insert("/portal.php", (404, "gone"));

        let orchestrator = test_orchestrator();
        let base = spawn_panel(responses, Arc::new(AtomicUsize::new(0))).await;

        match orchestrator.get_categories(&base, "u", "p").await {
            FetchOutcome::Unavailable { message } => {
                assert!(!message.is_empty());
            }
            FetchOutcome::Success { .. } => panic!("expected unavailable"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_upstream_reports_unavailable() {
        let orchestrator = test_orchestrator();

        // Bind then drop a listener so the port is closed
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        match orchestrator.get_categories(&base, "u", "p").await {
            FetchOutcome::Unavailable { .. } => {}
            FetchOutcome::Success { .. } => panic!("expected unavailable"),
        }
    }

    #[tokio::test]
    async fn test_second_streams_call_served_from_cache() {
        let mut responses = HashMap::new();
        responses.insert("/api.php", (200, r#"[{"stream_id": 1, "name": "News HD"}]"#));

        let hits = Arc::new(AtomicUsize::new(0));
        let orchestrator = test_orchestrator();
        let base = spawn_panel(responses, hits.clone()).await;

        // Trailing slash on purpose: normalization must make both calls
        // resolve to the same cache entry
        let slashed = format!("{}/", base);

        match orchestrator.get_streams(&slashed, "u", "p", "news").await {
            FetchOutcome::Success { cached, .. } => assert!(!cached),
            FetchOutcome::Unavailable { message } => panic!("unexpected failure: {}", message),
        }
        let outbound_after_first = hits.load(Ordering::SeqCst);
        assert!(outbound_after_first >= 1);

        match orchestrator.get_streams(&slashed, "u", "p", "news").await {
            FetchOutcome::Success {
                cached, cached_at, ..
            } => {
                assert!(cached);
                assert!(cached_at.is_some());
            }
            FetchOutcome::Unavailable { message } => panic!("unexpected failure: {}", message),
        }

        // No additional outbound request on the cached call
        assert_eq!(hits.load(Ordering::SeqCst), outbound_after_first);
    }

    #[tokio::test]
    async fn test_streams_fast_path_uses_recorded_endpoint() {
        // Panel only answers on /portal.php; the first categories fetch
        // records it, so the streams fetch should land there in one
        // request instead of walking /api.php and /player_api.php first.
        let mut responses = HashMap::new();
        responses.insert("/portal.php", (200, r#"[{"stream_id": 2}]"#));

        let hits = Arc::new(AtomicUsize::new(0));
        let orchestrator = test_orchestrator();
        let base = spawn_panel(responses, hits.clone()).await;

        match orchestrator.get_categories(&base, "u", "p").await {
            FetchOutcome::Success { endpoint, .. } => assert_eq!(endpoint, "/portal.php"),
            FetchOutcome::Unavailable { message } => panic!("unexpected failure: {}", message),
        }
        let after_categories = hits.load(Ordering::SeqCst);

        match orchestrator.get_streams(&base, "u", "p", "all").await {
            FetchOutcome::Success { endpoint, .. } => assert_eq!(endpoint, "/portal.php"),
            FetchOutcome::Unavailable { message } => panic!("unexpected failure: {}", message),
        }

        // Exactly one extra upstream request (the fast path)
        assert_eq!(hits.load(Ordering::SeqCst), after_categories + 1);
    }
}
