/// Raw proxy endpoint
///
/// GET /api/proxy?url=... fetches the given URL verbatim and relays
/// status, content type and body. Unauthenticated passthrough without a
/// host allowlist - replicated behavior, flagged in DESIGN.md.
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    logger::{self, LogTag},
    webserver::{state::AppState, utils::error_response},
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(proxy_request))
}

#[derive(Debug, Deserialize)]
struct ProxyQuery {
    url: Option<String>,
}

/// GET /api/proxy
async fn proxy_request(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProxyQuery>,
) -> Response {
    let url = match query.url.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "MISSING_PARAMETER",
                "Required query parameter 'url' is missing",
                None,
            )
        }
    };

    match state.proxy.fetch(url).await {
        Ok(upstream) => {
            let status =
                StatusCode::from_u16(upstream.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let content_type = upstream
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string());

            (status, [(header::CONTENT_TYPE, content_type)], upstream.body).into_response()
        }
        Err(e) => {
            logger::warning(LogTag::Proxy, &format!("Proxy fetch failed: {}", e));
            error_response(
                StatusCode::BAD_GATEWAY,
                "UPSTREAM_UNREACHABLE",
                &format!("Upstream request failed: {}", e),
                None,
            )
        }
    }
}
