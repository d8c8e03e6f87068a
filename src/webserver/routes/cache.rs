/// Cache-aware panel data endpoints plus cache administration
///
/// - GET /api/cache/categories?serverUrl&username&password
/// - GET /api/cache/streams?serverUrl&username&password&categoryId
/// - DELETE /api/cache/{cacheKey}        (admin-gated)
/// - POST /api/cache/clean               (admin-gated)
///
/// Upstream unavailability is an expected operating state: it is
/// reported as HTTP 200 with `success: false` so callers can handle it
/// gracefully, never as a 5xx.
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    logger::{self, LogTag},
    upstream::{FetchOutcome, ALL_CATEGORIES},
    webserver::{
        middleware::admin_gate,
        state::AppState,
        utils::{error_response, success_response},
    },
};

const SECS_PER_DAY: u64 = 86_400;

/// Create cache routes; destructive endpoints go through the admin gate
pub fn routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let admin = Router::new()
        .route("/clean", post(clean_expired))
        .route("/:cache_key", delete(delete_entry))
        .layer(middleware::from_fn_with_state(state, admin_gate));

    Router::new()
        .route("/categories", get(get_categories))
        .route("/streams", get(get_streams))
        .merge(admin)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CategoriesQuery {
    server_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamsQuery {
    server_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    category_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchResponse {
    success: bool,
    data: Vec<Value>,
    api_endpoint: String,
    cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cached_at: Option<DateTime<Utc>>,
}

fn fetch_outcome_response(outcome: FetchOutcome) -> Response {
    match outcome {
        FetchOutcome::Success {
            records,
            endpoint,
            cached,
            cached_at,
        } => success_response(FetchResponse {
            success: true,
            data: records,
            api_endpoint: endpoint,
            cached,
            cached_at,
        }),
        // Expected degraded state, intentionally HTTP 200
        FetchOutcome::Unavailable { message } => success_response(json!({
            "success": false,
            "message": message,
        })),
    }
}

fn missing_parameter(name: &str) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        "MISSING_PARAMETER",
        &format!("Required query parameter '{}' is missing", name),
        None,
    )
}

/// GET /api/cache/categories
async fn get_categories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CategoriesQuery>,
) -> Response {
    let server_url = match query.server_url.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return missing_parameter("serverUrl"),
    };
    let username = match query.username.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return missing_parameter("username"),
    };
    let password = match query.password.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return missing_parameter("password"),
    };

    let outcome = state
        .orchestrator
        .get_categories(server_url, username, password)
        .await;

    fetch_outcome_response(outcome)
}

/// GET /api/cache/streams
async fn get_streams(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StreamsQuery>,
) -> Response {
    let server_url = match query.server_url.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return missing_parameter("serverUrl"),
    };
    let username = match query.username.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return missing_parameter("username"),
    };
    let password = match query.password.as_deref() {
        Some(v) if !v.is_empty() => v,
        _ => return missing_parameter("password"),
    };
    let category_id = query.category_id.as_deref().unwrap_or(ALL_CATEGORIES);

    let outcome = state
        .orchestrator
        .get_streams(server_url, username, password, category_id)
        .await;

    fetch_outcome_response(outcome)
}

/// DELETE /api/cache/{cacheKey}
///
/// Deletes one entry by its literal (URL-decoded) key
async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path(cache_key): Path<String>,
) -> Response {
    match state.store.delete(&cache_key) {
        Ok(true) => {
            logger::info(LogTag::Cache, &format!("Deleted cache entry {}", cache_key));
            success_response(json!({
                "success": true,
                "deleted": cache_key,
            }))
        }
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            &format!("No cache entry with key '{}'", cache_key),
            None,
        ),
        Err(e) => {
            logger::error(
                LogTag::Cache,
                &format!("Failed to delete cache entry {}: {}", cache_key, e),
            );
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                "Cache store operation failed",
                None,
            )
        }
    }
}

/// POST /api/cache/clean
///
/// Runs the housekeeping sweep and reports the deleted entry count
async fn clean_expired(State(state): State<Arc<AppState>>) -> Response {
    let max_age = Duration::from_secs(state.config.sweep_max_age_days.max(0) as u64 * SECS_PER_DAY);

    match state.store.sweep_expired(max_age) {
        Ok(deleted) => {
            logger::info(
                LogTag::Cache,
                &format!("Housekeeping sweep removed {} entries", deleted),
            );
            success_response(json!({
                "success": true,
                "deletedCount": deleted,
            }))
        }
        Err(e) => {
            logger::error(LogTag::Cache, &format!("Housekeeping sweep failed: {}", e));
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
                "Cache store operation failed",
                None,
            )
        }
    }
}
