/// JSON response helpers shared by all route handlers
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// 200 response with the value serialized as-is
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// Structured error response
pub fn error_response(
    status: StatusCode,
    code: &str,
    message: &str,
    hint: Option<&str>,
) -> Response {
    let body = json!({
        "success": false,
        "error": {
            "code": code,
            "message": message,
            "hint": hint,
        }
    });
    (status, Json(body)).into_response()
}
