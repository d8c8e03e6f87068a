/// Webserver middleware
///
/// Bearer-token gate for the administrative endpoints (entry deletion,
/// housekeeping sweep). Principal resolution is a seam: the gate asks
/// `resolve_principal` for a principal/role and only checks the role,
/// so a real identity provider can replace the token comparison without
/// touching the gate.
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::{
    logger::{self, LogTag},
    webserver::{state::AppState, utils},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Admin,
}

/// Resolved caller identity
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub role: Role,
}

/// Resolve a bearer credential to a principal.
///
/// Current implementation: compare against the configured admin token.
pub fn resolve_principal(state: &AppState, token: &str) -> Option<Principal> {
    match state.config.admin_token.as_deref() {
        Some(admin_token) if admin_token == token => Some(Principal {
            user_id: "admin".to_string(),
            role: Role::Admin,
        }),
        _ => None,
    }
}

/// Admin gate middleware
///
/// When no admin token is configured the gate is disabled and all
/// requests pass. Otherwise the request must carry
/// `Authorization: Bearer <token>` resolving to an admin principal.
pub async fn admin_gate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if state.config.admin_token.is_none() {
        return next.run(request).await;
    }

    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(t) => match resolve_principal(&state, t) {
            Some(principal) if principal.role == Role::Admin => next.run(request).await,
            _ => {
                logger::warning(
                    LogTag::Webserver,
                    &format!(
                        "Blocked request to {} - invalid admin credential",
                        request.uri().path()
                    ),
                );
                utils::error_response(
                    StatusCode::FORBIDDEN,
                    "INVALID_TOKEN",
                    "Invalid admin credential",
                    None,
                )
            }
        },
        None => {
            logger::warning(
                LogTag::Webserver,
                &format!(
                    "Blocked request to {} - missing admin credential",
                    request.uri().path()
                ),
            );
            utils::error_response(
                StatusCode::FORBIDDEN,
                "MISSING_TOKEN",
                "Admin credential required",
                Some("Send Authorization: Bearer <token>"),
            )
        }
    }
}
