//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::warn;

use crate::web::auth::session_id_from_headers;
use crate::web::state::AppState;

/// Middleware that validates the auth session cookie and extracts the user_id.
///
/// If valid, inserts the user_id into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized. Identity is derived only
/// from this trusted session context, never from a request parameter.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, axum::http::StatusCode> {
    let auth_session_id = session_id_from_headers(req.headers())
        .ok_or(axum::http::StatusCode::UNAUTHORIZED)?
        .to_string();

    let user_id = state
        .identity
        .validate_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            warn!("Rejected session cookie: {:?}", e);
            axum::http::StatusCode::UNAUTHORIZED
        })?;

    req.extensions_mut().insert(user_id);
    Ok(next.run(req).await)
}
