use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. These are the ways to obtain one.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/{kind}/login
        // One endpoint per account kind: /api/student/login, /api/staff/login, /api/admin/login.
        .route("/api/{kind}/login", post(handlers::login))
        // GET /api/auth/refresh?refreshToken=...
        // No guard: the refresh token itself is the credential.
        .route("/api/auth/refresh", get(handlers::refresh))
}
