use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Authenticated Router Module
///
/// Endpoints that act on the caller's own account. Handlers take the
/// `Identity` extractor, which only resolves behind the access guard layer
/// applied to this router in `create_router`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // PUT /api/auth/reset-password
        // Changes the caller's password; the old password must match.
        .route("/api/auth/reset-password", put(handlers::reset_password))
        // GET /api/auth/me
        // Echoes the identity installed by the guard.
        .route("/api/auth/me", get(handlers::get_me))
}
