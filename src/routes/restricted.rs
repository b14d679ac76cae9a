//! Kind-Restricted Router Module
//!
//! Endpoints reserved for a single account kind. Each router here is wrapped
//! in its own `RoleGuard` in `create_router`; a token of any other kind is
//! rejected with 403 before the handler runs.

use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Student-only routes.
pub fn student_routes() -> Router<AppState> {
    Router::new()
        // GET /api/student/detail
        // The signed-in student's own account.
        .route("/api/student/detail", get(handlers::get_detail))
}

/// Staff-only routes.
pub fn staff_routes() -> Router<AppState> {
    Router::new()
        // GET /api/staff/detail
        // The signed-in staff member's own account.
        .route("/api/staff/detail", get(handlers::get_detail))
}
