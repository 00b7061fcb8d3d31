use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Routes exclusively for the `admin` role. Every handler here takes the
/// `AdminUser` extractor, so a non-admin token is answered with 403 before
/// any storage write happens.
///
/// Some paths are shared with the authenticated router (different methods);
/// axum merges them into one method router per path.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /api/register-admin
        // Account creation with an explicit role.
        .route("/api/register-admin", post(handlers::register_admin))
        .route("/api/users", get(handlers::list_users))
        // --- Alumni (writes) ---
        .route("/api/alumni", post(handlers::create_alumni))
        .route(
            "/api/alumni/{id}",
            put(handlers::update_alumni).delete(handlers::delete_alumni),
        )
        // POST /api/pekerjaan
        // New records start Active.
        .route("/api/pekerjaan", post(handlers::create_employment))
}
