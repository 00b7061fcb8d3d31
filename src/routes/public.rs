use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints that need no token: liveness checks and the two ways of
/// obtaining one (login and self-registration).
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        .route("/", get(|| async { "Alumni portal API" }))
        // GET /health
        // Used by load balancers; answers without touching storage.
        .route("/health", get(|| async { "ok" }))
        // POST /api/login
        // Identifier may be a username or an email.
        .route("/api/login", post(handlers::login))
        // POST /api/register
        // Public sign-up; the role is always `user`.
        .route("/api/register", post(handlers::register))
}
