use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Authenticated Router Module
///
/// Routes available to every identity holding a valid token. Reads are open
/// to all of them; employment mutations go through the lifecycle guard,
/// which restricts users to the records of their own alumni.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/api/profile", get(handlers::get_profile))
        // --- Alumni (reads) ---
        .route("/api/alumni", get(handlers::list_alumni))
        .route("/api/alumni/{id}", get(handlers::get_alumni))
        .route(
            "/api/alumni/angkatan/{year}",
            get(handlers::count_alumni_by_cohort),
        )
        .route(
            "/api/alumni/with-pekerjaan/{id}",
            get(handlers::get_alumni_with_employment),
        )
        // GET /api/alumni-pag?page=&limit=&sortBy=&order=&search=
        .route("/api/alumni-pag", get(handlers::list_alumni_page))
        // --- Employment records ---
        .route("/api/pekerjaan", get(handlers::list_employment))
        // GET /api/pekerjaan/trash
        // Admins see the whole trash, users only their own alumni's.
        .route("/api/pekerjaan/trash", get(handlers::list_trash))
        .route(
            "/api/pekerjaan/alumni/{id}",
            get(handlers::list_employment_by_alumni),
        )
        // GET/PUT/DELETE /api/pekerjaan/{id}
        // DELETE moves the record to the trash.
        .route(
            "/api/pekerjaan/{id}",
            get(handlers::get_employment)
                .put(handlers::update_employment)
                .delete(handlers::soft_delete_employment),
        )
        .route(
            "/api/pekerjaan/restore/{id}",
            put(handlers::restore_employment),
        )
        // DELETE /api/pekerjaan/hard-delete/{id}
        // Irreversible. Users may only destroy records already in the trash.
        .route(
            "/api/pekerjaan/hard-delete/{id}",
            delete(handlers::hard_delete_employment),
        )
        .route("/api/pekerjaan-pag", get(handlers::list_employment_page))
}
