use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod pagination;
pub mod password;
pub mod repository;
pub mod response;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and the
/// `ToSchema` models, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::register, handlers::register_admin, handlers::get_profile,
        handlers::list_users,
        handlers::list_alumni, handlers::get_alumni, handlers::count_alumni_by_cohort,
        handlers::get_alumni_with_employment, handlers::create_alumni, handlers::update_alumni,
        handlers::delete_alumni, handlers::list_alumni_page,
        handlers::list_employment, handlers::get_employment, handlers::list_employment_by_alumni,
        handlers::create_employment, handlers::update_employment, handlers::soft_delete_employment,
        handlers::list_trash, handlers::restore_employment, handlers::hard_delete_employment,
        handlers::list_employment_page
    ),
    components(
        schemas(
            models::Role, models::User, models::Alumni, models::CohortCount,
            models::AlumniEmployment, models::CreateAlumniRequest, models::UpdateAlumniRequest,
            models::EmploymentRecord, models::CreateEmploymentRequest,
            models::UpdateEmploymentRequest, models::LoginRequest, models::RegisterRequest,
            models::AdminCreateUserRequest, models::AuthPayload, models::ProfileResponse,
            response::PageMeta,
        )
    ),
    tags(
        (name = "alumni-portal", description = "Alumni and employment history API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single immutable container of shared services, built once at startup
/// and cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Storage capability (Postgres in production, in-memory in tests).
    pub repo: RepositoryState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Route layer in front of every authenticated and admin route. A missing or
/// invalid token is rejected here with 401; on success the resolved
/// `AuthUser` is stored in the request extensions so the handler's own
/// extractor does not validate the token a second time.
async fn auth_middleware(auth_user: AuthUser, mut request: Request, next: Next) -> Response {
    tracing::debug!(user_id = auth_user.id, role = %auth_user.role, "request authenticated");
    request.extensions_mut().insert(auth_user);
    next.run(request).await
}

/// create_router
///
/// Assembles the routers, applies the auth route layer and the global
/// observability layers, and binds the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Protected routes share one auth layer.
    let protected = authenticated::authenticated_routes()
        .merge(admin::admin_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // 3. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(protected)
        .with_state(state);

    // 4. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the `http_request` span for `TraceLayer`, tagged with the request id
/// so every log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
