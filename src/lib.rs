use axum::{Router, extract::FromRef, http::HeaderName, middleware};
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
pub mod context;
pub mod error;
pub mod handlers;
pub mod models;
pub mod password;
pub mod repository;
pub mod token;

pub mod routes;
use routes::{authenticated, public, restricted};

// --- Public Re-exports ---

pub use auth::{AccessGuard, RoleGuard, require_roles};
pub use config::AppConfig;
pub use context::IdentityContext;
pub use error::ApiError;
pub use password::{HasherState, PasswordHasher};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};
pub use token::{TokenCodec, TokenCodecState};

use models::AccountKind;

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::refresh, handlers::reset_password, handlers::get_me,
        handlers::get_detail
    ),
    components(
        schemas(
            models::AccountKind, models::Identity, models::LoginRequest,
            models::ResetPasswordRequest, models::TokenPair, models::MessageBody,
            models::AccountDetail,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "sms-auth", description = "Student Management System authentication API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, immutable container for the services every request needs. The
/// token codec's keys and the hasher's parameters are fixed at startup.
#[derive(Clone)]
pub struct AppState {
    /// Credential store (Postgres or in-memory).
    pub repo: RepositoryState,
    /// Signs and verifies tokens with the process-wide secret.
    pub tokens: TokenCodecState,
    pub hasher: HasherState,
    pub config: AppConfig,
}

impl AppState {
    /// Builds the codec and hasher from `config` around an existing store.
    ///
    /// Fails only if the configured Argon2 costs are out of range.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Result<Self, password::PasswordError> {
        let tokens = TokenCodec::new(&config.jwt_secret, &config.jwt_issuer);
        let hasher = PasswordHasher::with_params(
            config.argon2_m_cost,
            config.argon2_t_cost,
            config.argon2_p_cost,
        )?;
        Ok(Self {
            repo,
            tokens: tokens.into(),
            hasher: hasher.into(),
            config,
        })
    }
}

/// Allow-set of the self-service routes: every account kind.
const ANY_ACCOUNT: &[AccountKind] = &AccountKind::ALL;
const STUDENT_ONLY: &[AccountKind] = &[AccountKind::Student];
const STAFF_ONLY: &[AccountKind] = &[AccountKind::Staff];

/// create_router
///
/// Assembles the routes, guards the authenticated group and applies the
/// global observability and CORS layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let access_guard = AccessGuard::from_ref(&state);
    let self_service_guard = RoleGuard::new(access_guard.clone(), ANY_ACCOUNT);
    let student_guard = RoleGuard::new(access_guard.clone(), STUDENT_ONLY);
    let staff_guard = RoleGuard::new(access_guard, STAFF_ONLY);

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // route_layer: the guard runs only for routes that matched, so unknown
        // paths still 404 instead of 401.
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(self_service_guard, require_roles)),
        )
        // One guard per restricted group, each with its own allow-set.
        .merge(
            restricted::student_routes()
                .route_layer(middleware::from_fn_with_state(student_guard, require_roles)),
        )
        .merge(
            restricted::staff_routes()
                .route_layer(middleware::from_fn_with_state(staff_guard, require_roles)),
        )
        .with_state(state);

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
/// Span per request carrying method, uri and the `x-request-id` set above,
/// so every log line of one call can be correlated.
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
