use axum::{Router, extract::FromRef, http::HeaderName};
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

// Core application services and components.
pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod models;
pub mod permissions;
pub mod repository;
pub mod validation;

// Routing, split by resource.
pub mod routes;
use routes::{auth::auth_routes, catalog::catalog_routes, reviews::review_routes, users::user_routes};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{ApiError, ApiResult};
pub use mailer::{LogMailer, MailerState, MockMailer, SmtpMailer};
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and `ToSchema` model into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::signup, handlers::auth::obtain_token,
        handlers::users::list_users, handlers::users::create_user, handlers::users::get_user,
        handlers::users::update_user, handlers::users::delete_user,
        handlers::users::get_me, handlers::users::update_me,
        handlers::taxonomy::list_categories, handlers::taxonomy::create_category,
        handlers::taxonomy::delete_category, handlers::taxonomy::list_genres,
        handlers::taxonomy::create_genre, handlers::taxonomy::delete_genre,
        handlers::titles::list_titles, handlers::titles::get_title, handlers::titles::create_title,
        handlers::titles::update_title, handlers::titles::delete_title,
        handlers::reviews::list_reviews, handlers::reviews::create_review,
        handlers::reviews::get_review, handlers::reviews::update_review,
        handlers::reviews::delete_review,
        handlers::comments::list_comments, handlers::comments::create_comment,
        handlers::comments::get_comment, handlers::comments::update_comment,
        handlers::comments::delete_comment,
    ),
    components(
        schemas(
            models::Role, models::User, models::TaxonomyEntry, models::Title, models::Review,
            models::Comment, models::SignUpRequest, models::TokenRequest, models::TokenResponse,
            models::CreateUserRequest, models::UpdateUserRequest, models::TaxonomyRequest,
            models::CreateTitleRequest, models::UpdateTitleRequest, models::CreateReviewRequest,
            models::UpdateReviewRequest, models::CommentRequest,
        )
    ),
    tags(
        (name = "yamdb", description = "Reviews of films, books and music")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single, cloneable container of shared services handed to every request.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in deployments, in-memory in tests.
    pub repo: RepositoryState,
    /// Outbound mail for confirmation codes.
    pub mailer: MailerState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors and handlers pull individual services out of AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for MailerState {
    fn from_ref(app_state: &AppState) -> MailerState {
        app_state.mailer.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles all routes, the Swagger UI and the observability layers, and binds the state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(auth_routes())
        .merge(user_routes())
        .merge(catalog_routes())
        .merge(review_routes())
        .with_state(state);

    // Request id is generated first so the trace span can record it.
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
/// Builds the per-request span with method, URI and the `x-request-id`, so every log
/// line of one request can be correlated.
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
