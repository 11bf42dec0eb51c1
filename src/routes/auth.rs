use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without credentials: the health probe and the two-step
/// confirmation-code sign-in.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/signup
        // Creates (or reuses) the account and mails a confirmation code.
        .route("/auth/signup", post(handlers::auth::signup))
        // POST /auth/token
        // Exchanges the confirmation code for a bearer token, once.
        .route("/auth/token", post(handlers::auth::obtain_token))
}
