use axum::{Json, extract::State};

use crate::{
    AppState, accounts,
    error::ApiResult,
    models::{SignUpRequest, TokenRequest, TokenResponse},
};

/// signup
///
/// [Public Route] Registers `(email, username)` (or reuses an existing account with
/// exactly that pair) and mails a fresh confirmation code. Echoes the payload.
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpRequest,
    responses(
        (status = 200, description = "Confirmation code sent", body = SignUpRequest),
        (status = 400, description = "Invalid payload or email/username taken")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> ApiResult<Json<SignUpRequest>> {
    let echoed = accounts::register(
        state.repo.as_ref(),
        state.mailer.as_ref(),
        &state.config,
        payload,
    )
    .await?;
    Ok(Json(echoed))
}

/// obtain_token
///
/// [Public Route] Exchanges a confirmation code for a bearer token. A code works once.
#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Access token", body = TokenResponse),
        (status = 400, description = "Missing fields or invalid confirmation code"),
        (status = 404, description = "Unknown username")
    )
)]
pub async fn obtain_token(
    State(state): State<AppState>,
    Json(payload): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token = accounts::exchange(state.repo.as_ref(), &state.config, payload).await?;
    Ok(Json(token))
}
