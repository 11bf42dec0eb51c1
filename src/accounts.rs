//! Sign-up and token exchange.
//!
//! A user holds at most one live confirmation code. `register` issues one and mails it,
//! `exchange` consumes it and returns a bearer token. The consume step is a
//! compare-and-swap in the repository, so a code yields at most one token.

use rand::Rng;
use validator::Validate;

use crate::{
    auth,
    config::AppConfig,
    error::{ApiError, ApiResult},
    mailer::Mailer,
    models::{SignUpRequest, TokenRequest, TokenResponse},
    repository::{RepoError, Repository, constraints},
};

pub const DUPLICATE_EMAIL: &str = "A user with this email already exists.";
pub const DUPLICATE_USERNAME: &str = "A user with this username already exists.";
pub const INVALID_CODE: &str = "Confirmation code is invalid";

/// Random numeric code of `len` digits.
pub fn generate_confirmation_code(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.random_range(0..10u8)))
        .collect()
}

/// Translates a unique violation on the users table into a field-level conflict.
pub fn user_conflict(err: RepoError) -> ApiError {
    match err.constraint() {
        Some(constraints::USERS_EMAIL) => ApiError::conflict("email", DUPLICATE_EMAIL),
        Some(constraints::USERS_USERNAME | constraints::USERS_USERNAME_EMAIL) => {
            ApiError::conflict("username", DUPLICATE_USERNAME)
        }
        _ => ApiError::Repository(err),
    }
}

/// register
///
/// Finds or creates the user for `(email, username)`, stores a fresh code and mails it.
/// Calling it again for the same pair replaces the previous code.
pub async fn register(
    repo: &dyn Repository,
    mailer: &dyn Mailer,
    config: &AppConfig,
    request: SignUpRequest,
) -> ApiResult<SignUpRequest> {
    request.validate()?;

    let user = repo
        .get_or_create_user(&request.email, &request.username)
        .await
        .map_err(user_conflict)?;

    let code = generate_confirmation_code(config.confirmation_code_len);
    repo.set_confirmation_code(user.id, &code).await?;
    mailer.send_confirmation_code(&user.email, &code).await?;

    tracing::info!(user_id = user.id, username = %user.username, "confirmation code issued");
    Ok(request)
}

/// exchange
///
/// Trades a live confirmation code for an access token. The code is invalidated
/// before the token is signed.
pub async fn exchange(
    repo: &dyn Repository,
    config: &AppConfig,
    request: TokenRequest,
) -> ApiResult<TokenResponse> {
    request.validate()?;

    let user = repo
        .get_user_by_username(&request.username)
        .await?
        .ok_or(ApiError::NotFound("user"))?;

    if !user.confirmation.accepts(&request.confirmation_code) {
        return Err(ApiError::field("confirmation_code", INVALID_CODE));
    }
    if !repo
        .consume_confirmation_code(user.id, &request.confirmation_code)
        .await?
    {
        tracing::warn!(user_id = user.id, "confirmation code consumed concurrently");
        return Err(ApiError::field("confirmation_code", INVALID_CODE));
    }

    let access_token = auth::issue_token(&user, config)?;
    tracing::info!(user_id = user.id, "access token issued");
    Ok(TokenResponse { access_token })
}
