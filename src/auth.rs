use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::{ApiError, ApiResult},
    models::{Role, User},
    repository::RepositoryState,
};

/// Header accepted in `Env::Local` instead of a bearer token.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the HS256 access token issued by `/auth/token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's numeric id, as a string.
    pub sub: String,
    /// Expiration Time (exp): seconds since the epoch.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
    /// Unique token id, so two tokens issued in the same second differ.
    pub jti: Uuid,
}

/// issue_token
///
/// Signs an access token for `user` valid for `config.token_ttl_hours`.
pub fn issue_token(user: &User, config: &AppConfig) -> ApiResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        exp: (now + Duration::hours(config.token_ttl_hours)).timestamp() as usize,
        iat: now.timestamp() as usize,
        jti: Uuid::new_v4(),
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )?;
    Ok(token)
}

/// decode_token
///
/// Verifies signature and expiry, returning the claims.
pub fn decode_token(token: &str, config: &AppConfig) -> Result<Claims, ApiError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => ApiError::Unauthorized("Token has expired".to_string()),
        _ => ApiError::Unauthorized("Token is invalid".to_string()),
    })
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Always reloaded from the
/// repository, so a role change or deletion takes effect on the next request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub role: Role,
    pub is_superuser: bool,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
            is_superuser: user.is_superuser,
        }
    }
}

fn has_credentials(parts: &Parts, config: &AppConfig) -> bool {
    parts.headers.contains_key(header::AUTHORIZATION)
        || (config.env == Env::Local && parts.headers.contains_key(DEV_USER_HEADER))
}

/// Resolves the requester from the request headers.
///
/// 1. Local bypass: in `Env::Local` an `x-user-id` header naming an existing user wins.
/// 2. Bearer token: signature and expiry checked, then the user is reloaded by id.
async fn authenticate(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<AuthUser, ApiError> {
    if config.env == Env::Local {
        let dev_user_id = parts
            .headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i64>().ok());
        if let Some(user_id) = dev_user_id
            && let Some(user) = repo.get_user(user_id).await?
        {
            return Ok(AuthUser::from(&user));
        }
    }

    let token = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ApiError::Unauthorized("Authentication credentials were not provided".to_string())
        })?;

    let claims = decode_token(token, config)?;
    let user_id: i64 = claims
        .sub
        .parse()
        .map_err(|_| ApiError::Unauthorized("Token is invalid".to_string()))?;

    let user = repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    Ok(AuthUser::from(&user))
}

/// Required identity: any failure rejects the request with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);
        authenticate(parts, &repo, &config).await
    }
}

/// Optional identity for endpoints that allow anonymous reads. No credentials yields
/// `None`; credentials that fail to verify are still rejected with 401.
impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        if !has_credentials(parts, &config) {
            return Ok(None);
        }
        let repo = RepositoryState::from_ref(state);
        authenticate(parts, &repo, &config).await.map(Some)
    }
}
