use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{HeaderValue, Method, Request, StatusCode, Uri, header, request::Parts},
};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{sync::Arc, time::SystemTime};
use uuid::Uuid;
use yamdb_api::{
    AppState, MemoryRepository, MockMailer,
    auth::{AuthUser, Claims, decode_token, issue_token},
    config::{AppConfig, Env},
    models::{NewUser, Role, User},
    permissions::AdminUser,
    repository::Repository,
};

// --- Helper Functions ---

const TEST_JWT_SECRET: &str = "test-secret-value-1234567890";

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Signs claims for `sub` with a custom expiry, bypassing `issue_token`.
fn create_token(sub: &str, exp: u64, secret: &str) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        iat: now_secs() as usize,
        exp: exp as usize,
        jti: Uuid::new_v4(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

fn test_config(env: Env) -> AppConfig {
    AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    }
}

async fn create_app_state(env: Env) -> (AppState, Arc<MemoryRepository>) {
    let repo = Arc::new(MemoryRepository::new());
    let state = AppState {
        repo: repo.clone(),
        mailer: Arc::new(MockMailer::new()),
        config: test_config(env),
    };
    (state, repo)
}

async fn seed_user(repo: &MemoryRepository, username: &str, role: Role) -> User {
    repo.create_user(NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        role,
        ..NewUser::default()
    })
    .await
    .unwrap()
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(mut parts: Parts, token: &str) -> Parts {
    parts.headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    parts
}

async fn extract(parts: &mut Parts, state: &AppState) -> Result<AuthUser, StatusCode> {
    <AuthUser as FromRequestParts<AppState>>::from_request_parts(parts, state)
        .await
        .map_err(|e| e.status())
}

// --- Tests ---

#[tokio::test]
async fn test_auth_success_with_issued_token() {
    let (state, repo) = create_app_state(Env::Production).await;
    let user = seed_user(&repo, "ann", Role::Moderator).await;
    let token = issue_token(&user, &state.config).unwrap();

    let mut parts = with_bearer(get_request_parts(Method::GET, "/".parse().unwrap()), &token);
    let auth_user = extract(&mut parts, &state).await.unwrap();

    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.username, "ann");
    assert_eq!(auth_user.role, Role::Moderator);
    assert!(auth_user.is_moderator());
    assert!(!auth_user.is_admin());
}

#[tokio::test]
async fn test_issued_tokens_are_unique_and_decodable() {
    let config = test_config(Env::Production);
    let user = User {
        id: 42,
        ..User::default()
    };
    let first = issue_token(&user, &config).unwrap();
    let second = issue_token(&user, &config).unwrap();
    assert_ne!(first, second);

    let claims = decode_token(&first, &config).unwrap();
    assert_eq!(claims.sub, "42");
    assert_eq!(claims.exp - claims.iat, 24 * 3600);
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let (state, _) = create_app_state(Env::Production).await;
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_failure_with_expired_jwt() {
    let (state, repo) = create_app_state(Env::Production).await;
    let user = seed_user(&repo, "ann", Role::User).await;
    // Well past the default 60s leeway.
    let token = create_token(&user.id.to_string(), now_secs() - 3600, TEST_JWT_SECRET);

    let mut parts = with_bearer(get_request_parts(Method::GET, "/".parse().unwrap()), &token);
    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_failure_with_foreign_signature() {
    let (state, repo) = create_app_state(Env::Production).await;
    let user = seed_user(&repo, "ann", Role::User).await;
    let token = create_token(&user.id.to_string(), now_secs() + 3600, "some-other-secret");

    let mut parts = with_bearer(get_request_parts(Method::GET, "/".parse().unwrap()), &token);
    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_auth_failure_for_unknown_subject() {
    let (state, _) = create_app_state(Env::Production).await;
    let token = create_token("9999", now_secs() + 3600, TEST_JWT_SECRET);

    let mut parts = with_bearer(get_request_parts(Method::GET, "/".parse().unwrap()), &token);
    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_local_bypass_success() {
    let (state, repo) = create_app_state(Env::Local).await;
    let user = seed_user(&repo, "root", Role::Admin).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    let auth_user = extract(&mut parts, &state).await.unwrap();
    assert_eq!(auth_user.id, user.id);
    assert_eq!(auth_user.role, Role::Admin);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let (state, repo) = create_app_state(Env::Production).await;
    let user = seed_user(&repo, "root", Role::Admin).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(&user.id.to_string()).unwrap(),
    );

    assert_eq!(
        extract(&mut parts, &state).await.unwrap_err(),
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_optional_extractor() {
    let (state, repo) = create_app_state(Env::Production).await;
    let user = seed_user(&repo, "ann", Role::User).await;

    let mut anonymous = get_request_parts(Method::GET, "/".parse().unwrap());
    let resolved =
        <AuthUser as OptionalFromRequestParts<AppState>>::from_request_parts(&mut anonymous, &state)
            .await
            .unwrap();
    assert!(resolved.is_none());

    let token = issue_token(&user, &state.config).unwrap();
    let mut authed = with_bearer(get_request_parts(Method::GET, "/".parse().unwrap()), &token);
    let resolved =
        <AuthUser as OptionalFromRequestParts<AppState>>::from_request_parts(&mut authed, &state)
            .await
            .unwrap();
    assert_eq!(resolved.map(|u| u.id), Some(user.id));

    // Present but broken credentials are not silently treated as anonymous.
    let mut broken = with_bearer(get_request_parts(Method::GET, "/".parse().unwrap()), "junk");
    let result =
        <AuthUser as OptionalFromRequestParts<AppState>>::from_request_parts(&mut broken, &state)
            .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_admin_extractor_roles() {
    let (state, repo) = create_app_state(Env::Production).await;
    let admin = seed_user(&repo, "root", Role::Admin).await;
    let user = seed_user(&repo, "ann", Role::User).await;
    let superuser = seed_user(&repo, "boss", Role::User).await;
    assert!(repo.promote_superuser(superuser.id).await);

    for (candidate, expected) in [
        (&admin, Ok(())),
        (&user, Err(StatusCode::FORBIDDEN)),
        (&superuser, Ok(())),
    ] {
        let token = issue_token(candidate, &state.config).unwrap();
        let mut parts = with_bearer(get_request_parts(Method::GET, "/users".parse().unwrap()), &token);
        let result = <AdminUser as FromRequestParts<AppState>>::from_request_parts(&mut parts, &state)
            .await
            .map(|_| ())
            .map_err(|e| e.status());
        assert_eq!(result, expected, "user {}", candidate.username);
    }

    let mut anonymous = get_request_parts(Method::GET, "/users".parse().unwrap());
    let result = <AdminUser as FromRequestParts<AppState>>::from_request_parts(&mut anonymous, &state)
        .await
        .map_err(|e| e.status());
    assert_eq!(result.err(), Some(StatusCode::UNAUTHORIZED));
}
