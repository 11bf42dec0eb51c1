use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use validator::Validate;

use crate::{
    AppState,
    accounts::user_conflict,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{CreateUserRequest, NewUser, SearchQuery, UpdateUserRequest, User, UserChanges},
    permissions::AdminUser,
};

fn into_changes(payload: UpdateUserRequest) -> UserChanges {
    UserChanges {
        username: payload.username,
        email: payload.email,
        first_name: payload.first_name,
        last_name: payload.last_name,
        bio: payload.bio,
        role: payload.role,
    }
}

async fn find_by_username(state: &AppState, username: &str) -> ApiResult<User> {
    state
        .repo
        .get_user_by_username(username)
        .await?
        .ok_or(ApiError::NotFound("user"))
}

/// list_users
///
/// [Admin Route] All users ordered by id, optionally filtered by username substring.
#[utoipa::path(
    get,
    path = "/users",
    params(SearchQuery),
    responses(
        (status = 200, description = "Users", body = [User]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<User>>> {
    let users = state.repo.list_users(query.search.as_deref()).await?;
    Ok(Json(users))
}

/// create_user
///
/// [Admin Route] Creates a user with an explicit role. The user signs in later
/// through `/auth/signup` with the same email and username.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Created", body = User),
        (status = 400, description = "Invalid payload or duplicate email/username")
    )
)]
pub async fn create_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    payload.validate()?;

    let user = state
        .repo
        .create_user(NewUser {
            username: payload.username,
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            bio: payload.bio,
            role: payload.role,
        })
        .await
        .map_err(user_conflict)?;

    tracing::info!(admin = %admin.username, username = %user.username, role = %user.role, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// get_user
///
/// [Admin Route] A single profile by username.
#[utoipa::path(
    get,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_user(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<Json<User>> {
    Ok(Json(find_by_username(&state, &username).await?))
}

/// update_user
///
/// [Admin Route] Partial update, including the role.
#[utoipa::path(
    patch,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Username")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid payload or duplicate email/username"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_user(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    payload.validate()?;
    let user = find_by_username(&state, &username).await?;
    let updated = state
        .repo
        .update_user(user.id, into_changes(payload))
        .await
        .map_err(user_conflict)?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(updated))
}

/// delete_user
///
/// [Admin Route] Removes the user together with their reviews and comments.
#[utoipa::path(
    delete,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_user(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    let user = find_by_username(&state, &username).await?;
    if !state.repo.delete_user(user.id).await? {
        return Err(ApiError::NotFound("user"));
    }
    tracing::info!(admin = %admin.username, username = %user.username, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// get_me
///
/// [Authenticated Route] The requester's own profile.
#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "Own profile", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<User>> {
    let user = state
        .repo
        .get_user(id)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(user))
}

/// update_me
///
/// [Authenticated Route] Partial update of the requester's own profile. A `role`
/// in the payload is ignored.
#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 400, description = "Invalid payload or duplicate email/username"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_me(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<Json<User>> {
    payload.validate()?;
    let changes = UserChanges {
        role: None,
        ..into_changes(payload)
    };
    let updated = state
        .repo
        .update_user(id, changes)
        .await
        .map_err(user_conflict)?
        .ok_or(ApiError::NotFound("user"))?;
    Ok(Json(updated))
}
