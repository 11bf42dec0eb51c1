use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    handlers::load_review,
    models::{Comment, CommentRequest, NewComment},
    permissions::Policy,
    repository::Repository,
};

const POLICY: Policy = Policy::AdminModeratorOrAuthor;

/// Fetches a comment under `/titles/{title_id}/reviews/{review_id}`, or fails with 404.
async fn load_comment(
    repo: &dyn Repository,
    (title_id, review_id, comment_id): (i64, i64, i64),
) -> ApiResult<Comment> {
    load_review(repo, title_id, review_id).await?;
    repo.get_comment(review_id, comment_id)
        .await?
        .ok_or(ApiError::NotFound("comment"))
}

#[utoipa::path(
    get,
    path = "/titles/{title_id}/reviews/{review_id}/comments",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "Title or review not found")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Vec<Comment>>> {
    load_review(state.repo.as_ref(), title_id, review_id).await?;
    Ok(Json(state.repo.list_comments(review_id).await?))
}

/// create_comment
///
/// [Authenticated Route] Replies to a review.
#[utoipa::path(
    post,
    path = "/titles/{title_id}/reviews/{review_id}/comments",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    request_body = CommentRequest,
    responses(
        (status = 201, description = "Created", body = Comment),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Title or review not found")
    )
)]
pub async fn create_comment(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    POLICY.authorize(&method, requester.as_ref())?;
    let Some(author) = requester else {
        return Err(ApiError::Unauthorized(
            "Authentication credentials were not provided".to_string(),
        ));
    };
    load_review(state.repo.as_ref(), title_id, review_id).await?;

    payload.validate()?;

    let comment = state
        .repo
        .create_comment(NewComment {
            review_id,
            author_id: author.id,
            text: payload.text,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    get,
    path = "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 200, description = "Comment", body = Comment),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_comment(
    State(state): State<AppState>,
    Path(ids): Path<(i64, i64, i64)>,
) -> ApiResult<Json<Comment>> {
    Ok(Json(load_comment(state.repo.as_ref(), ids).await?))
}

/// update_comment
///
/// [Author / Moderator / Admin] Replaces the comment text.
#[utoipa::path(
    patch,
    path = "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated", body = Comment),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_comment(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(ids): Path<(i64, i64, i64)>,
    Json(payload): Json<CommentRequest>,
) -> ApiResult<Json<Comment>> {
    POLICY.authorize(&method, requester.as_ref())?;
    let comment = load_comment(state.repo.as_ref(), ids).await?;
    POLICY.authorize_object(&method, requester.as_ref(), comment.author_id)?;

    payload.validate()?;

    let updated = state
        .repo
        .update_comment(comment.id, payload.text)
        .await?
        .ok_or(ApiError::NotFound("comment"))?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id"),
        ("comment_id" = i64, Path, description = "Comment id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(ids): Path<(i64, i64, i64)>,
) -> ApiResult<StatusCode> {
    POLICY.authorize(&method, requester.as_ref())?;
    let comment = load_comment(state.repo.as_ref(), ids).await?;
    POLICY.authorize_object(&method, requester.as_ref(), comment.author_id)?;

    if !state.repo.delete_comment(comment.id).await? {
        return Err(ApiError::NotFound("comment"));
    }
    Ok(StatusCode::NO_CONTENT)
}
