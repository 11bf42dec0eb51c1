use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};
use validator::ValidateArgs;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    handlers::{load_review, load_title},
    models::{CreateReviewRequest, NewReview, Review, UpdateReviewRequest},
    permissions::Policy,
    repository::constraints,
};

const POLICY: Policy = Policy::AdminModeratorOrAuthor;

pub const DUPLICATE_REVIEW: &str = "You have already reviewed this title.";

/// list_reviews
///
/// [Public Route] Reviews of a title, newest first.
#[utoipa::path(
    get,
    path = "/titles/{title_id}/reviews",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 200, description = "Reviews", body = [Review]),
        (status = 404, description = "Title not found")
    )
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> ApiResult<Json<Vec<Review>>> {
    load_title(state.repo.as_ref(), title_id).await?;
    Ok(Json(state.repo.list_reviews(title_id).await?))
}

/// create_review
///
/// [Authenticated Route] One review per user and title; the score must lie in the
/// configured range.
#[utoipa::path(
    post,
    path = "/titles/{title_id}/reviews",
    params(("title_id" = i64, Path, description = "Title id")),
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Created", body = Review),
        (status = 400, description = "Invalid payload or duplicate review"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Title not found")
    )
)]
pub async fn create_review(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    Json(payload): Json<CreateReviewRequest>,
) -> ApiResult<(StatusCode, Json<Review>)> {
    POLICY.authorize(&method, requester.as_ref())?;
    let Some(author) = requester else {
        return Err(ApiError::Unauthorized(
            "Authentication credentials were not provided".to_string(),
        ));
    };
    load_title(state.repo.as_ref(), title_id).await?;

    payload.validate_with_args(&state.config.score_range())?;

    let review = state
        .repo
        .create_review(NewReview {
            title_id,
            author_id: author.id,
            text: payload.text,
            score: payload.score.unwrap_or_default(),
        })
        .await
        .map_err(|err| match err.constraint() {
            Some(constraints::REVIEWS_TITLE_AUTHOR) => {
                ApiError::conflict("non_field_errors", DUPLICATE_REVIEW)
            }
            _ => ApiError::Repository(err),
        })?;

    tracing::info!(title_id, review_id = review.id, author = %author.username, "review created");
    Ok((StatusCode::CREATED, Json(review)))
}

/// get_review
///
/// [Public Route] A review, found only under its own title.
#[utoipa::path(
    get,
    path = "/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 200, description = "Review", body = Review),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_review(
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Review>> {
    Ok(Json(load_review(state.repo.as_ref(), title_id, review_id).await?))
}

/// update_review
///
/// [Author / Moderator / Admin] Partial update of text and score.
#[utoipa::path(
    patch,
    path = "/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Updated", body = Review),
        (status = 400, description = "Invalid payload"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_review(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
    Json(payload): Json<UpdateReviewRequest>,
) -> ApiResult<Json<Review>> {
    POLICY.authorize(&method, requester.as_ref())?;
    let review = load_review(state.repo.as_ref(), title_id, review_id).await?;
    POLICY.authorize_object(&method, requester.as_ref(), review.author_id)?;

    payload.validate_with_args(&state.config.score_range())?;

    let updated = state
        .repo
        .update_review(review.id, payload.text, payload.score)
        .await?
        .ok_or(ApiError::NotFound("review"))?;
    Ok(Json(updated))
}

/// delete_review
///
/// [Author / Moderator / Admin] Removes the review and its comments.
#[utoipa::path(
    delete,
    path = "/titles/{title_id}/reviews/{review_id}",
    params(
        ("title_id" = i64, Path, description = "Title id"),
        ("review_id" = i64, Path, description = "Review id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author, a moderator or an admin"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_review(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path((title_id, review_id)): Path<(i64, i64)>,
) -> ApiResult<StatusCode> {
    POLICY.authorize(&method, requester.as_ref())?;
    let review = load_review(state.repo.as_ref(), title_id, review_id).await?;
    POLICY.authorize_object(&method, requester.as_ref(), review.author_id)?;

    if !state.repo.delete_review(review.id).await? {
        return Err(ApiError::NotFound("review"));
    }
    Ok(StatusCode::NO_CONTENT)
}

