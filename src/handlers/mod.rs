//! HTTP handlers, one module per resource.
//!
//! Handlers stay thin: authorize, validate, call the repository, shape the response.
//! Every failure is an `ApiError`, so the status mapping lives in one place.

pub mod auth;
pub mod comments;
pub mod reviews;
pub mod taxonomy;
pub mod titles;
pub mod users;

use crate::{
    error::{ApiError, ApiResult},
    models::{Review, Title},
    repository::Repository,
};

/// Fetches a title or fails with 404.
pub(crate) async fn load_title(repo: &dyn Repository, title_id: i64) -> ApiResult<Title> {
    repo.get_title(title_id)
        .await?
        .ok_or(ApiError::NotFound("title"))
}

/// Fetches a review that belongs to `title_id`, or fails with 404.
pub(crate) async fn load_review(
    repo: &dyn Repository,
    title_id: i64,
    review_id: i64,
) -> ApiResult<Review> {
    load_title(repo, title_id).await?;
    repo.get_review(title_id, review_id)
        .await?
        .ok_or(ApiError::NotFound("review"))
}
