use crate::{
    AppState,
    handlers::{comments, reviews},
};
use axum::{Router, routing::get};

/// Review Router Module
///
/// Reviews live under their title and comments under their review. A record
/// requested under the wrong parent is reported as not found.
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/titles/{title_id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(reviews::get_review)
                .patch(reviews::update_review)
                .delete(reviews::delete_review),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(comments::get_comment)
                .patch(comments::update_comment)
                .delete(comments::delete_comment),
        )
}
