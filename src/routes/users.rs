use crate::{AppState, handlers::users};
use axum::{Router, routing::get};

/// User Router Module
///
/// Admin management of accounts plus the self-service profile. `/users/me` is a
/// static segment and wins over `/users/{username}`.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route(
            "/users/{username}",
            get(users::get_user)
                .patch(users::update_user)
                .delete(users::delete_user),
        )
}
