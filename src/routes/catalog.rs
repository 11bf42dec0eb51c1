use crate::{
    AppState,
    handlers::{taxonomy, titles},
};
use axum::{
    Router,
    routing::{delete, get},
};

/// Catalog Router Module
///
/// Categories, genres and titles. Reads are public; writes require an admin.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(taxonomy::list_categories).post(taxonomy::create_category),
        )
        .route("/categories/{slug}", delete(taxonomy::delete_category))
        .route(
            "/genres",
            get(taxonomy::list_genres).post(taxonomy::create_genre),
        )
        .route("/genres/{slug}", delete(taxonomy::delete_genre))
        // GET /titles?genre=&category=&year=&name=
        .route("/titles", get(titles::list_titles).post(titles::create_title))
        .route(
            "/titles/{title_id}",
            get(titles::get_title)
                .patch(titles::update_title)
                .delete(titles::delete_title),
        )
}
