//! Categories and genres. Both are `{name, slug}` records addressed by slug, so the
//! handlers here are thin wrappers over three shared operations.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    models::{SearchQuery, TaxonomyEntry, TaxonomyKind, TaxonomyRequest},
    permissions::Policy,
    repository::RepoError,
};

const POLICY: Policy = Policy::AdminOrReadOnly;

async fn list(
    state: &AppState,
    kind: TaxonomyKind,
    query: SearchQuery,
) -> ApiResult<Json<Vec<TaxonomyEntry>>> {
    let entries = state
        .repo
        .list_taxonomy(kind, query.search.as_deref())
        .await?;
    Ok(Json(entries))
}

async fn create(
    state: &AppState,
    kind: TaxonomyKind,
    payload: TaxonomyRequest,
) -> ApiResult<(StatusCode, Json<TaxonomyEntry>)> {
    payload.validate()?;

    let entry = state
        .repo
        .create_taxonomy(kind, &payload.name, &payload.slug)
        .await
        .map_err(|err| match err {
            RepoError::UniqueViolation(_) => ApiError::conflict(
                "slug",
                format!("A {} with this slug already exists.", kind.noun()),
            ),
            other => ApiError::Repository(other),
        })?;

    tracing::info!(kind = kind.noun(), slug = %entry.slug, "taxonomy entry created");
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn delete(state: &AppState, kind: TaxonomyKind, slug: &str) -> ApiResult<StatusCode> {
    if !state.repo.delete_taxonomy(kind, slug).await? {
        return Err(ApiError::NotFound(kind.noun()));
    }
    Ok(StatusCode::NO_CONTENT)
}

// --- Categories ---

/// list_categories
///
/// [Public Route] Newest first; `search` matches the name.
#[utoipa::path(
    get,
    path = "/categories",
    params(SearchQuery),
    responses((status = 200, description = "Categories", body = [TaxonomyEntry]))
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<TaxonomyEntry>>> {
    list(&state, TaxonomyKind::Category, query).await
}

#[utoipa::path(
    post,
    path = "/categories",
    request_body = TaxonomyRequest,
    responses(
        (status = 201, description = "Created", body = TaxonomyEntry),
        (status = 400, description = "Invalid payload or duplicate slug"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_category(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<TaxonomyRequest>,
) -> ApiResult<(StatusCode, Json<TaxonomyEntry>)> {
    POLICY.authorize(&method, requester.as_ref())?;
    create(&state, TaxonomyKind::Category, payload).await
}

/// delete_category
///
/// [Admin Route] Titles in the category keep existing with `category: null`.
#[utoipa::path(
    delete,
    path = "/categories/{slug}",
    params(("slug" = String, Path, description = "Category slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    POLICY.authorize(&method, requester.as_ref())?;
    delete(&state, TaxonomyKind::Category, &slug).await
}

// --- Genres ---

#[utoipa::path(
    get,
    path = "/genres",
    params(SearchQuery),
    responses((status = 200, description = "Genres", body = [TaxonomyEntry]))
)]
pub async fn list_genres(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Vec<TaxonomyEntry>>> {
    list(&state, TaxonomyKind::Genre, query).await
}

#[utoipa::path(
    post,
    path = "/genres",
    request_body = TaxonomyRequest,
    responses(
        (status = 201, description = "Created", body = TaxonomyEntry),
        (status = 400, description = "Invalid payload or duplicate slug"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_genre(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<TaxonomyRequest>,
) -> ApiResult<(StatusCode, Json<TaxonomyEntry>)> {
    POLICY.authorize(&method, requester.as_ref())?;
    create(&state, TaxonomyKind::Genre, payload).await
}

/// delete_genre
///
/// [Admin Route] The genre disappears from every title's genre list.
#[utoipa::path(
    delete,
    path = "/genres/{slug}",
    params(("slug" = String, Path, description = "Genre slug")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_genre(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<StatusCode> {
    POLICY.authorize(&method, requester.as_ref())?;
    delete(&state, TaxonomyKind::Genre, &slug).await
}
