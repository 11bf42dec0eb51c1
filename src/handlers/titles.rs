use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    AppState,
    auth::AuthUser,
    error::{ApiError, ApiResult},
    handlers::load_title,
    models::{
        CreateTitleRequest, NewTitle, TaxonomyKind, Title, TitleChanges, TitleFilter,
        UpdateTitleRequest,
    },
    permissions::Policy,
    repository::Repository,
    validation,
};

const POLICY: Policy = Policy::AdminOrReadOnly;

fn missing_slug(slug: &str) -> ValidationError {
    validation::invalid(
        "does_not_exist",
        format!("Object with slug={slug} does not exist."),
    )
}

/// Resolves a category slug to its id; an unknown slug is a field error.
async fn resolve_category(
    repo: &dyn Repository,
    slug: &str,
) -> ApiResult<Result<i64, ValidationError>> {
    let entry = repo.get_taxonomy_by_slug(TaxonomyKind::Category, slug).await?;
    Ok(entry.map(|e| e.id).ok_or_else(|| missing_slug(slug)))
}

/// Resolves every genre slug, dropping duplicates; the first unknown one is the field error.
async fn resolve_genres(
    repo: &dyn Repository,
    slugs: &[String],
) -> ApiResult<Result<Vec<i64>, ValidationError>> {
    let mut ids = Vec::with_capacity(slugs.len());
    for slug in slugs {
        match repo.get_taxonomy_by_slug(TaxonomyKind::Genre, slug).await? {
            Some(entry) if !ids.contains(&entry.id) => ids.push(entry.id),
            Some(_) => {}
            None => return Ok(Err(missing_slug(slug))),
        }
    }
    Ok(Ok(ids))
}

/// Moves a failed lookup into `errors` under `field`.
fn record<T>(
    errors: &mut ValidationErrors,
    field: &'static str,
    result: Result<T, ValidationError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            errors.add(field, error);
            None
        }
    }
}

/// list_titles
///
/// [Public Route] Titles ordered by name, each with its current rating.
#[utoipa::path(
    get,
    path = "/titles",
    params(TitleFilter),
    responses((status = 200, description = "Titles", body = [Title]))
)]
pub async fn list_titles(
    State(state): State<AppState>,
    Query(filter): Query<TitleFilter>,
) -> ApiResult<Json<Vec<Title>>> {
    let titles = state.repo.list_titles(&filter).await?;
    Ok(Json(titles))
}

/// get_title
///
/// [Public Route] A single title with its rating, genres and category.
#[utoipa::path(
    get,
    path = "/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 200, description = "Title", body = Title),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_title(
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> ApiResult<Json<Title>> {
    Ok(Json(load_title(state.repo.as_ref(), title_id).await?))
}

/// create_title
///
/// [Admin Route] Genres and category are referenced by slug; the response is the
/// read representation.
#[utoipa::path(
    post,
    path = "/titles",
    request_body = CreateTitleRequest,
    responses(
        (status = 201, description = "Created", body = Title),
        (status = 400, description = "Invalid payload or unknown slug"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_title(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Json(payload): Json<CreateTitleRequest>,
) -> ApiResult<(StatusCode, Json<Title>)> {
    POLICY.authorize(&method, requester.as_ref())?;
    let repo = state.repo.as_ref();

    let mut errors = payload.validate().err().unwrap_or_else(ValidationErrors::new);
    let category_id = match payload.category.as_deref().filter(|slug| !slug.trim().is_empty()) {
        Some(slug) => record(&mut errors, "category", resolve_category(repo, slug).await?),
        None => None,
    };
    let genre_ids = record(&mut errors, "genre", resolve_genres(repo, &payload.genre).await?);
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let title = repo
        .create_title(NewTitle {
            name: payload.name,
            year: payload.year.unwrap_or_default(),
            description: payload.description,
            category_id,
            genre_ids: genre_ids.unwrap_or_default(),
        })
        .await?;

    tracing::info!(title_id = title.id, name = %title.name, "title created");
    Ok((StatusCode::CREATED, Json(title)))
}

/// update_title
///
/// [Admin Route] Partial update. A `genre` list replaces the whole genre set.
#[utoipa::path(
    patch,
    path = "/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title id")),
    request_body = UpdateTitleRequest,
    responses(
        (status = 200, description = "Updated", body = Title),
        (status = 400, description = "Invalid payload or unknown slug"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_title(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
    Json(payload): Json<UpdateTitleRequest>,
) -> ApiResult<Json<Title>> {
    POLICY.authorize(&method, requester.as_ref())?;
    let repo = state.repo.as_ref();
    load_title(repo, title_id).await?;

    let mut errors = payload.validate().err().unwrap_or_else(ValidationErrors::new);
    let category_id = match payload.category.as_deref() {
        Some(slug) => record(&mut errors, "category", resolve_category(repo, slug).await?),
        None => None,
    };
    let genre_ids = match payload.genre.as_deref() {
        Some(slugs) => record(&mut errors, "genre", resolve_genres(repo, slugs).await?),
        None => None,
    };
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let changes = TitleChanges {
        name: payload.name,
        year: payload.year,
        description: payload.description,
        category_id,
        genre_ids,
    };
    let title = repo
        .update_title(title_id, changes)
        .await?
        .ok_or(ApiError::NotFound("title"))?;
    Ok(Json(title))
}

/// delete_title
///
/// [Admin Route] Removes the title with its reviews and their comments.
#[utoipa::path(
    delete,
    path = "/titles/{title_id}",
    params(("title_id" = i64, Path, description = "Title id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_title(
    method: Method,
    requester: Option<AuthUser>,
    State(state): State<AppState>,
    Path(title_id): Path<i64>,
) -> ApiResult<StatusCode> {
    POLICY.authorize(&method, requester.as_ref())?;
    if !state.repo.delete_title(title_id).await? {
        return Err(ApiError::NotFound("title"));
    }
    tracing::info!(title_id, "title deleted");
    Ok(StatusCode::NO_CONTENT)
}
