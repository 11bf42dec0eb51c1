use async_trait::async_trait;
use std::sync::Arc;

use crate::models::{
    Comment, NewComment, NewReview, NewTitle, NewUser, Review, TaxonomyEntry, TaxonomyKind,
    Title, TitleChanges, TitleFilter, User, UserChanges,
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// Names of the unique constraints declared in `migrations/`. Both backends report
/// violations by these names so callers can tell which field collided.
pub mod constraints {
    pub const USERS_EMAIL: &str = "users_email_key";
    pub const USERS_USERNAME: &str = "users_username_key";
    pub const USERS_USERNAME_EMAIL: &str = "users_username_email_key";
    pub const CATEGORIES_SLUG: &str = "categories_slug_key";
    pub const GENRES_SLUG: &str = "genres_slug_key";
    pub const REVIEWS_TITLE_AUTHOR: &str = "reviews_title_author_key";
}

/// RepoError
///
/// Persistence failures. Unique violations are surfaced separately so the request layer
/// can turn them into field-level 400 responses.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("unique constraint `{0}` violated")]
    UniqueViolation(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for RepoError {
    /// Postgres reports unique violations as SQLSTATE 23505 with the constraint name attached.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.code().as_deref() == Some("23505")
            && let Some(constraint) = db_err.constraint()
        {
            return RepoError::UniqueViolation(constraint.to_string());
        }
        RepoError::Database(err)
    }
}

impl RepoError {
    /// The violated constraint, if this is a unique violation.
    pub fn constraint(&self) -> Option<&str> {
        match self {
            RepoError::UniqueViolation(name) => Some(name),
            RepoError::Database(_) => None,
        }
    }
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, so handlers never know
/// whether they talk to Postgres or to the in-memory store.
///
/// Deletion semantics are part of the contract: deleting a title or a user cascades to its
/// reviews (and their comments), deleting a review cascades to its comments, deleting a
/// category nulls `Title.category`, deleting a genre drops it from every title's genre list.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Ordered by id. `search` is a case-insensitive substring of the username.
    async fn list_users(&self, search: Option<&str>) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    /// Returns the user with exactly this `(email, username)` pair, inserting it when absent.
    async fn get_or_create_user(&self, email: &str, username: &str) -> RepoResult<User>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;

    // --- Confirmation codes ---
    async fn set_confirmation_code(&self, user_id: i64, code: &str) -> RepoResult<()>;
    /// Compare-and-swap: clears the stored code only if it still equals `code`.
    /// Returns false when no live code matched, which includes losing a concurrent race.
    async fn consume_confirmation_code(&self, user_id: i64, code: &str) -> RepoResult<bool>;

    // --- Categories & genres ---
    /// Newest first. `search` is a case-insensitive substring of the name.
    async fn list_taxonomy(
        &self,
        kind: TaxonomyKind,
        search: Option<&str>,
    ) -> RepoResult<Vec<TaxonomyEntry>>;
    async fn get_taxonomy_by_slug(
        &self,
        kind: TaxonomyKind,
        slug: &str,
    ) -> RepoResult<Option<TaxonomyEntry>>;
    async fn create_taxonomy(
        &self,
        kind: TaxonomyKind,
        name: &str,
        slug: &str,
    ) -> RepoResult<TaxonomyEntry>;
    async fn delete_taxonomy(&self, kind: TaxonomyKind, slug: &str) -> RepoResult<bool>;

    // --- Titles ---
    /// Ordered by name, each annotated with its current rating.
    async fn list_titles(&self, filter: &TitleFilter) -> RepoResult<Vec<Title>>;
    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>>;
    async fn create_title(&self, title: NewTitle) -> RepoResult<Title>;
    async fn update_title(&self, id: i64, changes: TitleChanges) -> RepoResult<Option<Title>>;
    async fn delete_title(&self, id: i64) -> RepoResult<bool>;

    // --- Reviews ---
    /// Newest first.
    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<Review>>;
    /// Only finds the review if it belongs to `title_id`.
    async fn get_review(&self, title_id: i64, review_id: i64) -> RepoResult<Option<Review>>;
    async fn create_review(&self, review: NewReview) -> RepoResult<Review>;
    async fn update_review(
        &self,
        review_id: i64,
        text: Option<String>,
        score: Option<i32>,
    ) -> RepoResult<Option<Review>>;
    async fn delete_review(&self, review_id: i64) -> RepoResult<bool>;

    // --- Comments ---
    /// Newest first.
    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>>;
    /// Only finds the comment if it belongs to `review_id`.
    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>>;
    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment>;
    async fn update_comment(&self, comment_id: i64, text: String) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, comment_id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the application state.
pub type RepositoryState = Arc<dyn Repository>;
