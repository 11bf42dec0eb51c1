use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::{self, ScoreRange};

// --- Accounts ---

/// Role
///
/// The RBAC field on every user record. Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(Role::User),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// ConfirmationState
///
/// The one-time sign-up code. `Consumed` covers both "never issued" and "already
/// exchanged"; it is stored as SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConfirmationState {
    #[default]
    Consumed,
    Issued(String),
}

impl ConfirmationState {
    /// True only for a live code equal to `candidate`.
    pub fn accepts(&self, candidate: &str) -> bool {
        matches!(self, ConfirmationState::Issued(code) if code == candidate)
    }
}

impl From<Option<String>> for ConfirmationState {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(code) if !code.trim().is_empty() => ConfirmationState::Issued(code),
            _ => ConfirmationState::Consumed,
        }
    }
}

/// User
///
/// A row of the `users` table. Serializes to the public profile shape; the id, the
/// superuser flag and the confirmation code never leave the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    #[serde(skip)]
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[serde(skip)]
    pub is_superuser: bool,
    #[serde(skip)]
    #[sqlx(rename = "confirmation_code")]
    #[sqlx(try_from = "Option<String>")]
    pub confirmation: ConfirmationState,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_superuser
    }

    pub fn is_moderator(&self) -> bool {
        self.role == Role::Moderator
    }
}

/// NewUser
///
/// Insert payload for a user record. Used by the admin endpoint and by sign-up.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub role: Role,
}

/// UserChanges
///
/// Partial update of a user record; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

// --- Taxonomy (categories and genres) ---

/// TaxonomyKind
///
/// Categories and genres share one shape and one storage surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyKind {
    Category,
    Genre,
}

impl TaxonomyKind {
    /// Human-readable entity name used in error messages.
    pub fn noun(self) -> &'static str {
        match self {
            TaxonomyKind::Category => "category",
            TaxonomyKind::Genre => "genre",
        }
    }
}

/// TaxonomyEntry
///
/// A category or genre: a display name plus a unique slug used in URLs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct TaxonomyEntry {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

// --- Titles ---

/// Title
///
/// Read representation of a title. `rating` is the mean review score, computed at query
/// time and `null` while the title has no reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genre: Vec<TaxonomyEntry>,
    pub category: Option<TaxonomyEntry>,
}

/// NewTitle
///
/// Insert payload with category and genres already resolved from slugs to ids.
#[derive(Debug, Clone, Default)]
pub struct NewTitle {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub genre_ids: Vec<i64>,
}

/// TitleChanges
///
/// Partial update; `genre_ids: Some(..)` replaces the whole genre set.
#[derive(Debug, Clone, Default)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i32>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub category_id: Option<i64>,
    pub genre_ids: Option<Vec<i64>>,
}

/// TitleFilter
///
/// Query parameters accepted by the title listing.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct TitleFilter {
    /// Genre slug.
    pub genre: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    /// Exact release year.
    pub year: Option<i32>,
    /// Case-insensitive substring of the title name.
    pub name: Option<String>,
}

/// SearchQuery
///
/// `?search=` on users, categories and genres.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct SearchQuery {
    pub search: Option<String>,
}

// --- Reviews & comments ---

/// Review
///
/// A user's scored review of a title; `author` is the author's username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Review {
    pub id: i64,
    #[serde(rename = "title")]
    pub title_id: i64,
    pub author: String,
    #[serde(skip)]
    pub author_id: i64,
    pub text: String,
    pub score: i32,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub title_id: i64,
    pub author_id: i64,
    pub text: String,
    pub score: i32,
}

/// Comment
///
/// A reply to a review; `author` is the author's username.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    #[serde(rename = "review")]
    pub review_id: i64,
    pub author: String,
    #[serde(skip)]
    pub author_id: i64,
    pub text: String,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub review_id: i64,
    pub author_id: i64,
    pub text: String,
}

// --- Request Payloads (Input Schemas) ---
//
// String fields default to empty so a missing field surfaces as a 400 with
// "This field is required." instead of a deserialization rejection. Field rules are
// declared with `validator` attributes and checked by the handlers via `validate()`.

/// SignUpRequest
///
/// Input payload for POST /auth/signup. Echoed back on success.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[ts(export)]
pub struct SignUpRequest {
    #[serde(default)]
    #[validate(
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        custom(function = "validation::validate_email")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validation::validate_username")
    )]
    pub username: String,
}

/// TokenRequest
///
/// Input payload for POST /auth/token. The username obeys the same rules as at sign-up.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[ts(export)]
pub struct TokenRequest {
    #[serde(default)]
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validation::validate_username")
    )]
    pub username: String,
    #[serde(default)]
    #[validate(custom(function = "validation::not_blank"))]
    pub confirmation_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub access_token: String,
}

/// CreateUserRequest
///
/// Admin payload for POST /users.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[ts(export)]
pub struct CreateUserRequest {
    #[serde(default)]
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validation::validate_username")
    )]
    pub username: String,
    #[serde(default)]
    #[validate(
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        custom(function = "validation::validate_email")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: String,
    #[serde(default)]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub role: Role,
}

/// UpdateUserRequest
///
/// Partial update payload for PATCH /users/{username} and PATCH /users/me. The `role`
/// field is ignored on the self-service route. Absent fields are not validated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(
        length(max = 150, message = "Ensure this field has no more than 150 characters."),
        custom(function = "validation::validate_username")
    )]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        custom(function = "validation::validate_email")
    )]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// TaxonomyRequest
///
/// Input payload for POST /categories and POST /genres.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[ts(export)]
pub struct TaxonomyRequest {
    #[serde(default)]
    #[validate(
        length(max = 256, message = "Ensure this field has no more than 256 characters."),
        custom(function = "validation::not_blank")
    )]
    pub name: String,
    #[serde(default)]
    #[validate(
        length(max = 50, message = "Ensure this field has no more than 50 characters."),
        custom(function = "validation::validate_slug")
    )]
    pub slug: String,
}

/// CreateTitleRequest
///
/// Input payload for POST /titles. Genres and category are referenced by slug; their
/// existence is checked by the handler after these field rules pass.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[ts(export)]
pub struct CreateTitleRequest {
    #[serde(default)]
    #[validate(
        length(max = 256, message = "Ensure this field has no more than 256 characters."),
        custom(function = "validation::not_blank")
    )]
    pub name: String,
    #[validate(
        required(message = "This field is required."),
        custom(function = "validation::validate_year")
    )]
    pub year: Option<i32>,
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Vec<String>,
    #[validate(
        required(message = "This field is required."),
        custom(function = "validation::not_blank")
    )]
    pub category: Option<String>,
}

/// UpdateTitleRequest
///
/// Partial update payload for PATCH /titles/{title_id}. `description: null` clears the
/// description; an absent key leaves it unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[ts(export)]
pub struct UpdateTitleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(
        length(max = 256, message = "Ensure this field has no more than 256 characters."),
        custom(function = "validation::not_blank")
    )]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validation::validate_year"))]
    pub year: Option<i32>,
    #[serde(
        default,
        deserialize_with = "present_or_null",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    #[ts(type = "string | null")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Distinguishes an explicit `null` (`Some(None)`) from a missing key (`None`).
fn present_or_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// CreateReviewRequest
///
/// Input payload for POST /titles/{title_id}/reviews. The score range comes from
/// configuration and is passed as validation context.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[validate(context = ScoreRange)]
#[ts(export)]
pub struct CreateReviewRequest {
    #[serde(default)]
    #[validate(custom(function = "validation::not_blank"))]
    pub text: String,
    #[validate(
        required(message = "This field is required."),
        custom(function = "validation::validate_score", use_context)
    )]
    pub score: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[validate(context = ScoreRange)]
#[ts(export)]
pub struct UpdateReviewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validation::not_blank"))]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validation::validate_score", use_context))]
    pub score: Option<i32>,
}

/// CommentRequest
///
/// Input payload for creating or editing a comment.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, Validate)]
#[ts(export)]
pub struct CommentRequest {
    #[serde(default)]
    #[validate(custom(function = "validation::not_blank"))]
    pub text: String,
}
