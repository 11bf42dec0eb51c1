//! Custom field rules plugged into the `#[derive(Validate)]` request payloads.
//!
//! Length limits live on the payloads as `length` attributes; the functions here cover
//! what the built-in validators cannot express. Each error carries the human-readable
//! message that ends up in the 400 body under the offending field.

use std::{borrow::Cow, sync::LazyLock};

use chrono::{Datelike, Utc};
use regex::Regex;
use validator::{ValidateEmail, ValidationError};

/// Literal username reserved for the self-service profile route.
pub const RESERVED_USERNAME: &str = "me";

pub const REQUIRED: &str = "This field is required.";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));
static USERNAME_CHAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\w.@+-]").expect("username char pattern is valid"));
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern is valid"));

/// Inclusive score bounds, passed as validation context to review payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreRange {
    pub min: i32,
    pub max: i32,
}

/// Builds a field error with its display message.
pub fn invalid(code: &'static str, message: impl Into<Cow<'static, str>>) -> ValidationError {
    ValidationError::new(code).with_message(message.into())
}

fn required() -> ValidationError {
    invalid("required", REQUIRED)
}

/// Blank (empty or whitespace-only) strings count as missing.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(required());
    }
    Ok(())
}

/// Rejects the reserved name and any character outside `[\w.@+-]`.
/// The message lists each offending character once, in order of appearance.
pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(required());
    }
    if value == RESERVED_USERNAME {
        return Err(invalid(
            "reserved_username",
            format!("Username '{RESERVED_USERNAME}' is not allowed."),
        ));
    }
    if !USERNAME_RE.is_match(value) {
        return Err(invalid(
            "forbidden_characters",
            format!(
                "Username contains forbidden characters: {}",
                forbidden_username_chars(value)
            ),
        ));
    }
    Ok(())
}

/// Characters of `value` that the username pattern does not allow, deduplicated.
pub fn forbidden_username_chars(value: &str) -> String {
    let leftover = USERNAME_CHAR_RE.replace_all(value, "");
    let mut seen = String::new();
    for ch in leftover.chars() {
        if !seen.contains(ch) {
            seen.push(ch);
        }
    }
    seen
}

/// Required, then RFC-shaped.
pub fn validate_email(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(required());
    }
    if !value.validate_email() {
        return Err(invalid("email", "Enter a valid email address."));
    }
    Ok(())
}

pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(required());
    }
    if !SLUG_RE.is_match(value) {
        return Err(invalid(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        ));
    }
    Ok(())
}

/// Release years may not be negative or lie in the future.
pub fn validate_year(value: impl std::borrow::Borrow<i32>) -> Result<(), ValidationError> {
    let value = value.borrow();
    if *value < 0 {
        return Err(invalid("year", "Year must not be negative."));
    }
    if *value > Utc::now().year() {
        return Err(invalid(
            "year",
            "Year must not be greater than the current year.",
        ));
    }
    Ok(())
}

pub fn validate_score(
    value: impl std::borrow::Borrow<i32>,
    range: &ScoreRange,
) -> Result<(), ValidationError> {
    let value = value.borrow();
    if *value < range.min || *value > range.max {
        return Err(invalid(
            "score",
            format!("Score must be between {} and {}.", range.min, range.max),
        ));
    }
    Ok(())
}
