//! Field checks shared by the create and update payloads.

use std::sync::LazyLock;

use axum::{extract::FromRequest, Json};
use regex::Regex;
use uuid::Uuid;

use crate::error::{AppError, AppResult, FieldErrors};

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^\s/?#]+\.[^\s/?#]+(?:[/?#]\S*)?$").expect("url pattern compiles")
});

/// JSON body extractor whose rejections come back as field errors.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub fn required(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if value.trim().is_empty() {
        errors.add(field, "This field may not be blank.");
    } else {
        max_length(errors, field, value, max_len);
    }
}

pub fn optional(errors: &mut FieldErrors, field: &str, value: Option<&str>, max_len: usize) {
    if let Some(value) = value {
        max_length(errors, field, value, max_len);
    }
}

pub fn max_length(errors: &mut FieldErrors, field: &str, value: &str, max_len: usize) {
    if value.chars().count() > max_len {
        errors.add(
            field,
            format!("Ensure this field has no more than {max_len} characters."),
        );
    }
}

pub fn email(errors: &mut FieldErrors, field: &str, value: Option<&str>, max_len: usize) {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return;
    };
    if !EMAIL.is_match(value) {
        errors.add(field, "Enter a valid email address.");
    }
    max_length(errors, field, value, max_len);
}

pub fn url(errors: &mut FieldErrors, field: &str, value: Option<&str>, max_len: usize) {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return;
    };
    if !URL.is_match(value) {
        errors.add(field, "Enter a valid URL.");
    }
    max_length(errors, field, value, max_len);
}

pub fn non_negative(errors: &mut FieldErrors, field: &str, value: Option<i64>) {
    if value.is_some_and(|v| v < 0) {
        errors.add(field, "Ensure this value is greater than or equal to 0.");
    }
}

/// Apply one nullable field of a partial update: absent keeps, `null` clears.
pub fn patch_field<T>(field: &mut Option<T>, patch: Option<Option<T>>) {
    if let Some(value) = patch {
        *field = value;
    }
}

/// A path id that is not a UUID can never name a record.
pub fn parse_id(raw: &str) -> AppResult<String> {
    Uuid::parse_str(raw)
        .map(|id| id.hyphenated().to_string())
        .map_err(|_| AppError::NotFound)
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
