use std::{collections::BTreeMap, sync::LazyLock};

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

// serde reports nested failures with a path prefix such as `memberships[0]: `.
static MISSING_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"target type: (?:([A-Za-z_]\w*)\S*: )?missing field `(\w+)`")
        .expect("missing field pattern compiles")
});

/// Validation messages keyed by field name, rendered as `{"field": ["message", ...]}`.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was collected, otherwise a validation error.
    pub fn into_result(self) -> AppResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self))
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0:?}")]
    Validation(FieldErrors),
    #[error("{field}: invalid pk \"{id}\"")]
    Reference { field: &'static str, id: String },
    #[error("Not found.")]
    NotFound,
    #[error("Invalid page.")]
    InvalidPage,
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("{0}")]
    Protected(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            AppError::Reference { field, id } => (
                StatusCode::BAD_REQUEST,
                Json(FieldErrors::single(
                    field,
                    format!("Invalid pk \"{id}\" - object does not exist."),
                )),
            )
                .into_response(),
            AppError::NotFound | AppError::InvalidPage => detail(StatusCode::NOT_FOUND, &self),
            AppError::Unauthenticated | AppError::InvalidToken => {
                detail(StatusCode::UNAUTHORIZED, &self)
            }
            AppError::Forbidden => detail(StatusCode::FORBIDDEN, &self),
            AppError::Protected(_) | AppError::Conflict(_) => detail(StatusCode::CONFLICT, &self),
            AppError::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Something went wrong: {}", err),
                )
                    .into_response()
            }
        }
    }
}

fn detail(status: StatusCode, err: &AppError) -> Response {
    (status, Json(json!({ "detail": err.to_string() }))).into_response()
}

// Constraint failures raised by SQLite become domain errors, the rest is internal.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let message = db_err.message();
            if message.contains("FOREIGN KEY constraint failed") {
                return Self::Protected(
                    "Cannot modify this record because it is referenced by other records."
                        .to_string(),
                );
            }
            if message.contains("UNIQUE constraint failed") {
                return Self::Conflict(format!("Duplicate value: {}", message));
            }
        }
        Self::Internal(err.into())
    }
}

/// The top-level field a "missing field" rejection belongs to.
fn missing_field(text: &str) -> Option<&str> {
    let caps = MISSING_FIELD.captures(text)?;
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        let text = rejection.body_text();
        match missing_field(&text) {
            Some(field) => Self::Validation(FieldErrors::single(field, "This field is required.")),
            None => Self::Validation(FieldErrors::single("non_field_errors", text)),
        }
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Internal(err.into())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Internal(err.into())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_field_errors_collect_per_field() {
        let mut errors = FieldErrors::new();
        errors.add("name", "This field may not be blank.");
        errors.add("name", "Ensure this field has no more than 64 characters.");
        errors.add("town", "Ensure this field has no more than 64 characters.");

        assert_eq!(errors.get("name").map(<[String]>::len), Some(2));
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "name": [
                    "This field may not be blank.",
                    "Ensure this field has no more than 64 characters."
                ],
                "town": ["Ensure this field has no more than 64 characters."]
            })
        );
    }

    #[test]
    fn test_empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
        assert!(matches!(
            FieldErrors::single("name", "bad").into_result(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_field() {
        assert_eq!(
            missing_field(
                "Failed to deserialize the JSON body into the target type: missing field `name` at line 1 column 15"
            ),
            Some("name")
        );
        assert_eq!(
            missing_field(
                "Failed to deserialize the JSON body into the target type: memberships[0]: missing field `archer` at line 1 column 40"
            ),
            Some("memberships")
        );
        assert_eq!(
            missing_field(
                "Failed to deserialize the JSON body into the target type: union_number: invalid type: string \"x\", expected i64 at line 1 column 20"
            ),
            None
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Protected("in use".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Reference {
                field: "memberships",
                id: "x".into()
            }
            .into_response()
            .status(),
            StatusCode::BAD_REQUEST
        );
    }
}
