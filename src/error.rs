//! Defines the app level error type and its conversion to JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{ErrorCode, ffi};
use serde_json::{Value, json};

use crate::{category::CategoryId, validator::ValidationErrors};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// One or more fields in the request failed validation.
    ///
    /// The map is returned to the client verbatim.
    #[error("validation failed: {0:?}")]
    Validation(ValidationErrors),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The row exists but its version no longer matches the version the client submitted.
    ///
    /// The client should fetch the record again and retry with the current version.
    #[error("the record was modified by another request")]
    EditConflict,

    /// The user already has a category with the same name (ignoring case).
    #[error("a category with this name already exists")]
    DuplicateName,

    /// Another user is already registered with the email address.
    #[error("a user with this email address already exists")]
    DuplicateEmail,

    /// A transaction was submitted without a category.
    #[error("a category must be provided")]
    CategoryRequired,

    /// The category ID does not refer to a live category owned by the user.
    #[error("the category {0} does not exist")]
    InvalidCategory(CategoryId),

    /// No inactive user matches the submitted activation code and email address.
    #[error("invalid activation code or email")]
    InvalidActivationCode,

    /// The user provided an invalid combination of email and password.
    #[error("invalid authentication credentials")]
    InvalidCredentials,

    /// The request did not carry a valid, unexpired auth token.
    #[error("you must be authenticated to access this resource")]
    Unauthenticated,

    /// The user has not activated their account yet.
    #[error("your user account must be activated to access this resource")]
    InactiveAccount,

    /// The client sent more requests than its rate limit allows.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// A store operation did not finish before its deadline, or the database stayed busy.
    #[error("the database operation timed out")]
    Timeout,

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// There was an error formatting or parsing a date for the auth token.
    #[error("invalid auth token date: {0}")]
    InvalidDateFormat(String),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            rusqlite::Error::SqliteFailure(sql_error, Some(ref description))
                if sql_error.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    && description.contains("category") =>
            {
                Error::DuplicateName
            }
            rusqlite::Error::SqliteFailure(sql_error, Some(ref description))
                if sql_error.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                    && description.contains("email") =>
            {
                Error::DuplicateEmail
            }
            rusqlite::Error::SqliteFailure(sql_error, _)
                if matches!(
                    sql_error.code,
                    ErrorCode::OperationInterrupted | ErrorCode::DatabaseBusy
                ) =>
            {
                Error::Timeout
            }
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    fn status_and_body(&self) -> (StatusCode, Value) {
        match self {
            Error::Validation(errors) => (StatusCode::UNPROCESSABLE_ENTITY, json!(errors)),
            Error::DuplicateName => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "name": "a category with this name already exists" }),
            ),
            Error::DuplicateEmail => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "email": "a user with this email address already exists" }),
            ),
            Error::CategoryRequired => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "category": "must be provided" }),
            ),
            Error::InvalidCategory(category_id) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "category": format!("category {category_id} does not exist") }),
            ),
            Error::InvalidActivationCode => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({ "code": "invalid validation code or email" }),
            ),
            Error::NotFound => (StatusCode::NOT_FOUND, json!(self.to_string())),
            Error::EditConflict => (
                StatusCode::CONFLICT,
                json!("unable to update the record due to an edit conflict, please try again"),
            ),
            Error::InvalidCredentials | Error::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, json!(self.to_string()))
            }
            Error::InactiveAccount => (StatusCode::FORBIDDEN, json!(self.to_string())),
            Error::RateLimitExceeded => (StatusCode::TOO_MANY_REQUESTS, json!(self.to_string())),
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!("the server encountered a problem and could not process your request"),
                )
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();

        (status, Json(json!({ "error": body }))).into_response()
    }
}
