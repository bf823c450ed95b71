//! Route handlers shared by the category and transaction resources, plus the health check and
//! the fallbacks for unknown routes, unsupported methods and panics.

use std::any::Any;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode, header::CONNECTION},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    Error, database_id::DatabaseId, store::OwnedStore, user::User, validator::Validator,
};

/// Parse a record ID taken from the request path.
///
/// # Errors
///
/// Returns [Error::NotFound] if `raw_id` is not a positive integer, since no record could have
/// that ID.
pub fn parse_record_id(raw_id: &str) -> Result<DatabaseId, Error> {
    match raw_id.parse::<DatabaseId>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(Error::NotFound),
    }
}

/// The query parameters of a delete request.
#[derive(Debug, Default, Deserialize)]
pub struct VersionParams {
    version: Option<String>,
}

impl VersionParams {
    /// The version the client last saw.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] if the version is missing or not an integer.
    pub fn version(&self) -> Result<i64, Error> {
        let mut validator = Validator::new();

        let version = match self.version.as_deref() {
            None | Some("") => {
                validator.add_error("version", "must be provided");
                0
            }
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                validator.add_error("version", "must be an integer value");
                0
            }),
        };

        validator.finish()?;

        Ok(version)
    }
}

/// A route handler that soft deletes the record in the path if `?version=N` matches the stored
/// version.
pub async fn delete_record<S>(
    State(store): State<S>,
    Extension(user): Extension<User>,
    Path(raw_id): Path<String>,
    Query(params): Query<VersionParams>,
) -> Result<Json<Value>, Error>
where
    S: OwnedStore,
{
    let id = parse_record_id(&raw_id)?;
    let version = params.version()?;

    store.delete(id, user.id, version)?;

    Ok(Json(
        json!({ "message": format!("{} successfully deleted", S::RESOURCE) }),
    ))
}

/// A route handler that reports that the server is available.
pub async fn get_health_check() -> Json<Value> {
    Json(json!({ "status": "available", "version": env!("CARGO_PKG_VERSION") }))
}

/// The fallback handler for routes that do not exist.
pub async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "the requested resource could not be found" })),
    )
        .into_response()
}

/// The fallback handler for routes that exist but do not support the request method.
pub async fn get_405_method_not_allowed(method: Method) -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": format!("the {method} method is not supported for this resource")
        })),
    )
        .into_response()
}

/// Turn a panic in a handler into a generic `500 Internal Server Error`.
///
/// The connection is closed after the response is sent.
pub fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic payload");
    tracing::error!("a request handler panicked: {detail}");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(CONNECTION, "close")],
        Json(json!({
            "error": "the server encountered a problem and could not process your request"
        })),
    )
        .into_response()
}
