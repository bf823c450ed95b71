//! The endpoint that exchanges an email address and password for an auth cookie.

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use serde::Deserialize;
use serde_json::json;
use time::Duration;

use crate::{
    AppState, Error,
    auth::set_auth_cookie,
    store::StoreHandle,
    user::{get_user_by_email, validate_email, validate_password_plaintext},
    validator::Validator,
};

/// The state needed to log in a user.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The handle used to look up the user.
    pub store: StoreHandle,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            store: state.store.clone(),
        }
    }
}

impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The credentials submitted to log in.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Email entered during log-in.
    pub email: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests.
///
/// On success the auth token is set as a private cookie and its expiry is echoed in the body.
///
/// # Errors
///
/// This function will return an error in a few situations.
/// - The email or password is malformed.
/// - The email does not belong to a registered user.
/// - The password is not correct.
/// - An internal error occurred when verifying the password.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, Error> {
    let mut validator = Validator::new();
    validate_email(&mut validator, &credentials.email);
    validate_password_plaintext(&mut validator, &credentials.password);
    validator.finish()?;

    let user = state
        .store
        .run(|connection| get_user_by_email(&credentials.email, connection))
        .map_err(|error| match error {
            Error::NotFound => Error::InvalidCredentials,
            error => error,
        })?;

    if !user.password_hash.verify(&credentials.password)? {
        return Err(Error::InvalidCredentials);
    }

    let (jar, token) = set_auth_cookie(jar, user.id, state.cookie_duration)?;
    let expires_at = token
        .expires_at
        .format(&time::format_description::well_known::Rfc3339)
        .map_err(|error| Error::InvalidDateFormat(error.to_string()))?;

    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({ "authentication_token": { "expires_at": expires_at } })),
    ))
}

#[cfg(test)]
mod log_in_tests {
    use axum::http::StatusCode;
    use serde_json::{Value, json};

    use crate::{
        auth::COOKIE_TOKEN,
        endpoints,
        test_utils::{TEST_PASSWORD, create_activated_user, get_test_app_state, get_test_server},
    };

    #[tokio::test]
    async fn log_in_succeeds_with_valid_credentials() {
        let state = get_test_app_state();
        create_activated_user(&state, "alice@example.com");
        let server = get_test_server(state);

        let response = server
            .post(endpoints::AUTHENTICATION_TOKENS)
            .json(&json!({ "email": "alice@example.com", "password": TEST_PASSWORD }))
            .await;

        response.assert_status(StatusCode::CREATED);
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_some());
        assert!(
            response.json::<Value>()["authentication_token"]["expires_at"].is_string()
        );
    }

    #[tokio::test]
    async fn log_in_fails_with_wrong_password() {
        let state = get_test_app_state();
        create_activated_user(&state, "alice@example.com");
        let server = get_test_server(state);

        let response = server
            .post(endpoints::AUTHENTICATION_TOKENS)
            .json(&json!({ "email": "alice@example.com", "password": "notthepassword" }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        assert!(response.maybe_cookie(COOKIE_TOKEN).is_none());
    }

    #[tokio::test]
    async fn log_in_fails_with_unknown_email() {
        let server = get_test_server(get_test_app_state());

        let response = server
            .post(endpoints::AUTHENTICATION_TOKENS)
            .json(&json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }))
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn log_in_validates_credentials() {
        let server = get_test_server(get_test_app_state());

        let response = server
            .post(endpoints::AUTHENTICATION_TOKENS)
            .json(&json!({ "email": "", "password": "" }))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            response.json::<Value>(),
            json!({ "error": { "email": "must be provided", "password": "must be provided" } })
        );
    }
}
