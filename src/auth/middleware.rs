//! Authentication middleware that validates the token cookie, loads the user and extends sessions.

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::header::SET_COOKIE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    auth::cookie::{extend_auth_cookie_duration_if_needed, get_token_from_cookies},
    store::StoreHandle,
    user::{User, get_user_by_id},
};

/// The state needed for the auth middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The handle used to load the authenticated user.
    pub store: StoreHandle,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            store: state.store.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AuthState> for Key {
    fn from_ref(state: &AuthState) -> Self {
        state.cookie_key.clone()
    }
}

/// Resolve the token in `jar` to a live, activated user.
fn authenticate(state: &AuthState, jar: &PrivateCookieJar) -> Result<User, Error> {
    let token = get_token_from_cookies(jar)?;

    if !token.is_valid_at(OffsetDateTime::now_utc()) {
        return Err(Error::Unauthenticated);
    }

    let user = state
        .store
        .run(|connection| get_user_by_id(token.user_id, connection))
        .map_err(|error| match error {
            Error::NotFound => Error::Unauthenticated,
            error => error,
        })?;

    if !user.activated {
        return Err(Error::InactiveAccount);
    }

    Ok(user)
}

/// Middleware function that checks for a valid auth token cookie belonging to an activated user.
///
/// The [User] is placed into the request extensions and the request executed normally if the
/// token is valid, otherwise a 401 (or 403 for an inactive account) error response is returned.
///
/// **Note**: Route handlers can use the function argument `Extension(user): Extension<User>` to
/// receive the user.
pub async fn auth_guard(State(state): State<AuthState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}.");
            return Error::Unauthenticated.into_response();
        }
    };

    let user = match authenticate(&state, &jar) {
        Ok(user) => user,
        Err(error) => return error.into_response(),
    };

    parts.extensions.insert(user);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    let (mut parts, body) = response.into_parts();
    let jar = match extend_auth_cookie_duration_if_needed(jar.clone(), state.cookie_duration) {
        Ok(updated_jar) => updated_jar,
        Err(err) => {
            tracing::error!("Error extending cookie duration: {err:?}. Rolling back cookie jar.");
            jar
        }
    };
    for (key, val) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, val.to_owned());
    }

    Response::from_parts(parts, body)
}
