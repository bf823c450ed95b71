#![allow(missing_docs)]

use axum::http::StatusCode;
use axum_extra::extract::cookie::Cookie;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::json;

use crate::{
    AppConfig, AppState, build_router, endpoints,
    auth::COOKIE_TOKEN,
    user::{NewUser, PasswordHash, User, get_user_by_email, insert_user, update_user},
};

/// The password every test user is registered with.
pub(crate) const TEST_PASSWORD: &str = "averysecurepassword";

const TEST_PASSWORD_COST: u32 = 4;

pub(crate) fn get_test_app_state() -> AppState {
    let mut config = AppConfig::new("foobar");
    config.password_cost = TEST_PASSWORD_COST;
    config.rate_limit.enabled = false;

    AppState::new(
        Connection::open_in_memory().expect("Could not open database in memory."),
        config,
    )
    .expect("Could not create app state.")
}

pub(crate) fn get_test_server(state: AppState) -> TestServer {
    TestServer::try_new(build_router(state)).expect("Could not create test server.")
}

#[track_caller]
pub(crate) fn create_inactive_user(state: &AppState, email: &str) -> User {
    let new_user = NewUser {
        name: "Test User".to_owned(),
        email: email.to_owned(),
        phone: "555-0100".to_owned(),
        activation_code: 123_456,
        password_hash: PasswordHash::new(TEST_PASSWORD, TEST_PASSWORD_COST)
            .expect("Could not hash test password."),
    };

    state
        .store
        .run(|connection| insert_user(new_user, connection))
        .expect("Could not create test user.")
}

#[track_caller]
pub(crate) fn create_activated_user(state: &AppState, email: &str) -> User {
    let mut user = create_inactive_user(state, email);
    user.activated = true;
    user.activation_code = 0;

    user.version = state
        .store
        .run(|connection| update_user(&user, connection))
        .expect("Could not activate test user.");

    user
}

#[track_caller]
pub(crate) fn get_activation_code(state: &AppState, email: &str) -> i64 {
    state
        .store
        .run(|connection| get_user_by_email(email, connection))
        .expect("Could not get test user.")
        .activation_code
}

/// Log in as the activated user `email` and return the auth cookie.
pub(crate) async fn log_in(server: &TestServer, email: &str) -> Cookie<'static> {
    let response = server
        .post(endpoints::AUTHENTICATION_TOKENS)
        .json(&json!({ "email": email, "password": TEST_PASSWORD }))
        .await;
    response.assert_status(StatusCode::CREATED);

    response.cookie(COOKIE_TOKEN)
}
