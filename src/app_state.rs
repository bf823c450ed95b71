//! Implements a struct that holds the state of the REST server.

use std::{
    sync::{Arc, Mutex},
    time::Duration as StdDuration,
};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error,
    auth::DEFAULT_COOKIE_DURATION,
    db::initialize,
    metrics::Metrics,
    pagination::PaginationConfig,
    rate_limit::{ClientRateLimiter, RateLimitConfig},
    store::{DEFAULT_STORE_TIMEOUT, StoreHandle},
    user::PasswordHash,
};

/// The settings the server is started with.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// The secret the cookie key is derived from.
    pub cookie_secret: String,
    /// How long a single store operation may run before it is interrupted.
    pub store_timeout: StdDuration,
    /// The bcrypt cost used to hash new passwords.
    pub password_cost: u32,
    /// The config that controls the default page and sort order of lists.
    pub pagination_config: PaginationConfig,
    /// The per client rate limit.
    pub rate_limit: RateLimitConfig,
    /// The origins browsers may send cross origin requests from, e.g. "https://app.example.com".
    pub trusted_origins: Vec<String>,
}

impl AppConfig {
    /// Create a config with the default timeout, hashing cost, pagination and rate limit, and no
    /// trusted origins.
    pub fn new(cookie_secret: &str) -> Self {
        Self {
            cookie_secret: cookie_secret.to_owned(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            password_cost: PasswordHash::DEFAULT_COST,
            pagination_config: PaginationConfig::default(),
            rate_limit: RateLimitConfig::default(),
            trusted_origins: Vec::new(),
        }
    }
}

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The config that controls the default page and sort order of lists.
    pub pagination_config: PaginationConfig,

    /// The bcrypt cost used to hash new passwords.
    pub password_cost: u32,

    /// The shared database connection.
    pub store: StoreHandle,

    /// The rate limiter shared by every request.
    pub rate_limiter: ClientRateLimiter,

    /// The origins allowed to make cross origin requests.
    pub trusted_origins: Vec<String>,

    /// The request counters served at `/debug/vars`.
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(db_connection: Connection, config: AppConfig) -> Result<Self, Error> {
        initialize(&db_connection)?;

        let connection = Arc::new(Mutex::new(db_connection));

        Ok(Self {
            cookie_key: create_cookie_key(&config.cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            pagination_config: config.pagination_config,
            password_cost: config.password_cost,
            store: StoreHandle::new(connection, config.store_timeout),
            rate_limiter: ClientRateLimiter::new(&config.rate_limit),
            trusted_origins: config.trusted_origins,
            metrics: Arc::default(),
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

impl FromRef<AppState> for StoreHandle {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Arc<Metrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}
