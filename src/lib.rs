//! Spendwise is the backend for a personal finance app.
//!
//! This library provides a JSON REST API where users register, log in, and keep track of the
//! money they earn and spend in categories they define. Categories and transactions are
//! paginated, protected with optimistic concurrency and soft deleted.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod app_state;
mod auth;
mod category;
mod database_id;
mod db;
mod endpoints;
mod error;
mod handlers;
mod logging;
mod metrics;
mod pagination;
mod rate_limit;
mod routing;
mod store;
mod transaction;
mod user;
mod validator;

#[cfg(test)]
mod test_utils;

pub use app_state::{AppConfig, AppState, create_cookie_key};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, MAX_REQUEST_BODY_BYTES, logging_middleware};
pub use pagination::PaginationConfig;
pub use rate_limit::{ClientRateLimiter, RateLimitConfig};
pub use routing::build_router;
pub use user::{
    NewUser, PasswordHash, User, UserID, delete_user, get_user_by_email, get_user_by_id,
    insert_user, update_user,
};

const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("failed to install signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
        },
    }
}
