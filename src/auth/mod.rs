//! Cookie based authentication: logging in, the auth token and the auth guard middleware.

mod cookie;
mod log_in;
mod middleware;
mod token;

pub use cookie::{DEFAULT_COOKIE_DURATION, set_auth_cookie};
pub use log_in::post_log_in;
pub use middleware::{AuthState, auth_guard};
pub use token::Token;

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
