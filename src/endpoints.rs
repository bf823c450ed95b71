//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/v1/categories/{category_id}', use
//! [format_endpoint].

/// The route that reports whether the server is up.
pub const HEALTH_CHECK: &str = "/v1/healthcheck";
/// The route for registering users.
pub const USERS: &str = "/v1/users";
/// The route for activating a registered user.
pub const USERS_ACTIVATED: &str = "/v1/users/activated";
/// The route for logging in a user.
pub const AUTHENTICATION_TOKENS: &str = "/v1/tokens/authentication";
/// The route to list and create categories.
pub const CATEGORIES: &str = "/v1/categories";
/// The route to access a single category.
pub const CATEGORY: &str = "/v1/categories/{category_id}";
/// The route to list the transactions in a single category.
pub const CATEGORY_TRANSACTIONS: &str = "/v1/categories/{category_id}/transactions";
/// The route to list and create transactions.
pub const TRANSACTIONS: &str = "/v1/transactions";
/// The route to access a single transaction.
pub const TRANSACTION: &str = "/v1/transactions/{transaction_id}";

/// The route that reports the request counters.
pub const DEBUG_VARS: &str = "/debug/vars";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/v1/categories/{category_id}', '{category_id}' is the
/// parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_owned();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map_or(endpoint_path.len(), |end| param_start + end + 1);

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
