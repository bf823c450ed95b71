//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router,
    extract::FromRef,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer};

use crate::{
    AppState,
    auth::{AuthState, auth_guard, post_log_in},
    category::{
        SQLiteCategoryStore, create_category, get_category_endpoint, list_categories,
        update_category_endpoint,
    },
    endpoints,
    handlers::{
        delete_record, get_404_not_found, get_405_method_not_allowed, get_health_check,
        handle_panic,
    },
    logging::logging_middleware,
    metrics::{get_debug_vars, metrics_middleware},
    rate_limit::rate_limit_middleware,
    transaction::{
        SQLiteTransactionStore, create_transaction, get_transaction_endpoint,
        list_category_transactions, list_transactions, update_transaction_endpoint,
    },
    user::{activate_user, register_user},
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::HEALTH_CHECK, get(get_health_check))
        .route(endpoints::USERS, post(register_user))
        .route(endpoints::USERS_ACTIVATED, put(activate_user))
        .route(endpoints::AUTHENTICATION_TOKENS, post(post_log_in))
        .route(endpoints::DEBUG_VARS, get(get_debug_vars));

    let protected_routes = Router::new()
        .route(
            endpoints::CATEGORIES,
            get(list_categories).post(create_category),
        )
        .route(
            endpoints::CATEGORY,
            get(get_category_endpoint)
                .put(update_category_endpoint)
                .delete(delete_record::<SQLiteCategoryStore>),
        )
        .route(
            endpoints::CATEGORY_TRANSACTIONS,
            get(list_category_transactions),
        )
        .route(
            endpoints::TRANSACTIONS,
            get(list_transactions).post(create_transaction),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_record::<SQLiteTransactionStore>),
        )
        .route_layer(middleware::from_fn_with_state(
            AuthState::from_ref(&state),
            auth_guard,
        ));

    let router = protected_routes
        .merge(unprotected_routes)
        .method_not_allowed_fallback(get_405_method_not_allowed)
        .fallback(get_404_not_found);

    add_middleware(router, state)
}

/// Wrap `router` in the middleware every request passes through.
///
/// From the outside in: metrics, panic recovery, CORS, rate limiting and logging.
fn add_middleware(router: Router<AppState>, state: AppState) -> Router {
    router
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors_layer(&state.trusted_origins))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics_middleware,
        ))
        .with_state(state)
}

/// Allow credentialed cross origin requests from `trusted_origins` only.
///
/// Origins that are not valid header values are skipped.
fn cors_layer(trusted_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = trusted_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(origin) => Some(origin),
            Err(_) => {
                tracing::warn!("ignoring invalid trusted origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[cfg(test)]
mod routing_tests {
    use axum::{
        Router,
        http::{HeaderName, HeaderValue, Method, StatusCode, header},
        routing::get,
    };
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};

    use crate::{
        AppConfig, AppState, RateLimitConfig, endpoints,
        test_utils::{get_test_app_state, get_test_server},
    };

    use super::add_middleware;

    const TRUSTED_ORIGIN: &str = "https://app.example.com";

    fn get_state_with(config: impl FnOnce(&mut AppConfig)) -> AppState {
        let mut app_config = AppConfig::new("foobar");
        app_config.rate_limit.enabled = false;
        config(&mut app_config);

        AppState::new(Connection::open_in_memory().unwrap(), app_config).unwrap()
    }

    #[tokio::test]
    async fn unsupported_method_is_json_method_not_allowed() {
        let server = get_test_server(get_test_app_state());

        let response = server.delete(endpoints::HEALTH_CHECK).await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.json::<Value>(),
            json!({ "error": "the DELETE method is not supported for this resource" })
        );
    }

    #[tokio::test]
    async fn client_over_rate_limit_is_rejected() {
        let state = get_state_with(|config| {
            config.rate_limit = RateLimitConfig {
                enabled: true,
                requests_per_second: 1,
                burst: 2,
            };
        });
        let server = get_test_server(state);

        server.get(endpoints::HEALTH_CHECK).await.assert_status_ok();
        server.get(endpoints::HEALTH_CHECK).await.assert_status_ok();
        let response = server.get(endpoints::HEALTH_CHECK).await;

        response.assert_status(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.json::<Value>(),
            json!({ "error": "rate limit exceeded" })
        );

        server
            .get(endpoints::HEALTH_CHECK)
            .add_header(
                HeaderName::from_static("x-forwarded-for"),
                HeaderValue::from_static("203.0.113.7"),
            )
            .await
            .assert_status_ok();
    }

    #[tokio::test]
    async fn trusted_origin_is_allowed() {
        let state = get_state_with(|config| {
            config.trusted_origins = vec![TRUSTED_ORIGIN.to_owned()];
        });
        let server = get_test_server(state);

        let response = server
            .get(endpoints::HEALTH_CHECK)
            .add_header(header::ORIGIN, HeaderValue::from_static(TRUSTED_ORIGIN))
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            TRUSTED_ORIGIN
        );
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_CREDENTIALS),
            "true"
        );
    }

    #[tokio::test]
    async fn untrusted_origin_gets_no_cors_headers() {
        let state = get_state_with(|config| {
            config.trusted_origins = vec![TRUSTED_ORIGIN.to_owned()];
        });
        let server = get_test_server(state);

        let response = server
            .get(endpoints::HEALTH_CHECK)
            .add_header(
                header::ORIGIN,
                HeaderValue::from_static("https://evil.example.com"),
            )
            .await;

        response.assert_status_ok();
        assert!(
            response
                .headers()
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .is_none()
        );
    }

    #[tokio::test]
    async fn preflight_lists_allowed_methods() {
        let state = get_state_with(|config| {
            config.trusted_origins = vec![TRUSTED_ORIGIN.to_owned()];
        });
        let server = get_test_server(state);

        let response = server
            .method(Method::OPTIONS, endpoints::CATEGORIES)
            .add_header(header::ORIGIN, HeaderValue::from_static(TRUSTED_ORIGIN))
            .add_header(
                header::ACCESS_CONTROL_REQUEST_METHOD,
                HeaderValue::from_static("PUT"),
            )
            .await;

        response.assert_status_ok();
        assert_eq!(
            response.header(header::ACCESS_CONTROL_ALLOW_ORIGIN),
            TRUSTED_ORIGIN
        );
        let methods = response.header(header::ACCESS_CONTROL_ALLOW_METHODS);
        assert!(methods.to_str().unwrap().contains("PUT"), "{methods:?}");
    }

    async fn failing_handler() -> &'static str {
        panic!("handler failed")
    }

    #[tokio::test]
    async fn panicking_handler_is_json_internal_server_error() {
        let state = get_test_app_state();
        let router = Router::<AppState>::new().route("/panic", get(failing_handler));
        let server = TestServer::try_new(add_middleware(router, state)).unwrap();

        let response = server.get("/panic").await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.header(header::CONNECTION), "close");
        assert_eq!(
            response.json::<Value>(),
            json!({ "error": "the server encountered a problem and could not process your request" })
        );
    }

    #[tokio::test]
    async fn debug_vars_counts_requests() {
        let server = get_test_server(get_test_app_state());

        server.get(endpoints::HEALTH_CHECK).await.assert_status_ok();
        server
            .get("/v1/budgets")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let response = server.get(endpoints::DEBUG_VARS).await;

        response.assert_status_ok();
        let body = response.json::<Value>();
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(
            body["metrics"],
            json!({
                "total_requests_received": 3,
                "total_responses_sent": 2,
                "total_processing_time_us": body["metrics"]["total_processing_time_us"],
                "total_responses_sent_by_status": { "200": 1, "404": 1 },
            })
        );
    }

    #[tokio::test]
    async fn health_check_is_available() {
        let server = get_test_server(get_test_app_state());

        let response = server.get(endpoints::HEALTH_CHECK).await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["status"], "available");
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let server = get_test_server(get_test_app_state());

        let response = server.get("/v1/budgets").await;

        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(
            response.json::<Value>(),
            json!({ "error": "the requested resource could not be found" })
        );
    }

    #[tokio::test]
    async fn protected_routes_require_authentication() {
        let server = get_test_server(get_test_app_state());

        for path in [
            endpoints::CATEGORIES,
            endpoints::TRANSACTIONS,
            "/v1/categories/1",
            "/v1/categories/1/transactions",
            "/v1/transactions/1",
        ] {
            server
                .get(path)
                .await
                .assert_status(StatusCode::UNAUTHORIZED);
        }
    }
}
