use std::{env, net::SocketAddr, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use spendwise_rs::{AppConfig, AppState, RateLimitConfig, build_router, graceful_shutdown};

/// The REST API server for spendwise_rs.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// How long a single database operation may run, in milliseconds.
    #[arg(long, default_value_t = 3000)]
    store_timeout_ms: u64,

    /// The log filter used when `RUST_LOG` is not set, e.g. "info" or "spendwise_rs=debug".
    #[arg(long, default_value = "info")]
    log_level: String,

    /// The number of requests per second each client may sustain.
    #[arg(long, default_value_t = 2)]
    limiter_rps: u32,

    /// The number of requests each client may make in a single burst.
    #[arg(long, default_value_t = 4)]
    limiter_burst: u32,

    /// Whether to rate limit clients.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    limiter_enabled: bool,

    /// Space separated origins that may make cross origin requests.
    #[arg(long, value_delimiter = ' ', num_args = 0..)]
    cors_trusted_origins: Vec<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(&args.log_level);

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let secret = env::var("SECRET").expect("The environment variable 'SECRET' must be set");

    let conn = Connection::open(&args.db_path).expect("Could not open the database.");
    let mut config = AppConfig::new(&secret);
    config.store_timeout = Duration::from_millis(args.store_timeout_ms);
    config.rate_limit = RateLimitConfig {
        enabled: args.limiter_enabled,
        requests_per_second: args.limiter_rps,
        burst: args.limiter_burst,
    };
    config.trusted_origins = args.cors_trusted_origins;
    let state = AppState::new(conn, config).expect("Could not initialize the app state.");

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));
    tokio::spawn(state.rate_limiter.clone().prune_periodically());

    let router = add_tracing_layer(build_router(state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .expect("The server stopped unexpectedly.");
}

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().pretty())
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
