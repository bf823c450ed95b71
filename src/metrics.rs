//! Request counters and the route that exposes them at `/debug/vars`.

use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Instant,
};

use axum::{
    Json,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::{Value, json};
use time::OffsetDateTime;

/// Counters for the requests the server has handled since it started.
#[derive(Debug, Default)]
pub struct Metrics {
    requests_received: AtomicU64,
    responses_sent: AtomicU64,
    processing_time_us: AtomicU64,
    responses_by_status: Mutex<BTreeMap<u16, u64>>,
}

impl Metrics {
    fn record_request(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    fn record_response(&self, status: u16, processing_time_us: u64) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        self.processing_time_us
            .fetch_add(processing_time_us, Ordering::Relaxed);

        // A panic while holding the lock cannot leave the map half updated.
        let mut by_status = self
            .responses_by_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *by_status.entry(status).or_default() += 1;
    }

    /// The current counters as a JSON object.
    pub fn snapshot(&self) -> Value {
        let by_status = self
            .responses_by_status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        json!({
            "total_requests_received": self.requests_received.load(Ordering::Relaxed),
            "total_responses_sent": self.responses_sent.load(Ordering::Relaxed),
            "total_processing_time_us": self.processing_time_us.load(Ordering::Relaxed),
            "total_responses_sent_by_status": by_status,
        })
    }
}

/// Count every request and response, and how long the server took to respond.
pub async fn metrics_middleware(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    metrics.record_request();

    let response = next.run(request).await;

    let elapsed = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
    metrics.record_response(response.status().as_u16(), elapsed);

    response
}

/// A route handler that returns the request counters along with the server version and time.
pub async fn get_debug_vars(State(metrics): State<Arc<Metrics>>) -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": OffsetDateTime::now_utc().unix_timestamp(),
        "metrics": metrics.snapshot(),
    }))
}
