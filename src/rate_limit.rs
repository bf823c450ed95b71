//! Per client rate limiting keyed by IP address.

use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::Error;

/// How often the state of clients that have not been seen recently is dropped.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// The settings for the per client rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Whether requests are rate limited at all.
    pub enabled: bool,
    /// The number of requests per second a client may sustain.
    pub requests_per_second: u32,
    /// The number of requests a client may make in a single burst.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_second: 2,
            burst: 4,
        }
    }
}

/// A token bucket per client IP address, shared by every request.
///
/// A disabled limiter lets every request through.
#[derive(Clone)]
pub struct ClientRateLimiter {
    limiter: Option<Arc<DefaultKeyedRateLimiter<IpAddr>>>,
}

impl ClientRateLimiter {
    /// Create a limiter from `config`.
    ///
    /// A rate of zero is raised to one request per second and a burst of zero falls back to the
    /// rate.
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { limiter: None };
        }

        let rate = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.burst).unwrap_or(rate);
        let quota = Quota::per_second(rate).allow_burst(burst);

        Self {
            limiter: Some(Arc::new(RateLimiter::keyed(quota))),
        }
    }

    /// Take a token from the bucket for `ip`, returning whether the request may proceed.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter
            .as_ref()
            .is_none_or(|limiter| limiter.check_key(&ip).is_ok())
    }

    /// Drop the buckets of clients whose tokens have all been replenished.
    pub fn prune(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Prune the limiter every [PRUNE_INTERVAL], forever.
    pub async fn prune_periodically(self) {
        if self.limiter.is_none() {
            return;
        }

        let mut interval = tokio::time::interval(PRUNE_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            self.prune();
            tracing::debug!("pruned rate limiter state");
        }
    }
}

impl fmt::Debug for ClientRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRateLimiter")
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

/// Reject requests from clients that have used up their rate limit with `429 Too Many Requests`.
pub async fn rate_limit_middleware(
    State(limiter): State<ClientRateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    if !limiter.check(ip) {
        tracing::warn!(%ip, "rate limit exceeded");
        return Error::RateLimitExceeded.into_response();
    }

    next.run(request).await
}

/// The address of the client that sent `request`.
///
/// Proxy headers take precedence over the address of the connection. Requests with no known
/// address share the bucket of the loopback address.
fn client_ip(request: &Request) -> IpAddr {
    let headers = request.headers();

    let forwarded_for: Option<IpAddr> = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse().ok());

    let real_ip = || -> Option<IpAddr> {
        headers
            .get("x-real-ip")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse().ok())
    };

    let connection = || -> Option<IpAddr> {
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(address)| address.ip())
    };

    forwarded_for
        .or_else(real_ip)
        .or_else(connection)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
