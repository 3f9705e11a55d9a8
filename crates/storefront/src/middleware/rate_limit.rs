//! Rate limiting middleware using governor and `tower_governor`.
//!
//! - `login_rate_limiter`: strict limit for the back-office login (~10/min)
//! - `public_write_rate_limiter`: inquiries and assistant questions (~30/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::Request;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// First parseable IP of a header value (`X-Forwarded-For` may hold a chain).
fn header_ip<T>(req: &Request<T>, name: &str) -> Option<IpAddr> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

/// Client IP from proxy headers, falling back to the TCP peer address.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"]
            .iter()
            .find_map(|name| header_ip(req, name))
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

/// Rate limiter layer type for Axum.
pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

fn limiter(replenish_secs: u64, burst: u32) -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(replenish_secs)
        .burst_size(burst)
        .finish()
        .expect("rate limiter config with positive period and burst is valid");
    GovernorLayer::new(Arc::new(config))
}

/// Back-office login: 1 request every 6 seconds, burst of 5.
///
/// # Panics
///
/// Does not panic: the period and burst are positive constants, which
/// `GovernorConfigBuilder` always accepts.
#[must_use]
pub fn login_rate_limiter() -> RateLimiterLayer {
    limiter(6, 5)
}

/// Public writes (inquiries, assistant questions): 1 request every 2 seconds, burst of 10.
///
/// # Panics
///
/// Does not panic: the period and burst are positive constants.
#[must_use]
pub fn public_write_rate_limiter() -> RateLimiterLayer {
    limiter(2, 10)
}
