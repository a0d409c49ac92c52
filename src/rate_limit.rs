use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use warp::{reject, Filter, Rejection};

use crate::config::RateLimit;
use crate::warp_helpers::TooManyRequestsError;

/// Windows are dropped once the map holds this many clients.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed-window request counter keyed by client IP.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    limit: RateLimit,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            limit,
        }
    }

    /// Counts one request for `key`. Returns the time until the window resets
    /// when the client is over its limit.
    pub async fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        if !self.limit.is_enabled() {
            return Ok(());
        }

        let mut windows = self.windows.lock().await;
        if windows.len() >= PRUNE_THRESHOLD {
            let period = self.limit.window;
            windows.retain(|_, w| now.duration_since(w.started) < period);
        }

        let window = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(window.started) >= self.limit.window {
            *window = Window {
                started: now,
                hits: 0,
            };
        }

        if window.hits >= self.limit.max_requests {
            return Err(self.limit.window - now.duration_since(window.started));
        }
        window.hits += 1;
        Ok(())
    }
}

fn client_key(addr: Option<SocketAddr>) -> String {
    addr.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejects with `TooManyRequestsError` once the caller's IP is over the limit.
pub fn rate_limit(limiter: RateLimiter) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::addr::remote()
        .and_then(move |addr: Option<SocketAddr>| {
            let limiter = limiter.clone();
            async move {
                let key = client_key(addr);
                limiter.check(&key).await.map_err(|retry_after| {
                    log::warn!("Rate limit exceeded for {}", key);
                    reject::custom(TooManyRequestsError {
                        message: "Too many requests, please try again later".to_string(),
                        retry_after_secs: retry_after.as_secs().max(1),
                    })
                })
            }
        })
        .untuple_one()
}
