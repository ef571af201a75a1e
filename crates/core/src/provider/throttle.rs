//! Minimum-interval gate for rate limited provider endpoints.
//!
//! The engine has no global rate limiter; a provider whose backend enforces
//! a request rate owns a `RequestThrottle` and passes every gated call
//! through it.

use tokio::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Serializes calls and keeps at least `min_interval` between them.
#[derive(Debug)]
pub struct RequestThrottle {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RequestThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until a call is allowed, then record it.
    ///
    /// Concurrent callers queue on the internal lock and are released one
    /// interval apart.
    pub async fn acquire(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}
