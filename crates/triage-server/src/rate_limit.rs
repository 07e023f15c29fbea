use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Token bucket shared by every clone. Guards calls to the text-generation host.
#[derive(Clone)]
pub struct RateLimiter {
    rps: u32,
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct State {
    tokens: f64,
    last: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded (RATE_LIMIT_RPS={rps}): try again in ~{}ms", retry_after.as_millis())]
pub struct RateLimited {
    pub rps: u32,
    pub retry_after: Duration,
}

impl RateLimiter {
    /// A full bucket of `rps` tokens. `None` for zero.
    pub fn new(rps: u32) -> Option<Self> {
        if rps == 0 {
            return None;
        }
        Some(Self {
            rps,
            state: Arc::new(Mutex::new(State {
                tokens: rps as f64,
                last: Instant::now(),
            })),
        })
    }

    pub fn rps(&self) -> u32 {
        self.rps
    }

    pub async fn check(&self) -> Result<(), RateLimited> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        let elapsed = now.duration_since(state.last);
        state.last = now;

        let rps = self.rps as f64;
        state.tokens = (state.tokens + elapsed.as_secs_f64() * rps).min(rps);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }

        Err(RateLimited {
            rps: self.rps,
            retry_after: Duration::from_secs_f64((1.0 - state.tokens) / rps),
        })
    }
}
