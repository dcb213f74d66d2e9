//! Proactive request pacing.
//!
//! `RateGate` keeps a sliding window of request timestamps and blocks
//! before the window would overflow, so the engine stays under the
//! remote limit instead of provoking rejections. A small safety margin
//! is added on top of the window to absorb clock skew between us and
//! the service.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::RateSection;

pub struct RateGate {
    max_requests: usize,
    window: Duration,
    safety_margin: Duration,
    sent: VecDeque<Instant>,
}

impl RateGate {
    pub fn new(cfg: &RateSection) -> Self {
        Self {
            max_requests: cfg.max_requests as usize,
            window: Duration::from_secs(cfg.window_secs),
            safety_margin: Duration::from_millis(cfg.safety_margin_ms),
            sent: VecDeque::with_capacity(cfg.max_requests as usize),
        }
    }

    /// Wait until sending one more request keeps the window under the
    /// limit, then record the send. Returns immediately when the window
    /// has room.
    pub async fn admit(&mut self) {
        loop {
            let now = Instant::now();
            self.prune(now);
            if self.sent.len() < self.max_requests {
                self.sent.push_back(now);
                return;
            }
            // Window is full. The oldest timestamp leaves it first.
            let oldest = self.sent[0];
            let wake = oldest + self.window + self.safety_margin;
            debug!(wait_ms = (wake - now).as_millis() as u64, "Rate gate full, waiting");
            tokio::time::sleep_until(wake).await;
        }
    }

    /// Requests recorded inside the current window.
    pub fn in_window(&mut self) -> usize {
        self.prune(Instant::now());
        self.sent.len()
    }

    /// Forget all recorded sends. Used when the engine restarts pacing
    /// after a goal switch or a remote rate rejection.
    pub fn reset(&mut self) {
        self.sent.clear();
    }

    fn prune(&mut self, now: Instant) {
        while let Some(&front) = self.sent.front() {
            if now.duration_since(front) >= self.window {
                self.sent.pop_front();
            } else {
                break;
            }
        }
    }
}
