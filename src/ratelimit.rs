//! Per-source rate limiting
//!
//! Sliding-window admission control: `acquire` blocks until a call slot
//! is available under the configured `(max_calls, window)` budget. Each
//! external source gets its own independent instance.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Sliding-window rate limiter.
///
/// Callers queue on an internal fair mutex, so admission is strict
/// FIFO: a waiter sleeps exactly until the oldest call in the window
/// expires, with no busy-waiting. Safe for concurrent callers; uses
/// `tokio::time::Instant` so paused test clocks work.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        assert!(max_calls > 0, "max_calls must be non-zero");
        Self {
            max_calls,
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// Block until a slot is available, then consume it.
    pub async fn acquire(&self) {
        // Holding the lock across the sleep serializes waiters in
        // arrival order; tokio's Mutex wakes them fairly.
        let mut calls = self.calls.lock().await;

        loop {
            let now = Instant::now();
            while let Some(front) = calls.front() {
                if now.duration_since(*front) >= self.window {
                    calls.pop_front();
                } else {
                    break;
                }
            }

            if calls.len() < self.max_calls {
                calls.push_back(now);
                return;
            }

            // Sleep until the oldest call leaves the window.
            let oldest = *calls.front().expect("window is full");
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limit window full");
            tokio::time::sleep(wait).await;
        }
    }

    /// Slots currently consumed within the window (diagnostics only).
    pub async fn in_window(&self) -> usize {
        let mut calls = self.calls.lock().await;
        let now = Instant::now();
        while let Some(front) = calls.front() {
            if now.duration_since(*front) >= self.window {
                calls.pop_front();
            } else {
                break;
            }
        }
        calls.len()
    }
}
