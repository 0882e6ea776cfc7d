//! Idle detection for the preview server.
//!
//! Request handlers and the idle timer share one [`Activity`]. Handlers
//! record each request; the timer calls [`Activity::tick`] once per interval:
//!
//! ```text
//!            request                       tick, no request since last tick,
//!   Idle ───────────────▶ Active             last content dynamic
//!    ▲                      │           Idle ─────────────────────────────▶ ShuttingDown
//!    └──────── tick ────────┘
//! ```
//!
//! The server only shuts down after a full interval without requests while
//! the last thing served was live content (a compiled page or one of the
//! embedded assets). A browser tab with the reload client keeps polling, so
//! silence means it was closed. After a static fetch there is no client
//! polling, so silence means nothing.

use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of one timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// No request since the previous tick, but no reason to stop either.
    Idle,
    /// At least one request since the previous tick.
    Active,
    /// Quiet for a full interval after live content: stop serving.
    ShuttingDown,
}

/// Request activity shared between handlers and the idle timer.
#[derive(Debug, Default)]
pub struct Activity {
    /// Set by every tick, cleared by every request.
    quiet: AtomicBool,
    /// Whether the most recent request served live content.
    last_dynamic: AtomicBool,
}

impl Activity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, dynamic: bool) {
        self.quiet.store(false, Ordering::SeqCst);
        self.last_dynamic.store(dynamic, Ordering::SeqCst);
    }

    /// Advance the timer by one interval.
    pub fn tick(&self) -> ServerState {
        let was_quiet = self.quiet.swap(true, Ordering::SeqCst);
        if !was_quiet {
            ServerState::Active
        } else if self.last_dynamic.load(Ordering::SeqCst) {
            ServerState::ShuttingDown
        } else {
            ServerState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_stops_before_any_request() {
        let a = Activity::new();
        assert_eq!(a.tick(), ServerState::Active);
        for _ in 0..5 {
            assert_eq!(a.tick(), ServerState::Idle);
        }
    }

    #[test]
    fn stops_after_quiet_interval_following_dynamic() {
        let a = Activity::new();
        a.tick();
        a.record_request(true);
        assert_eq!(a.tick(), ServerState::Active);
        assert_eq!(a.tick(), ServerState::ShuttingDown);
    }

    #[test]
    fn static_last_keeps_running() {
        let a = Activity::new();
        a.record_request(true);
        a.record_request(false);
        assert_eq!(a.tick(), ServerState::Active);
        assert_eq!(a.tick(), ServerState::Idle);
        assert_eq!(a.tick(), ServerState::Idle);
    }

    #[test]
    fn requests_between_ticks_keep_it_alive() {
        let a = Activity::new();
        for _ in 0..5 {
            a.record_request(true);
            assert_eq!(a.tick(), ServerState::Active);
        }
        assert_eq!(a.tick(), ServerState::ShuttingDown);
    }

    #[test]
    fn shared_across_threads() {
        let a = std::sync::Arc::new(Activity::new());
        a.tick();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let a = std::sync::Arc::clone(&a);
                std::thread::spawn(move || a.record_request(i % 2 == 0))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(a.tick(), ServerState::Active);
    }
}
