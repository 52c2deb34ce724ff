//! Per-state retransmission schedules.
//!
//! Each handshake state retransmits its message with a doubling receive
//! timeout, clamped at a ceiling, for a bounded number of attempts.

use std::time::Duration;

/// Retransmission parameters of one handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub max_attempts: u32,
}

impl Backoff {
    /// Hello exchange: fast, chatty, generous attempt count.
    pub const HELLO: Backoff = Backoff {
        initial_ms: 50,
        max_ms: 200,
        max_attempts: 20,
    };

    /// Commit, DH and Confirm exchanges.
    pub const COMMIT: Backoff = Backoff {
        initial_ms: 150,
        max_ms: 1200,
        max_attempts: 10,
    };

    /// The receive timeout for each attempt, in order.
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            cur: self.initial_ms,
            max: self.max_ms,
            left: self.max_attempts,
        }
    }
}

pub struct Timeouts {
    cur: u64,
    max: u64,
    left: u32,
}

impl Iterator for Timeouts {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.left == 0 {
            return None;
        }
        self.left -= 1;
        let timeout = Duration::from_millis(self.cur);
        if self.cur < self.max {
            self.cur *= 2;
        }
        Some(timeout)
    }
}
