//! # Fibonacci Backoff
//!
//! Provides a Fibonacci-based backoff mechanism for retries of transient
//! cluster-API failures. This grows more slowly than exponential backoff,
//! making it suitable for operations that may need multiple retries
//! without overwhelming the API server.
//!
//! The backoff sequence is calculated in minutes to align with GitOps tool
//! conventions. Sequence: 1m, 1m, 2m, 3m, 5m, 8m, 10m (max), then
//! converted to seconds for use by the dispatcher.

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Generates backoff durations following the Fibonacci sequence.
/// Each backoff is the sum of the previous two backoffs, capped at a
/// maximum.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum backoff value in minutes (for reset)
    min_minutes: u64,
    /// Previous backoff value in minutes
    prev_minutes: u64,
    /// Current backoff value in minutes
    current_minutes: u64,
    /// Maximum backoff value in minutes
    max_minutes: u64,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff with specified minimum and maximum
    /// values in minutes.
    ///
    /// Default sequence for reconciliation errors: 1m, 1m, 2m, 3m, 5m, 8m,
    /// 10m (max).
    #[must_use]
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        Self {
            min_minutes,
            prev_minutes: 0,
            current_minutes: min_minutes,
            max_minutes,
        }
    }

    /// Get the next backoff duration in seconds and advance the sequence.
    pub fn next_backoff_seconds(&mut self) -> u64 {
        let result_seconds = self.current_minutes * 60;

        let next_minutes = self.prev_minutes + self.current_minutes;
        self.prev_minutes = self.current_minutes;
        self.current_minutes = std::cmp::min(next_minutes, self.max_minutes);

        result_seconds
    }

    /// Get the next backoff duration as a `Duration` and advance the
    /// sequence.
    #[must_use]
    pub fn next_backoff(&mut self) -> Duration {
        Duration::from_secs(self.next_backoff_seconds())
    }

    /// Reset the backoff to the initial state.
    pub fn reset(&mut self) {
        self.prev_minutes = 0;
        self.current_minutes = self.min_minutes;
    }
}
