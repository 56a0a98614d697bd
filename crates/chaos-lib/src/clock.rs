//! Sleep abstraction used by every wait in the experiment
//!
//! Polls and ramp delays go through [`Clock`] so tests can run the whole
//! workflow without real time passing.

use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Clock: Send + Sync {
    /// Block the current run for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Number of polls that fit in `timeout` at `delay` spacing, at least one
pub fn poll_attempts(timeout: Duration, delay: Duration) -> u64 {
    if delay.is_zero() {
        return 1;
    }
    (timeout.as_millis() / delay.as_millis()).max(1) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_attempts() {
        assert_eq!(poll_attempts(Duration::from_secs(180), Duration::from_secs(2)), 90);
        assert_eq!(poll_attempts(Duration::from_secs(1), Duration::from_secs(2)), 1);
        assert_eq!(poll_attempts(Duration::from_secs(5), Duration::ZERO), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_sleeps() {
        let start = tokio::time::Instant::now();
        TokioClock.sleep(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
