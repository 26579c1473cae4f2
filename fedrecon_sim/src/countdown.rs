//! Observation-window wait collaborator.

use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Blocks the calling task for a configured window, logging the remaining
/// time each second so operators can see discovery is still in progress.
pub struct CountdownTimer {
    duration: Duration,
}

impl CountdownTimer {
    /// Creates a timer for the given window.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Runs the countdown to completion.
    pub async fn run(&self) {
        let whole_seconds = self.duration.as_secs();
        for remaining in (1..=whole_seconds).rev() {
            info!("Waiting for interaction discovery: {}s remaining", remaining);
            sleep(Duration::from_secs(1)).await;
        }
        let fraction = self.duration - Duration::from_secs(whole_seconds);
        if !fraction.is_zero() {
            sleep(fraction).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_countdown_waits_full_window() {
        let start = tokio::time::Instant::now();
        CountdownTimer::new(Duration::from_millis(2500)).run().await;
        assert_eq!(start.elapsed(), Duration::from_millis(2500));
    }
}
