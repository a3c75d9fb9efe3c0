//! Request pacing and cooperative cancellation.
//!
//! Pages are processed strictly sequentially; the only thing bounding the
//! aggregate request rate to the remote service is the delay applied
//! between pages. The delay must be interruptible (a user cancelling a
//! run mid-wait should not sit through the remainder of a 60-second pause),
//! so the sleep is sliced and the cancellation flag polled between slices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Shared cancellation flag, settable from any thread.
///
/// Once set it never resets within a run; start a new run for a fresh flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Observed by the runner before each page and
    /// during the inter-page wait.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Granularity at which a waiting pipeline notices cancellation.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Sleep for `duration`, polling the cancellation flag every
/// [`WAIT_SLICE`]. Returns `true` if the full duration elapsed, `false`
/// if it was cut short by cancellation. Used for the inter-page wait and
/// for retry backoff, so neither holds up a cancelled run.
pub async fn sleep_interruptible(duration: Duration, cancel: &CancelFlag) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            debug!("sleep interrupted by cancellation");
            return false;
        }
        let slice = remaining.min(WAIT_SLICE);
        sleep(slice).await;
        remaining -= slice;
    }
    !cancel.is_cancelled()
}

/// Enforces a fixed delay between consecutive outbound requests.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    delay: Duration,
}

impl RateLimiter {
    pub fn new(seconds: f64) -> Self {
        Self {
            delay: Duration::from_secs_f64(seconds.max(0.0)),
        }
    }

    /// Pause before the next request.
    ///
    /// Returns `true` if the full delay elapsed, `false` if it was cut
    /// short by cancellation. Consumes wall-clock time only; no document
    /// or network resource is held while waiting.
    pub async fn wait(&self, cancel: &CancelFlag) -> bool {
        if self.delay.is_zero() {
            return !cancel.is_cancelled();
        }
        debug!("waiting {:?} before next request", self.delay);
        sleep_interruptible(self.delay, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn zero_delay_returns_immediately() {
        let limiter = RateLimiter::new(0.0);
        let start = Instant::now();
        assert!(limiter.wait(&CancelFlag::new()).await);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn full_delay_elapses() {
        let limiter = RateLimiter::new(0.2);
        let start = Instant::now();
        assert!(limiter.wait(&CancelFlag::new()).await);
        assert!(start.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn pre_cancelled_wait_is_cut_short() {
        let limiter = RateLimiter::new(30.0);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let start = Instant::now();
        assert!(!limiter.wait(&cancel).await);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn cancel_mid_wait_interrupts() {
        let limiter = RateLimiter::new(30.0);
        let cancel = CancelFlag::new();
        let waiter = {
            let cancel = cancel.clone();
            tokio::spawn(async move { limiter.wait(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        let completed = waiter.await.unwrap();
        assert!(!completed);
    }

    #[tokio::test]
    async fn interruptible_sleep_stops_early() {
        let cancel = CancelFlag::new();
        let sleeper = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sleep_interruptible(Duration::from_secs(30), &cancel).await
            })
        };
        tokio::time::sleep(Duration::from_millis(150)).await;
        cancel.cancel();
        assert!(!sleeper.await.unwrap());
    }

    #[test]
    fn cancel_flag_is_sticky() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
        let clone = flag.clone();
        assert!(clone.is_cancelled());
    }
}
