//! Connection lifecycle: retry policies and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use linkmux_transport::Connectable;
use tracing::{info, warn};

use crate::error::{DriverError, Result};

/// Cooperative cancellation flag, checked between blocking steps.
///
/// Cloning shares the flag. Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Retry policy for establishing a link.
///
/// Startup and runtime differ deliberately: a link that never comes up at
/// startup is a configuration problem and should fail loudly after a bound,
/// while a link that drops mid-run is expected field behavior and is
/// retried for as long as the instance lives.
#[derive(Debug, Clone)]
pub struct ConnectRetry {
    pub backoff: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl ConnectRetry {
    const DEFAULT_BACKOFF: Duration = Duration::from_secs(2);

    /// First-connect policy: bounded, so misconfiguration surfaces within
    /// a few minutes instead of hanging forever.
    pub fn startup() -> Self {
        Self {
            backoff: Self::DEFAULT_BACKOFF,
            max_attempts: Some(90),
        }
    }

    /// Mid-run reconnect policy: unbounded.
    pub fn runtime() -> Self {
        Self {
            backoff: Self::DEFAULT_BACKOFF,
            max_attempts: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Connect the link, retrying per this policy. Returns the number of
    /// attempts it took.
    pub fn establish<L: Connectable + ?Sized>(&self, link: &mut L) -> Result<u32> {
        self.establish_with(link, &CancelToken::new())
    }

    /// Like [`ConnectRetry::establish`], but gives up early once `cancel`
    /// fires.
    pub fn establish_with<L: Connectable + ?Sized>(
        &self,
        link: &mut L,
        cancel: &CancelToken,
    ) -> Result<u32> {
        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(DriverError::Cancelled);
            }
            attempt += 1;
            match link.connect() {
                Ok(()) => {
                    info!(endpoint = link.endpoint(), attempt, "link connected");
                    return Ok(attempt);
                }
                Err(e) => {
                    warn!(
                        endpoint = link.endpoint(),
                        attempt,
                        error = %e,
                        "connect attempt failed"
                    );
                    if let Some(max) = self.max_attempts {
                        if attempt >= max {
                            return Err(DriverError::ConnectExhausted {
                                endpoint: link.endpoint().to_string(),
                                attempts: attempt,
                            });
                        }
                    }
                    sleep_cancellable(self.backoff, cancel);
                }
            }
        }
    }
}

/// Sleep `total`, waking early if the token fires.
pub(crate) fn sleep_cancellable(total: Duration, cancel: &CancelToken) {
    const SLICE: Duration = Duration::from_millis(50);
    let mut remaining = total;
    while !remaining.is_zero() {
        if cancel.is_cancelled() {
            return;
        }
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkmux_transport::MockLink;

    fn fast(policy: ConnectRetry) -> ConnectRetry {
        policy.with_backoff(Duration::from_millis(1))
    }

    #[test]
    fn startup_policy_is_bounded() {
        let policy = ConnectRetry::startup();
        assert_eq!(policy.max_attempts, Some(90));
        assert_eq!(policy.backoff, Duration::from_secs(2));
        assert_eq!(ConnectRetry::runtime().max_attempts, None);
    }

    #[test]
    fn establish_retries_until_success() {
        let (mut link, handle) = MockLink::new("mock0");
        handle.fail_connects(3);

        let attempts = fast(ConnectRetry::startup()).establish(&mut link).unwrap();
        assert_eq!(attempts, 4);
        assert!(link.is_connected());
    }

    #[test]
    fn establish_gives_up_after_max_attempts() {
        let (mut link, handle) = MockLink::new("mock0");
        handle.fail_connects(u32::MAX);

        let policy = fast(ConnectRetry::startup()).with_max_attempts(5);
        let err = policy.establish(&mut link).unwrap_err();
        assert!(matches!(
            err,
            DriverError::ConnectExhausted { attempts: 5, .. }
        ));
        assert_eq!(handle.connect_attempts(), 5);
    }

    #[test]
    fn cancel_stops_the_retry_loop() {
        let (mut link, handle) = MockLink::new("mock0");
        handle.fail_connects(u32::MAX);

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = fast(ConnectRetry::runtime())
            .establish_with(&mut link, &cancel)
            .unwrap_err();
        assert!(matches!(err, DriverError::Cancelled));
    }
}
