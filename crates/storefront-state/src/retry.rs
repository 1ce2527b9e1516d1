//! # Retry Policy
//!
//! Wraps a fallible call with automatic retries and backoff, on top of an
//! [`AsyncOperation`].
//!
//! ## Attempt Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  execute() ──► call() ──── Ok ─────────────────────────► Succeeded      │
//! │                  │                                                      │
//! │                  Err                                                    │
//! │                  │                                                      │
//! │                  ├── attempt == max_retries ──► on_max_retries_reached  │
//! │                  │                              └──► Failed (same error)│
//! │                  │                                                      │
//! │                  └── attempt < max_retries                              │
//! │                        attempt += 1, on_retry(attempt, err)             │
//! │                        sleep(backoff) ◄── teardown ──► Cancelled        │
//! │                        └──► call() again                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Backoff Schedule (base = 1s)
//! ```text
//! retry #     1     2     3     4
//! exponential 1s    2s    4s    8s    (capped at max_delay if set)
//! constant    1s    1s    1s    1s
//! ```
//!
//! `attempt` is not reset when a new `execute()` begins. Only
//! [`RetryPolicy::reset`] brings it back to zero.

use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::{Backoff, Constant};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::error::{OperationError, OperationResult};
use crate::operation::{AsyncOperation, AsyncOptions, AsyncState};

// =============================================================================
// Configuration
// =============================================================================

/// Retry limits and delay schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first call. Zero disables retrying.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Double the delay after every retry.
    pub exponential: bool,

    /// Upper bound on any single delay.
    pub max_delay: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            exponential: true,
            max_delay: None,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry_index + 1`.
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let delay = if self.exponential {
            2u32.checked_pow(retry_index)
                .and_then(|factor| self.base_delay.checked_mul(factor))
                .unwrap_or(Duration::MAX)
        } else {
            self.base_delay
        };

        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Builds the delay schedule starting at `retry_index`.
    pub fn schedule_from(&self, retry_index: u32) -> Box<dyn Backoff + Send> {
        if self.exponential {
            Box::new(DoublingBackoff {
                config: self.clone(),
                start: retry_index,
                next: retry_index,
            })
        } else {
            Box::new(Constant::new(self.delay_for(0)))
        }
    }
}

/// `base × 2^n`, capped, never exhausted.
#[derive(Debug, Clone)]
struct DoublingBackoff {
    config: RetryConfig,
    start: u32,
    next: u32,
}

impl Backoff for DoublingBackoff {
    fn reset(&mut self) {
        self.next = self.start;
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.config.delay_for(self.next);
        self.next = self.next.saturating_add(1);
        Some(delay)
    }
}

/// Whole milliseconds for log fields, saturating at `u64::MAX`.
fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

// =============================================================================
// Hooks
// =============================================================================

pub type RetryHook = Arc<dyn Fn(u32, &OperationError) + Send + Sync>;
pub type ExhaustedHook = Arc<dyn Fn(&OperationError) + Send + Sync>;

/// Callbacks around the retry loop.
#[derive(Clone, Default)]
pub struct RetryHooks {
    on_retry: Option<RetryHook>,
    on_max_retries_reached: Option<ExhaustedHook>,
}

impl RetryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the new attempt number before each backoff.
    pub fn on_retry<F>(mut self, hook: F) -> Self
    where
        F: Fn(u32, &OperationError) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Called once when a failure arrives with no retries left.
    pub fn on_max_retries_reached<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OperationError) + Send + Sync + 'static,
    {
        self.on_max_retries_reached = Some(Arc::new(hook));
        self
    }
}

impl fmt::Debug for RetryHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHooks")
            .field("on_retry", &self.on_retry.is_some())
            .field("on_max_retries_reached", &self.on_max_retries_reached.is_some())
            .finish()
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Async state plus the retry counter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryState<T> {
    pub attempt: u32,
    pub state: AsyncState<T>,
}

impl<T> Deref for RetryState<T> {
    type Target = AsyncState<T>;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

/// An [`AsyncOperation`] that retries failed calls.
///
/// ```rust
/// use std::time::Duration;
/// use storefront_state::{AsyncOptions, RetryConfig, RetryPolicy};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = RetryConfig {
///     base_delay: Duration::from_millis(1),
///     ..RetryConfig::default()
/// };
/// let policy = RetryPolicy::new(config, AsyncOptions::new());
///
/// let cart = policy.execute(|| async { Ok::<_, String>("[]") }).await;
/// assert_eq!(cart, Ok("[]"));
/// assert_eq!(policy.attempt(), 0);
/// # }
/// ```
pub struct RetryPolicy<T> {
    operation: AsyncOperation<T>,
    config: RetryConfig,
    attempt: Arc<watch::Sender<u32>>,
    hooks: RetryHooks,
}

impl<T> Clone for RetryPolicy<T> {
    fn clone(&self) -> Self {
        RetryPolicy {
            operation: self.operation.clone(),
            config: self.config.clone(),
            attempt: Arc::clone(&self.attempt),
            hooks: self.hooks.clone(),
        }
    }
}

impl<T> RetryPolicy<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(config: RetryConfig, options: AsyncOptions<T>) -> Self {
        Self::with_token(config, options, CancelToken::new())
    }

    /// Creates a policy bound to a scope's cancellation token.
    pub fn with_token(config: RetryConfig, options: AsyncOptions<T>, token: CancelToken) -> Self {
        let (attempt, _) = watch::channel(0);
        RetryPolicy {
            operation: AsyncOperation::with_token(options, token),
            config,
            attempt: Arc::new(attempt),
            hooks: RetryHooks::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: RetryHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Retries used so far.
    pub fn attempt(&self) -> u32 {
        *self.attempt.borrow()
    }

    pub fn state(&self) -> RetryState<T> {
        RetryState {
            attempt: self.attempt(),
            state: self.operation.state(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<AsyncState<T>> {
        self.operation.subscribe()
    }

    pub fn subscribe_attempt(&self) -> watch::Receiver<u32> {
        self.attempt.subscribe()
    }

    /// Runs `call` until it succeeds or retries run out.
    ///
    /// The whole sequence counts as one invocation of the underlying
    /// operation: `pending` stays true across backoffs.
    ///
    /// ## Errors
    /// - The last [`OperationError::Invocation`] once retries are exhausted
    /// - [`OperationError::Cancelled`] if teardown lands before a retry
    pub async fn execute<F, Fut, E>(&self, mut call: F) -> OperationResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let ticket = self.operation.begin();
        let mut schedule = self.config.schedule_from(self.attempt());

        let result = loop {
            let err = match call().await {
                Ok(value) => break Ok(value),
                Err(e) => OperationError::invocation(e),
            };

            if self.operation.is_torn_down() {
                debug!("Teardown before retry, not scheduling another call");
                break Err(OperationError::Cancelled);
            }
            if !self.operation.is_live(&ticket) {
                debug!("Operation reset during retries, giving up");
                break Err(err);
            }

            let attempt = self.attempt();
            if attempt >= self.config.max_retries {
                error!(
                    max_retries = self.config.max_retries,
                    error = %err,
                    "Max retries reached"
                );
                if let Some(hook) = &self.hooks.on_max_retries_reached {
                    hook(&err);
                }
                break Err(err);
            }

            let next_attempt = attempt + 1;
            self.attempt.send_replace(next_attempt);
            if let Some(hook) = &self.hooks.on_retry {
                hook(next_attempt, &err);
            }

            let Some(delay) = schedule.next_backoff() else {
                break Err(err);
            };
            warn!(
                attempt = next_attempt,
                max_retries = self.config.max_retries,
                delay_ms = millis(delay),
                error = %err,
                "Call failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.operation.token().cancelled() => {
                    info!("Teardown during retry backoff");
                    break Err(OperationError::Cancelled);
                }
            }
        };

        self.operation.settle(ticket, &result);
        result
    }

    /// Zeroes the attempt counter and resets the operation.
    pub fn reset(&self) {
        if !self.operation.is_torn_down() {
            self.attempt.send_replace(0);
        }
        self.operation.reset();
    }

    pub fn teardown(&self) {
        self.operation.teardown();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    fn counter() -> Arc<AtomicU32> {
        Arc::new(AtomicU32::new(0))
    }

    #[test]
    fn test_delay_schedule() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for(0), Duration::from_secs(1));
        assert_eq!(config.delay_for(1), Duration::from_secs(2));
        assert_eq!(config.delay_for(3), Duration::from_secs(8));
        assert_eq!(config.delay_for(64), Duration::MAX);

        let capped = RetryConfig {
            max_delay: Some(Duration::from_secs(3)),
            ..RetryConfig::default()
        };
        assert_eq!(capped.delay_for(2), Duration::from_secs(3));

        let constant = RetryConfig {
            exponential: false,
            ..RetryConfig::default()
        };
        assert_eq!(constant.delay_for(5), Duration::from_secs(1));
    }

    #[test]
    fn test_logged_delay_saturates() {
        assert_eq!(millis(Duration::from_millis(1_500)), 1_500);
        assert_eq!(millis(RetryConfig::default().delay_for(64)), u64::MAX);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn test_schedule_from_offset() {
        let config = RetryConfig::default();
        let mut schedule = config.schedule_from(2);
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(4)));
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(8)));

        schedule.reset();
        assert_eq!(schedule.next_backoff(), Some(Duration::from_secs(4)));

        let mut constant = RetryConfig {
            exponential: false,
            ..RetryConfig::default()
        }
        .schedule_from(2);
        assert_eq!(constant.next_backoff(), Some(Duration::from_secs(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_after_max_retries() {
        let calls = counter();
        let exhausted = counter();
        let retried = Arc::new(Mutex::new(Vec::new()));

        let hooks = {
            let exhausted = exhausted.clone();
            let retried = retried.clone();
            RetryHooks::new()
                .on_retry(move |attempt, _| retried.lock().unwrap().push(attempt))
                .on_max_retries_reached(move |_| {
                    exhausted.fetch_add(1, Ordering::SeqCst);
                })
        };
        let policy = RetryPolicy::<i32>::new(RetryConfig::default(), AsyncOptions::new())
            .with_hooks(hooks);

        let started = Instant::now();
        let result = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>("gateway timeout") }
            })
            .await;
        let elapsed = started.elapsed();

        assert_eq!(result, Err(OperationError::invocation("gateway timeout")));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
        assert_eq!(*retried.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(policy.attempt(), 3);

        // 1s + 2s + 4s of backoff
        assert!(elapsed >= Duration::from_secs(7));
        assert!(elapsed < Duration::from_millis(7_100));

        let state = policy.state();
        assert!(!state.pending);
        assert_eq!(state.error, Some(OperationError::invocation("gateway timeout")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let calls = counter();
        let policy = RetryPolicy::new(RetryConfig::default(), AsyncOptions::new());

        let result = policy
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("flaky".to_string())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(policy.attempt(), 2);
        let state = policy.state();
        assert!(state.succeeded);
        assert_eq!(state.data, Some(2));
        assert_eq!(state.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_across_backoff() {
        let policy = RetryPolicy::<i32>::new(RetryConfig::default(), AsyncOptions::new());
        let task = {
            let policy = policy.clone();
            tokio::spawn(async move {
                policy
                    .execute(|| async { Err::<i32, _>("down") })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(policy.state().pending);
        assert_eq!(policy.attempt(), 2);

        let result = task.await.unwrap();
        assert!(result.is_err());
        assert!(!policy.state().pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_constant_backoff_timing() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            exponential: false,
            max_delay: None,
        };
        let policy = RetryPolicy::<i32>::new(config, AsyncOptions::new());

        let started = Instant::now();
        let _ = policy.execute(|| async { Err::<i32, _>("down") }).await;

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(1));
        assert!(elapsed < Duration::from_millis(1_100));
    }

    #[tokio::test]
    async fn test_zero_retries_fails_immediately() {
        let calls = counter();
        let exhausted = counter();
        let hooks = {
            let exhausted = exhausted.clone();
            RetryHooks::new().on_max_retries_reached(move |_| {
                exhausted.fetch_add(1, Ordering::SeqCst);
            })
        };
        let config = RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::<i32>::new(config, AsyncOptions::new()).with_hooks(hooks);

        let result = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<i32, _>("nope") }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(exhausted.load(Ordering::SeqCst), 1);
        assert_eq!(policy.attempt(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_aborts_scheduled_retry() {
        let calls = counter();
        let policy = RetryPolicy::<i32>::new(RetryConfig::default(), AsyncOptions::new());

        let task = {
            let policy = policy.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                policy
                    .execute(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err::<i32, _>("down") }
                    })
                    .await
            })
        };

        // First call fails, the 1s backoff is running
        tokio::time::sleep(Duration::from_millis(500)).await;
        let frozen = policy.state();
        policy.teardown();

        assert_eq!(task.await.unwrap(), Err(OperationError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(policy.state(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_persists_until_reset() {
        let calls = counter();
        let policy = RetryPolicy::new(RetryConfig::default(), AsyncOptions::new());

        // Two failures then success leaves attempt at 2
        policy
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err("flaky") } else { Ok(n) } }
            })
            .await
            .unwrap();
        assert_eq!(policy.attempt(), 2);

        // Only one retry left for the next execute, after a 4s delay
        calls.store(0, Ordering::SeqCst);
        let started = Instant::now();
        let result = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<u32, _>("down") }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(policy.attempt(), 3);
        assert!(started.elapsed() >= Duration::from_secs(4));

        let mut attempts = policy.subscribe_attempt();
        policy.reset();
        assert!(attempts.has_changed().unwrap());
        assert_eq!(policy.attempt(), 0);
        assert_eq!(policy.state().state, AsyncState::new(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_during_backoff_stops_retrying() {
        let calls = counter();
        let retried = counter();
        let exhausted = counter();

        let hooks = {
            let retried = retried.clone();
            let exhausted = exhausted.clone();
            RetryHooks::new()
                .on_retry(move |_, _| {
                    retried.fetch_add(1, Ordering::SeqCst);
                })
                .on_max_retries_reached(move |_| {
                    exhausted.fetch_add(1, Ordering::SeqCst);
                })
        };
        let policy = RetryPolicy::<i32>::new(RetryConfig::default(), AsyncOptions::new())
            .with_hooks(hooks);

        let task = {
            let policy = policy.clone();
            let calls = calls.clone();
            tokio::spawn(async move {
                policy
                    .execute(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err::<i32, _>("down") }
                    })
                    .await
            })
        };

        // First call fails, the 1s backoff is running
        tokio::time::sleep(Duration::from_millis(500)).await;
        policy.reset();
        assert_eq!(policy.attempt(), 0);
        assert_eq!(policy.state().state, AsyncState::new(None));

        // The call after the backoff fails again and the loop gives up
        assert_eq!(task.await.unwrap(), Err(OperationError::invocation("down")));
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(retried.load(Ordering::SeqCst), 1);
        assert_eq!(exhausted.load(Ordering::SeqCst), 0);
        assert_eq!(policy.attempt(), 0);
        assert_eq!(policy.state().state, AsyncState::new(None));
    }
}
