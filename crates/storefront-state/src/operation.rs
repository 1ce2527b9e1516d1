//! # Async Operation
//!
//! Tracks one asynchronous call's lifecycle and publishes every transition
//! to subscribers.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌──────┐  execute()  ┌─────────┐   Ok(value)   ┌───────────┐         │
//! │   │ Idle │ ──────────► │ Pending │ ────────────► │ Succeeded │         │
//! │   └──────┘             └────┬────┘               └─────┬─────┘         │
//! │      ▲                      │ Err(e)                   │ execute()     │
//! │      │ reset()              ▼                          ▼               │
//! │      │                 ┌─────────┐   execute()   ┌─────────┐           │
//! │      └──────────────── │ Failed  │ ────────────► │ Pending │           │
//! │                        └─────────┘               └─────────┘           │
//! │                                                                         │
//! │  data survives failures (stale-while-revalidate) until reset().        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Settlement Rules
//! - Overlapping `execute()` calls are allowed. Each settlement writes its
//!   result, so whichever settles last wins `data`/`error`.
//! - `pending` stays true until the last overlapping call settles.
//! - `reset()` discards settlements of calls started before it.
//! - After teardown (the [`CancelToken`] is cancelled) nothing is written.
//!
//! In every case the awaiting caller still gets the result back.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{OperationError, OperationResult};

// =============================================================================
// State
// =============================================================================

/// Which of the four lifecycle phases a state is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
    Succeeded,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Pending => write!(f, "pending"),
            Phase::Succeeded => write!(f, "succeeded"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// Observable snapshot of an [`AsyncOperation`].
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncState<T> {
    /// Last successful result, `None` until the first success.
    pub data: Option<T>,
    /// True while at least one invocation is in flight.
    pub pending: bool,
    /// Last failure.
    pub error: Option<OperationError>,
    /// True only right after a success, reset by the next invocation.
    pub succeeded: bool,
}

impl<T> AsyncState<T> {
    /// The idle baseline, optionally seeded with data.
    pub fn new(data: Option<T>) -> Self {
        AsyncState {
            data,
            pending: false,
            error: None,
            succeeded: false,
        }
    }

    /// Exactly one phase holds at any time; `pending` takes precedence.
    pub fn phase(&self) -> Phase {
        if self.pending {
            Phase::Pending
        } else if self.succeeded {
            Phase::Succeeded
        } else if self.error.is_some() {
            Phase::Failed
        } else {
            Phase::Idle
        }
    }
}

// =============================================================================
// Options
// =============================================================================

pub type SuccessHook<T> = Arc<dyn Fn(&T) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&OperationError) + Send + Sync>;

/// Construction options for [`AsyncOperation`].
///
/// ```rust
/// use storefront_state::AsyncOptions;
///
/// let options = AsyncOptions::new()
///     .initial_data(vec!["cached".to_string()])
///     .on_error(|err| eprintln!("load failed: {err}"));
/// ```
pub struct AsyncOptions<T> {
    initial_data: Option<T>,
    clear_error_on_start: bool,
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
}

impl<T> AsyncOptions<T> {
    pub fn new() -> Self {
        AsyncOptions {
            initial_data: None,
            clear_error_on_start: true,
            on_success: None,
            on_error: None,
        }
    }

    /// Data visible before the first success, restored by `reset()`.
    pub fn initial_data(mut self, data: T) -> Self {
        self.initial_data = Some(data);
        self
    }

    /// Keep the previous error visible while a new invocation runs.
    pub fn keep_error_on_start(mut self) -> Self {
        self.clear_error_on_start = false;
        self
    }

    pub fn on_success<F>(mut self, hook: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&OperationError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(hook));
        self
    }
}

impl<T> Default for AsyncOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Operation
// =============================================================================

/// One in-flight invocation, checked again at settlement.
///
/// Dropped without settling (the awaiting future was dropped), it gives
/// its in-flight slot back so `pending` can clear.
pub(crate) struct Ticket<T> {
    inner: Arc<Inner<T>>,
    epoch: u64,
    settled: bool,
}

impl<T> Drop for Ticket<T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let mut ledger = lock_ledger(&self.inner.ledger);
        if self.inner.token.is_cancelled() || ledger.epoch != self.epoch {
            return;
        }

        ledger.in_flight = ledger.in_flight.saturating_sub(1);
        let still_pending = ledger.in_flight > 0;
        self.inner.state.send_modify(|s| s.pending = still_pending);
        debug!(in_flight = ledger.in_flight, "Invocation dropped before settling");
    }
}

fn lock_ledger(ledger: &Mutex<Ledger>) -> MutexGuard<'_, Ledger> {
    ledger.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct Ledger {
    /// Bumped by every reset.
    epoch: u64,
    /// Invocations of the current epoch still in flight.
    in_flight: usize,
}

struct Inner<T> {
    state: watch::Sender<AsyncState<T>>,
    initial_data: Option<T>,
    clear_error_on_start: bool,
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
    ledger: Mutex<Ledger>,
    token: CancelToken,
}

/// State container for a single asynchronous call.
///
/// Cheap to clone; clones share state, so an in-flight `execute()` on one
/// clone is visible through all the others.
///
/// ```rust
/// use storefront_state::{AsyncOperation, AsyncOptions, Phase};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let op = AsyncOperation::new(AsyncOptions::new());
/// let products = op.execute(async { Ok::<_, String>(vec!["sticker-pack"]) }).await;
///
/// assert!(products.is_ok());
/// assert_eq!(op.state().phase(), Phase::Succeeded);
/// # }
/// ```
pub struct AsyncOperation<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for AsyncOperation<T> {
    fn clone(&self) -> Self {
        AsyncOperation {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> AsyncOperation<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates an operation with its own cancellation token.
    pub fn new(options: AsyncOptions<T>) -> Self {
        Self::with_token(options, CancelToken::new())
    }

    /// Creates an operation bound to a scope's cancellation token.
    pub fn with_token(options: AsyncOptions<T>, token: CancelToken) -> Self {
        let (state, _) = watch::channel(AsyncState::new(options.initial_data.clone()));

        AsyncOperation {
            inner: Arc::new(Inner {
                state,
                initial_data: options.initial_data,
                clear_error_on_start: options.clear_error_on_start,
                on_success: options.on_success,
                on_error: options.on_error,
                ledger: Mutex::new(Ledger::default()),
                token,
            }),
        }
    }

    /// Current snapshot.
    pub fn state(&self) -> AsyncState<T> {
        self.inner.state.borrow().clone()
    }

    pub fn data(&self) -> Option<T> {
        self.inner.state.borrow().data.clone()
    }

    /// Reads the current state without cloning it.
    pub fn inspect<R>(&self, f: impl FnOnce(&AsyncState<T>) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AsyncState<T>> {
        self.inner.state.subscribe()
    }

    pub fn token(&self) -> &CancelToken {
        &self.inner.token
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Runs `fut` as a new invocation.
    ///
    /// Any `Display` failure is normalized into
    /// [`OperationError::Invocation`]. The result is both written to state
    /// (unless suppressed) and returned.
    pub async fn execute<Fut, E>(&self, fut: Fut) -> OperationResult<T>
    where
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        let ticket = self.begin();
        let result = fut.await.map_err(OperationError::invocation);
        self.settle(ticket, &result);
        result
    }

    /// Returns to the initial baseline.
    ///
    /// In-flight calls keep running, but their results are no longer
    /// written.
    pub fn reset(&self) {
        let mut ledger = self.ledger();
        ledger.epoch += 1;
        ledger.in_flight = 0;

        if self.is_torn_down() {
            return;
        }
        debug!(epoch = ledger.epoch, "Operation reset");
        self.inner
            .state
            .send_replace(AsyncState::new(self.inner.initial_data.clone()));
    }

    /// Signals that the owning scope is gone. Shared with every holder of
    /// the same token.
    pub fn teardown(&self) {
        debug!("Operation torn down");
        self.inner.token.cancel();
    }

    // =========================================================================
    // Invocation bookkeeping (shared with retry / pagination)
    // =========================================================================

    /// Marks a new invocation as in flight.
    pub(crate) fn begin(&self) -> Ticket<T> {
        let mut ledger = self.ledger();
        ledger.in_flight += 1;
        let ticket = Ticket {
            inner: Arc::clone(&self.inner),
            epoch: ledger.epoch,
            settled: false,
        };

        if !self.is_torn_down() {
            let clear_error = self.inner.clear_error_on_start;
            self.inner.state.send_modify(|s| {
                s.pending = true;
                s.succeeded = false;
                if clear_error {
                    s.error = None;
                }
            });
            debug!(in_flight = ledger.in_flight, "Invocation started");
        }

        ticket
    }

    /// True while the invocation's results may still be written.
    pub(crate) fn is_live(&self, ticket: &Ticket<T>) -> bool {
        !self.is_torn_down() && self.ledger().epoch == ticket.epoch
    }

    /// Writes an invocation's result, unless reset or teardown suppressed it.
    pub(crate) fn settle(&self, ticket: Ticket<T>, result: &OperationResult<T>) {
        self.settle_with(ticket, result, |_| {});
    }

    /// Like [`settle`](Self::settle), and runs `apply` on a success that is
    /// written, under the same lock as the state write.
    pub(crate) fn settle_with<F>(&self, mut ticket: Ticket<T>, result: &OperationResult<T>, apply: F)
    where
        F: FnOnce(&T),
    {
        ticket.settled = true;
        {
            let mut ledger = self.ledger();
            if self.is_torn_down() {
                debug!("Discarding settlement after teardown");
                return;
            }
            if ledger.epoch != ticket.epoch {
                debug!(
                    started = ticket.epoch,
                    current = ledger.epoch,
                    "Discarding settlement from before reset"
                );
                return;
            }

            ledger.in_flight = ledger.in_flight.saturating_sub(1);
            let still_pending = ledger.in_flight > 0;

            if let Ok(value) = result {
                apply(value);
            }
            self.inner.state.send_modify(|s| {
                match result {
                    Ok(value) => {
                        s.data = Some(value.clone());
                        s.error = None;
                        s.succeeded = !still_pending;
                    }
                    Err(err) => {
                        s.error = Some(err.clone());
                        s.succeeded = false;
                    }
                }
                s.pending = still_pending;
            });
        }

        // Hooks run outside the ledger lock so they may call back in.
        match result {
            Ok(value) => {
                debug!("Invocation succeeded");
                if let Some(hook) = &self.inner.on_success {
                    hook(value);
                }
            }
            Err(err) => {
                warn!(error = %err, "Invocation failed");
                if let Some(hook) = &self.inner.on_error {
                    hook(err);
                }
            }
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        lock_ledger(&self.inner.ledger)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    type Reply = Result<i32, String>;

    async fn reply(rx: oneshot::Receiver<Reply>) -> Reply {
        rx.await.unwrap_or_else(|_| Err("sender dropped".to_string()))
    }

    async fn wait_until<T, F>(op: &AsyncOperation<T>, predicate: F)
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut(&AsyncState<T>) -> bool,
    {
        let mut rx = op.subscribe();
        rx.wait_for(predicate).await.unwrap();
    }

    #[test]
    fn test_phase_precedence() {
        let mut state = AsyncState::new(Some(1));
        assert_eq!(state.phase(), Phase::Idle);

        state.error = Some(OperationError::invocation("boom"));
        assert_eq!(state.phase(), Phase::Failed);

        state.pending = true;
        assert_eq!(state.phase(), Phase::Pending);
        assert_eq!(Phase::Pending.to_string(), "pending");
    }

    #[tokio::test]
    async fn test_success_sets_data_and_fires_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let op = AsyncOperation::new(AsyncOptions::new().on_success(move |v: &i32| {
            assert_eq!(*v, 5);
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        let result = op.execute(async { Ok::<_, String>(5) }).await;

        assert_eq!(result, Ok(5));
        let state = op.state();
        assert_eq!(state.data, Some(5));
        assert!(state.succeeded);
        assert!(!state.pending);
        assert_eq!(state.error, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pending_while_in_flight() {
        let op = AsyncOperation::<i32>::new(AsyncOptions::new());
        let (tx, rx) = oneshot::channel();

        let call = op.execute(reply(rx));
        let driver = async {
            wait_until(&op, |s| s.pending).await;
            assert_eq!(op.state().phase(), Phase::Pending);
            tx.send(Ok(9)).unwrap();
        };
        let (result, ()) = tokio::join!(call, driver);

        assert_eq!(result, Ok(9));
        assert_eq!(op.state().phase(), Phase::Succeeded);
    }

    #[tokio::test]
    async fn test_failure_keeps_stale_data() {
        let failures = Arc::new(AtomicUsize::new(0));
        let seen = failures.clone();
        let op = AsyncOperation::new(AsyncOptions::new().on_error(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        op.execute(async { Ok::<_, String>(7) }).await.unwrap();
        let result = op.execute(async { Err::<i32, _>("offline") }).await;

        assert_eq!(result, Err(OperationError::invocation("offline")));
        let state = op.state();
        assert_eq!(state.data, Some(7));
        assert_eq!(state.error, Some(OperationError::invocation("offline")));
        assert!(!state.succeeded);
        assert!(!state.pending);
        assert_eq!(state.phase(), Phase::Failed);
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_cleared_on_start_by_default() {
        let op = AsyncOperation::<i32>::new(AsyncOptions::new());
        let _ = op.execute(async { Err::<i32, _>("first") }).await;

        let (tx, rx) = oneshot::channel();
        let call = op.execute(reply(rx));
        let driver = async {
            wait_until(&op, |s| s.pending).await;
            assert_eq!(op.state().error, None);
            tx.send(Ok(1)).unwrap();
        };
        tokio::join!(call, driver);
    }

    #[tokio::test]
    async fn test_keep_error_on_start() {
        let op = AsyncOperation::<i32>::new(AsyncOptions::new().keep_error_on_start());
        let _ = op.execute(async { Err::<i32, _>("first") }).await;

        let (tx, rx) = oneshot::channel();
        let call = op.execute(reply(rx));
        let driver = async {
            wait_until(&op, |s| s.pending).await;
            assert_eq!(op.state().error, Some(OperationError::invocation("first")));
            tx.send(Ok(1)).unwrap();
        };
        tokio::join!(call, driver);

        assert_eq!(op.state().error, None);
    }

    #[tokio::test]
    async fn test_reset_restores_baseline_and_suppresses_in_flight() {
        let successes = Arc::new(AtomicUsize::new(0));
        let seen = successes.clone();
        let op = AsyncOperation::new(AsyncOptions::new().initial_data(100).on_success(
            move |_: &i32| {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        ));
        let (tx, rx) = oneshot::channel();

        let call = op.execute(reply(rx));
        let driver = async {
            wait_until(&op, |s| s.pending).await;
            op.reset();
            assert_eq!(op.state(), AsyncState::new(Some(100)));
            tx.send(Ok(5)).unwrap();
        };
        let (result, ()) = tokio::join!(call, driver);

        // Caller still sees the value, state does not
        assert_eq!(result, Ok(5));
        assert_eq!(op.state(), AsyncState::new(Some(100)));
        assert_eq!(successes.load(Ordering::SeqCst), 0);

        // Calls after the reset write normally
        op.execute(async { Ok::<_, String>(6) }).await.unwrap();
        assert_eq!(op.data(), Some(6));
    }

    #[tokio::test]
    async fn test_teardown_freezes_state() {
        let successes = Arc::new(AtomicUsize::new(0));
        let seen = successes.clone();
        let op = AsyncOperation::new(AsyncOptions::new().on_success(move |_: &i32| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        let (tx, rx) = oneshot::channel();

        let call = op.execute(reply(rx));
        let driver = async {
            wait_until(&op, |s| s.pending).await;
            let before = op.state();
            op.teardown();
            tx.send(Ok(42)).unwrap();
            before
        };
        let (result, before) = tokio::join!(call, driver);

        assert_eq!(result, Ok(42));
        assert_eq!(op.state(), before);
        assert_eq!(successes.load(Ordering::SeqCst), 0);

        // Nothing after teardown writes either
        let _ = op.execute(async { Ok::<_, String>(1) }).await;
        op.reset();
        assert_eq!(op.state(), before);
    }

    #[tokio::test]
    async fn test_shared_token_tears_down_every_operation() {
        let token = CancelToken::new();
        let a = AsyncOperation::<i32>::with_token(AsyncOptions::new(), token.clone());
        let b = AsyncOperation::<i32>::with_token(AsyncOptions::new(), token.clone());

        token.cancel();
        let _ = a.execute(async { Ok::<_, String>(1) }).await;
        let _ = b.execute(async { Ok::<_, String>(2) }).await;

        assert!(a.is_torn_down());
        assert_eq!(a.state(), AsyncState::new(None));
        assert_eq!(b.state(), AsyncState::new(None));
    }

    #[tokio::test]
    async fn test_settlement_order_decides_final_state() {
        let op = AsyncOperation::<i32>::new(AsyncOptions::new());
        let (tx_first, rx_first) = oneshot::channel();
        let (tx_second, rx_second) = oneshot::channel();

        let first = op.execute(reply(rx_first));
        let second = op.execute(reply(rx_second));
        let driver = async {
            tokio::task::yield_now().await;

            // Second call settles first
            tx_second.send(Ok(2)).unwrap();
            wait_until(&op, |s| s.data == Some(2)).await;
            let mid = op.state();
            assert!(mid.pending, "first call is still in flight");
            assert!(!mid.succeeded);

            tx_first.send(Ok(1)).unwrap();
        };
        let (r1, r2, ()) = tokio::join!(first, second, driver);

        assert_eq!((r1, r2), (Ok(1), Ok(2)));
        let state = op.state();
        assert_eq!(state.data, Some(1));
        assert!(state.succeeded);
        assert!(!state.pending);
    }

    #[tokio::test]
    async fn test_late_failure_wins_over_earlier_success() {
        let op = AsyncOperation::<i32>::new(AsyncOptions::new());
        let (tx_first, rx_first) = oneshot::channel();
        let (tx_second, rx_second) = oneshot::channel();

        let first = op.execute(reply(rx_first));
        let second = op.execute(reply(rx_second));
        let driver = async {
            tokio::task::yield_now().await;
            tx_second.send(Ok(2)).unwrap();
            wait_until(&op, |s| s.data == Some(2)).await;
            tx_first.send(Err("late failure".to_string())).unwrap();
        };
        tokio::join!(first, second, driver);

        let state = op.state();
        assert_eq!(state.phase(), Phase::Failed);
        assert_eq!(state.data, Some(2));
        assert_eq!(state.error, Some(OperationError::invocation("late failure")));
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let op = AsyncOperation::<i32>::new(AsyncOptions::new());
        let mut rx = op.subscribe();

        op.execute(async { Ok::<_, String>(3) }).await.unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().data, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_call_releases_pending() {
        let op = AsyncOperation::<i32>::new(AsyncOptions::new());

        let slow = op.execute(async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, String>(1)
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), slow).await;

        assert!(timed_out.is_err());
        let state = op.state();
        assert!(!state.pending);
        assert_eq!(state.phase(), Phase::Idle);

        op.execute(async { Ok::<_, String>(2) }).await.unwrap();
        let state = op.state();
        assert_eq!(state.phase(), Phase::Succeeded);
        assert_eq!(state.data, Some(2));
    }

    #[tokio::test]
    async fn test_dropped_call_keeps_pending_for_others() {
        let op = AsyncOperation::<i32>::new(AsyncOptions::new());
        let (tx, rx) = oneshot::channel();
        let (_abandoned_tx, abandoned_rx) = oneshot::channel::<Reply>();

        let call = op.execute(reply(rx));
        let driver = async {
            let abandoned = op.execute(reply(abandoned_rx));
            // Poll once so the call registers, then drop it.
            assert!(futures_util::poll!(Box::pin(abandoned)).is_pending());
            assert!(op.state().pending);
            tx.send(Ok(4)).unwrap();
        };
        let (result, ()) = tokio::join!(call, driver);

        assert_eq!(result, Ok(4));
        let state = op.state();
        assert!(!state.pending);
        assert!(state.succeeded);
        assert_eq!(state.data, Some(4));
    }
}
