//! # Paginated Loader
//!
//! Page-at-a-time loading over a caller-supplied fetch function.
//!
//! ```text
//!            mount()                load_next()              load_previous()
//!               │                        │                          │
//!               ▼                        ▼                          ▼
//!   load_page(initial_page)   has_next? ──no──► Precondition   has_previous? ──no──► Precondition
//!               │                        │yes                       │yes
//!               ▼                        ▼                          ▼
//!        fetch(page, size)      load_page(current + 1)     load_page(current - 1)
//!               │
//!        Ok ────┴──── Err
//!        │              │
//!  current_page = page  stale page data stays visible
//! ```
//!
//! Precondition failures are returned to the caller only. They never
//! reach `AsyncState.error` and never call the fetch function.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::error::{OperationError, OperationResult};
use crate::operation::{AsyncOperation, AsyncOptions, AsyncState};

// =============================================================================
// Page Data
// =============================================================================

/// One page of results as returned by the fetch function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedData<T> {
    pub items: Vec<T>,
    /// Total items across all pages.
    pub total: u64,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl<T> PaginatedData<T> {
    pub fn has_next(&self) -> bool {
        u64::from(self.page) * u64::from(self.page_size) < self.total
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// `ceil(total / page_size)`.
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(u64::from(self.page_size))
    }
}

// =============================================================================
// Loader
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    pub page_size: u32,
    pub initial_page: u32,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        LoaderOptions {
            page_size: 10,
            initial_page: 1,
        }
    }
}

type PageFetch<T> =
    Arc<dyn Fn(u32, u32) -> BoxFuture<'static, OperationResult<PaginatedData<T>>> + Send + Sync>;

/// Loads pages through `fetch(page, page_size)` and tracks the current one.
///
/// ```rust
/// use storefront_state::{LoaderOptions, PaginatedData, PaginatedLoader};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let loader = PaginatedLoader::new(LoaderOptions::default(), |page, page_size| async move {
///     Ok::<_, String>(PaginatedData { items: vec!["theme"], total: 25, page, page_size })
/// });
///
/// loader.mount().await;
/// assert_eq!(loader.total_pages(), 3);
/// loader.load_next().await.unwrap();
/// assert_eq!(loader.current_page(), 2);
/// # }
/// ```
pub struct PaginatedLoader<T> {
    operation: AsyncOperation<PaginatedData<T>>,
    fetch: PageFetch<T>,
    options: LoaderOptions,
    current_page: Arc<AtomicU32>,
    mounted: Arc<AtomicBool>,
}

impl<T> Clone for PaginatedLoader<T> {
    fn clone(&self) -> Self {
        PaginatedLoader {
            operation: self.operation.clone(),
            fetch: Arc::clone(&self.fetch),
            options: self.options,
            current_page: Arc::clone(&self.current_page),
            mounted: Arc::clone(&self.mounted),
        }
    }
}

impl<T> PaginatedLoader<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut, E>(options: LoaderOptions, fetch: F) -> Self
    where
        F: Fn(u32, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PaginatedData<T>, E>> + Send + 'static,
        E: fmt::Display,
    {
        Self::with_token(options, CancelToken::new(), fetch)
    }

    /// Creates a loader bound to a scope's cancellation token.
    pub fn with_token<F, Fut, E>(options: LoaderOptions, token: CancelToken, fetch: F) -> Self
    where
        F: Fn(u32, u32) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PaginatedData<T>, E>> + Send + 'static,
        E: fmt::Display,
    {
        let fetch: PageFetch<T> = Arc::new(move |page, page_size| {
            fetch(page, page_size)
                .map(|result| result.map_err(OperationError::invocation))
                .boxed()
        });

        PaginatedLoader {
            operation: AsyncOperation::with_token(AsyncOptions::new(), token),
            fetch,
            options,
            current_page: Arc::new(AtomicU32::new(options.initial_page)),
            mounted: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    /// Performs the initial load. Only the first call does anything.
    pub async fn mount(&self) {
        if self.mounted.swap(true, Ordering::SeqCst) {
            debug!("Loader already mounted");
            return;
        }

        if let Err(e) = self.load_page(self.options.initial_page).await {
            warn!(page = self.options.initial_page, error = %e, "Initial page load failed");
        }
    }

    /// Fetches `page` (1-based) and makes it current on success.
    pub async fn load_page(&self, page: u32) -> OperationResult<PaginatedData<T>> {
        if page == 0 {
            return Err(OperationError::precondition("pages start at 1"));
        }

        debug!(page, page_size = self.options.page_size, "Loading page");
        let ticket = self.operation.begin();
        let result = (self.fetch)(page, self.options.page_size).await;

        // The page number moves together with `data` so they never disagree.
        self.operation.settle_with(ticket, &result, |_| {
            self.current_page.store(page, Ordering::SeqCst);
        });
        result
    }

    pub async fn load_next(&self) -> OperationResult<PaginatedData<T>> {
        if !self.has_next() {
            return Err(OperationError::precondition("no next page"));
        }
        self.load_page(self.current_page().saturating_add(1)).await
    }

    pub async fn load_previous(&self) -> OperationResult<PaginatedData<T>> {
        if !self.has_previous() {
            return Err(OperationError::precondition("no previous page"));
        }
        self.load_page(self.current_page().saturating_sub(1)).await
    }

    pub fn current_page(&self) -> u32 {
        self.current_page.load(Ordering::SeqCst)
    }

    /// From the last loaded page; false before any data.
    pub fn has_next(&self) -> bool {
        self.with_data(PaginatedData::has_next).unwrap_or(false)
    }

    pub fn has_previous(&self) -> bool {
        self.with_data(PaginatedData::has_previous).unwrap_or(false)
    }

    /// Zero until a page has loaded.
    pub fn total_pages(&self) -> u64 {
        self.with_data(PaginatedData::total_pages).unwrap_or(0)
    }

    pub fn state(&self) -> AsyncState<PaginatedData<T>> {
        self.operation.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<AsyncState<PaginatedData<T>>> {
        self.operation.subscribe()
    }

    pub fn teardown(&self) {
        self.operation.teardown();
    }

    fn with_data<R>(&self, f: impl FnOnce(&PaginatedData<T>) -> R) -> Option<R> {
        self.operation.inspect(|s| s.data.as_ref().map(f))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
