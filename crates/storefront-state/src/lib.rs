//! # storefront-state: Async Operation State for the Storefront
//!
//! Observable state containers for the storefront's asynchronous calls:
//! product and plugin listings, cart loads, payment initiation.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Async State Architecture                         │
//! │                                                                         │
//! │   UI scope (mounts, renders from subscriptions, unmounts)               │
//! │        │ owns                                                           │
//! │        ▼                                                                │
//! │  ┌──────────────┐                                                       │
//! │  │ CancelToken  │──── cancelled on unmount ────────────┐               │
//! │  └──────┬───────┘                                      │               │
//! │         │ shared by                                    ▼               │
//! │  ┌──────┴─────────┐  ┌────────────────┐  ┌──────────────────────────┐  │
//! │  │ AsyncOperation │◄─│  RetryPolicy   │  │  PaginatedLoader         │  │
//! │  │                │  │                │  │                          │  │
//! │  │ data / pending │  │ attempt count  │  │ current page, has_next,  │  │
//! │  │ error /        │  │ backoff sleeps │  │ has_previous,            │  │
//! │  │ succeeded      │  │ retry hooks    │  │ total_pages              │  │
//! │  └───────┬────────┘  └────────────────┘  └────────────┬─────────────┘  │
//! │          │ watch::Receiver<AsyncState<T>>             │                │
//! │          └──────────────────► subscribers ◄───────────┘                │
//! │                                                                         │
//! │  SUSPENSION POINTS: the wrapped fetch call and the retry backoff timer │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`operation`] - `AsyncOperation`, the base state machine
//! - [`retry`] - `RetryPolicy` with exponential or constant backoff
//! - [`pagination`] - `PaginatedLoader` and `PaginatedData`
//! - [`cancel`] - `CancelToken` for teardown
//! - [`config`] - `StorefrontConfig` (TOML + env overrides)
//! - [`error`] - `OperationError` and `ConfigError`
//!
//! ## Example Usage
//! ```rust
//! use storefront_state::{AsyncOperation, AsyncOptions, CancelToken};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let scope = CancelToken::new();
//! let payment = AsyncOperation::with_token(AsyncOptions::new(), scope.clone());
//!
//! let receipt = payment.execute(async { Ok::<_, String>("pay_123") }).await;
//! assert_eq!(receipt.unwrap(), "pay_123");
//!
//! // Unmount: nothing below writes to `payment` any more
//! scope.cancel();
//! assert!(payment.is_torn_down());
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cancel;
pub mod config;
pub mod error;
pub mod operation;
pub mod pagination;
pub mod retry;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cancel::CancelToken;
pub use config::{PaginationSettings, PricingSettings, RetrySettings, StorefrontConfig};
pub use error::{ConfigError, ConfigResult, OperationError, OperationResult};
pub use operation::{AsyncOperation, AsyncOptions, AsyncState, Phase};
pub use pagination::{LoaderOptions, PaginatedData, PaginatedLoader};
pub use retry::{RetryConfig, RetryHooks, RetryPolicy, RetryState};
