//! Query resource: a generic one-query async binder.
//!
//! Binds one dependency key to one result of type `T`, sourced from either
//! the deterministic mock engine or the backend, with automatic fallback.
//! The reactive re-fetch-on-dependency-change pattern is expressed as a
//! generation-tagged task: every key change or (re-)enable issues a new
//! monotonically increasing generation, and only the task matching the
//! current generation may commit state. A stale completion racing past its
//! cancellation is a no-op.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::DataMode;
use crate::error::FetchError;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Synchronous mock producer.
pub type MockFn<T> = Arc<dyn Fn() -> Result<T, FetchError> + Send + Sync>;

/// Backend producer, handed a cancellation token it may poll mid-flight.
pub type FetchFn<T> = Arc<dyn Fn(CancelToken) -> BoxFuture<Result<T, FetchError>> + Send + Sync>;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared cancellation flag handed to in-flight operations. Superseding a
/// generation cancels the previous token; well-behaved fetchers bail out
/// early, and the commit-time generation check catches the rest.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResourceStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Error,
}

/// Which producer actually supplied the data. `MockFallback` marks
/// degraded data substituted after a backend failure, so callers can
/// surface it distinctly from a plain mock run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataOrigin {
    #[default]
    Mock,
    Backend,
    MockFallback,
}

impl std::fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mock => write!(f, "mock"),
            Self::Backend => write!(f, "backend"),
            Self::MockFallback => write!(f, "mock-fallback"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceState<T> {
    pub status: ResourceStatus,
    pub data: Option<T>,
    pub error: Option<String>,
    pub source: DataOrigin,
    pub generation: u64,
}

impl<T> ResourceState<T> {
    fn idle() -> Self {
        Self {
            status: ResourceStatus::Idle,
            data: None,
            error: None,
            source: DataOrigin::Mock,
            generation: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ResourceOptions {
    pub enabled: bool,
    pub mode: DataMode,
    /// Artificial delay on the mock path, preserving realistic loading
    /// states. Tests pass `Duration::ZERO`.
    pub mock_delay: Duration,
    /// Substitute mock data when the backend fails.
    pub fallback_to_mock: bool,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: crate::config::data_mode(),
            mock_delay: crate::config::default_mock_delay(),
            fallback_to_mock: true,
        }
    }
}

// ---------------------------------------------------------------------------
// QueryResource
// ---------------------------------------------------------------------------

pub struct QueryResource<T: Clone + Send + Sync + 'static> {
    inner: Arc<Inner<T>>,
}

struct Inner<T: Clone + Send + Sync + 'static> {
    mode: DataMode,
    mock_delay: Duration,
    fallback_to_mock: bool,
    enabled: AtomicBool,
    mock: MockFn<T>,
    fetch: FetchFn<T>,
    generation: AtomicU64,
    key: Mutex<Option<String>>,
    cancel: Mutex<Option<CancelToken>>,
    tx: watch::Sender<ResourceState<T>>,
}

impl<T: Clone + Send + Sync + 'static> QueryResource<T> {
    pub fn new(options: ResourceOptions, mock: MockFn<T>, fetch: FetchFn<T>) -> Self {
        let (tx, _rx) = watch::channel(ResourceState::idle());
        Self {
            inner: Arc::new(Inner {
                mode: options.mode,
                mock_delay: options.mock_delay,
                fallback_to_mock: options.fallback_to_mock,
                enabled: AtomicBool::new(options.enabled),
                mock,
                fetch,
                generation: AtomicU64::new(0),
                key: Mutex::new(None),
                cancel: Mutex::new(None),
                tx,
            }),
        }
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> ResourceState<T> {
        self.inner.tx.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.inner.tx.subscribe()
    }

    /// Wait until the resource leaves `Loading` and return that state.
    pub async fn settled(&self) -> ResourceState<T> {
        let mut rx = self.subscribe();
        let state = rx
            .wait_for(|s| s.status != ResourceStatus::Loading)
            .await
            .map(|s| s.clone());
        // The sender lives on `self`, so the channel cannot be closed here;
        // fall back to the snapshot anyway.
        state.unwrap_or_else(|_| self.snapshot())
    }

    /// Bind the resource to a (new) dependency key. A changed key — or any
    /// bind while enabled — cancels in-flight work and starts a new
    /// generation. Binding while disabled only records the key.
    pub fn bind(&self, key: impl Into<String>) {
        *self.inner.key.lock() = Some(key.into());
        if self.inner.enabled.load(Ordering::SeqCst) {
            self.inner.clone().start_generation();
        }
    }

    /// Enable or disable the resource. Disabling cancels in-flight work
    /// and returns to `Idle`; enabling starts a fresh generation for the
    /// currently bound key.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.inner.enabled.swap(enabled, Ordering::SeqCst);
        if enabled && !was {
            if self.inner.key.lock().is_some() {
                self.inner.clone().start_generation();
            }
        } else if !enabled && was {
            self.inner.cancel_inflight();
            // Bump so any in-flight completion is stale.
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.inner.tx.send_modify(|state| {
                *state = ResourceState::idle();
                state.generation = generation;
            });
        }
    }

    /// Force a new operation for the same dependency key, without cycling
    /// through `Idle`.
    pub fn refetch(&self) {
        if self.inner.enabled.load(Ordering::SeqCst) && self.inner.key.lock().is_some() {
            self.inner.clone().start_generation();
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Inner<T> {
    fn cancel_inflight(&self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
    }

    fn start_generation(self: Arc<Self>) {
        self.cancel_inflight();
        let token = CancelToken::new();
        *self.cancel.lock() = Some(token.clone());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(generation, "query resource: starting operation");
        self.tx.send_modify(|state| {
            *state = ResourceState {
                status: ResourceStatus::Loading,
                data: None,
                error: None,
                source: DataOrigin::Mock,
                generation,
            };
        });
        let inner = self.clone();
        tokio::spawn(async move {
            inner.run_operation(generation, token).await;
        });
    }

    async fn run_operation(self: Arc<Self>, generation: u64, token: CancelToken) {
        let outcome: Result<(T, DataOrigin), FetchError> = match self.mode {
            DataMode::Mock => {
                if !self.mock_delay.is_zero() {
                    tokio::time::sleep(self.mock_delay).await;
                }
                (self.mock)().map(|data| (data, DataOrigin::Mock))
            }
            DataMode::Backend => match (self.fetch)(token.clone()).await {
                Ok(data) => Ok((data, DataOrigin::Backend)),
                Err(FetchError::Cancelled) => return,
                Err(err) if self.fallback_to_mock && err.recoverable_by_fallback() => {
                    match (self.mock)() {
                        Ok(data) => {
                            warn!(
                                generation,
                                error = %err,
                                "backend fetch failed; substituting mock data"
                            );
                            Ok((data, DataOrigin::MockFallback))
                        }
                        Err(mock_err) => {
                            debug!(
                                generation,
                                error = %mock_err,
                                "mock fallback failed; surfacing original backend error"
                            );
                            Err(err)
                        }
                    }
                }
                Err(err) => Err(err),
            },
        };

        if token.is_cancelled() {
            debug!(generation, "query resource: dropping cancelled completion");
            return;
        }

        let committed = self.tx.send_if_modified(|state| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            match &outcome {
                Ok((data, source)) => {
                    *state = ResourceState {
                        status: ResourceStatus::Ready,
                        data: Some(data.clone()),
                        error: None,
                        source: *source,
                        generation,
                    };
                }
                Err(err) => {
                    *state = ResourceState {
                        status: ResourceStatus::Error,
                        data: None,
                        error: Some(err.to_string()),
                        source: match self.mode {
                            DataMode::Mock => DataOrigin::Mock,
                            DataMode::Backend => DataOrigin::Backend,
                        },
                        generation,
                    };
                }
            }
            true
        });
        if !committed {
            debug!(generation, "query resource: dropping superseded completion");
        }
    }
}
