//! Readiness gate for the externally loaded chat SDK.
//!
//! One gate is built per process and shared by handle. It guarantees:
//! - the SDK loader is injected at most once, and concurrent `initialize()`
//!   callers share a single load + poll sequence;
//! - a positive readiness answer is trusted for a TTL window, then re-checked
//!   against the live host so a vanished SDK is noticed;
//! - readiness subscribers are notified in subscription order, and one
//!   panicking subscriber does not stop delivery to the rest.
//!
//! ```text
//! Uninitialized ──initialize()──▶ Initializing ──SDK seen──▶ Ready
//!                                       │                     │
//!                          poll exhausted / load error   TTL re-check miss
//!                                       ▼                     ▼
//!                                  Unavailable ◀──────────────┘
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::config::SdkConfig;
use super::host::{ChatSdk, SdkHost};

// ─── Public Types ────────────────────────────────────────────────────────────

/// Lifecycle phase of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePhase {
    Uninitialized,
    Initializing,
    Ready,
    Unavailable,
}

/// Snapshot of the gate's readiness bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct ServiceReadinessState {
    /// At least one `initialize()` sequence has finished.
    pub is_initialized: bool,
    pub is_ready: bool,
    pub last_ready_check: Option<Instant>,
    pub phase: GatePhase,
}

/// Loader URL, poll budget and TTL.
#[derive(Debug, Clone)]
pub struct GateSettings {
    pub sdk_url: String,
    pub poll_attempts: u32,
    pub poll_interval: Duration,
    pub readiness_ttl: Duration,
}

impl GateSettings {
    pub fn from_config(sdk: &SdkConfig) -> Self {
        Self {
            sdk_url: sdk.url.clone(),
            poll_attempts: sdk.poll_attempts.max(1),
            poll_interval: Duration::from_millis(sdk.poll_interval_ms),
            readiness_ttl: Duration::from_secs(sdk.readiness_ttl_secs),
        }
    }
}

type ReadyCallback = Arc<dyn Fn() + Send + Sync>;
type InitFuture = Shared<BoxFuture<'static, bool>>;

struct GateInner {
    host: Arc<dyn SdkHost>,
    settings: GateSettings,
    state: Mutex<ServiceReadinessState>,
    /// The shared `initialize()` sequence, while one is running.
    in_flight: Mutex<Option<InitFuture>>,
    subscribers: Mutex<Vec<(u64, ReadyCallback)>>,
    next_subscriber: AtomicU64,
}

/// Cloneable handle to the process-wide readiness gate.
#[derive(Clone)]
pub struct ReadinessGate {
    inner: Arc<GateInner>,
}

/// Handle returned by [`ReadinessGate::on_ready`].
pub struct ReadySubscription {
    id: Option<u64>,
    gate: Weak<GateInner>,
}

impl ReadySubscription {
    /// Stop receiving readiness notifications. No-op if already delivered
    /// synchronously or if the gate is gone.
    pub fn unsubscribe(self) {
        let (Some(id), Some(inner)) = (self.id, self.gate.upgrade()) else {
            return;
        };
        lock(&inner.subscribers).retain(|(sub_id, _)| *sub_id != id);
    }
}

// ─── ReadinessGate ───────────────────────────────────────────────────────────

impl ReadinessGate {
    pub fn new(host: Arc<dyn SdkHost>, settings: GateSettings) -> Self {
        Self {
            inner: Arc::new(GateInner {
                host,
                settings,
                state: Mutex::new(ServiceReadinessState {
                    is_initialized: false,
                    is_ready: false,
                    last_ready_check: None,
                    phase: GatePhase::Uninitialized,
                }),
                in_flight: Mutex::new(None),
                subscribers: Mutex::new(Vec::new()),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> ServiceReadinessState {
        *lock(&self.inner.state)
    }

    pub fn phase(&self) -> GatePhase {
        lock(&self.inner.state).phase
    }

    pub fn settings(&self) -> &GateSettings {
        &self.inner.settings
    }

    /// The live SDK, straight from the host.
    pub fn sdk(&self) -> Option<Arc<dyn ChatSdk>> {
        self.inner.host.sdk()
    }

    // ─── Initialization ──────────────────────────────────────────────────

    /// Load the SDK if needed and wait for it to appear.
    ///
    /// Idempotent. Concurrent callers await the same sequence, so the loader
    /// is injected and polled once no matter how many callers race here.
    /// Returns whether the SDK became available; never fails.
    pub async fn initialize(&self) -> bool {
        if self.is_service_ready() {
            return true;
        }

        let in_flight = {
            let mut slot = lock(&self.inner.in_flight);
            match slot.as_ref() {
                Some(existing) => existing.clone(),
                None => {
                    let gate = self.clone();
                    let sequence = async move { gate.run_initialize().await }.boxed().shared();
                    *slot = Some(sequence.clone());
                    sequence
                }
            }
        };

        in_flight.await
    }

    async fn run_initialize(self) -> bool {
        let available = self.load_and_poll().await;

        {
            let mut state = lock(&self.inner.state);
            state.is_initialized = true;
            if !available && !state.is_ready {
                state.phase = GatePhase::Unavailable;
            }
        }
        // A later call may retry. Hosts only report a loader once it has loaded.
        *lock(&self.inner.in_flight) = None;

        available
    }

    async fn load_and_poll(&self) -> bool {
        let host = &self.inner.host;
        let settings = &self.inner.settings;

        if !host.is_supported() {
            tracing::warn!("AI SDK cannot be loaded in this environment");
            return false;
        }

        {
            let mut state = lock(&self.inner.state);
            if state.phase != GatePhase::Ready {
                state.phase = GatePhase::Initializing;
            }
        }

        if host.has_loader(&settings.sdk_url) {
            tracing::debug!(url = %settings.sdk_url, "AI SDK loader already present");
        } else {
            tracing::info!(url = %settings.sdk_url, "injecting AI SDK loader");
            if let Err(e) = host.inject_loader(&settings.sdk_url).await {
                tracing::warn!(error = %e, "AI SDK loader failed");
                return false;
            }
        }

        for attempt in 1..=settings.poll_attempts {
            if host.sdk().is_some() {
                tracing::info!(attempt, "AI SDK ready");
                self.mark_ready();
                return true;
            }
            if attempt < settings.poll_attempts {
                tokio::time::sleep(settings.poll_interval).await;
            }
        }

        tracing::warn!(
            attempts = settings.poll_attempts,
            interval_ms = settings.poll_interval.as_millis() as u64,
            "AI SDK did not become available"
        );
        false
    }

    // ─── Readiness Oracle ────────────────────────────────────────────────

    /// Whether the SDK is usable right now.
    ///
    /// Constant-time inside the TTL window after a positive check; otherwise
    /// asks the host whether the SDK is still present.
    pub fn is_service_ready(&self) -> bool {
        let now = Instant::now();
        {
            let state = lock(&self.inner.state);
            let fresh = state
                .last_ready_check
                .is_some_and(|checked| now.duration_since(checked) < self.inner.settings.readiness_ttl);
            if state.is_ready && fresh {
                return true;
            }
        }

        if self.inner.host.sdk().is_some() {
            self.mark_ready();
            return true;
        }

        let mut state = lock(&self.inner.state);
        if state.is_ready {
            tracing::warn!("AI SDK disappeared, readiness revoked");
            state.is_ready = false;
            state.phase = GatePhase::Unavailable;
        }
        state.last_ready_check = Some(now);
        false
    }

    /// Wait up to `timeout` for the SDK to become ready.
    ///
    /// The bound covers both the shared `initialize()` sequence and the wait
    /// for a readiness notification that follows it.
    pub async fn ensure_ready(&self, timeout: Duration) -> bool {
        if self.is_service_ready() {
            return true;
        }

        let deadline = Instant::now() + timeout;
        match tokio::time::timeout_at(deadline, self.initialize()).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(_) => return self.is_service_ready(),
        }
        if self.is_service_ready() {
            return true;
        }

        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let subscription = self.on_ready(move || {
            if let Some(tx) = lock(&tx).take() {
                let _ = tx.send(());
            }
        });

        let ready = matches!(tokio::time::timeout_at(deadline, rx).await, Ok(Ok(())));
        subscription.unsubscribe();

        if !ready {
            tracing::debug!(
                timeout_ms = timeout.as_millis() as u64,
                "timed out waiting for AI SDK readiness"
            );
        }
        ready
    }

    // ─── Subscribers ─────────────────────────────────────────────────────

    /// Register `callback` for readiness transitions.
    ///
    /// Runs it immediately (and registers nothing) if the SDK is already ready.
    pub fn on_ready<F>(&self, callback: F) -> ReadySubscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        let callback: ReadyCallback = Arc::new(callback);
        let ready_now = self.is_service_ready();

        // Checked again under the subscriber lock so a concurrent
        // `mark_ready` either sees this subscriber or is seen here.
        let registered = {
            let mut subscribers = lock(&self.inner.subscribers);
            if ready_now || lock(&self.inner.state).is_ready {
                None
            } else {
                let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
                subscribers.push((id, Arc::clone(&callback)));
                Some(id)
            }
        };

        match registered {
            Some(id) => ReadySubscription {
                id: Some(id),
                gate: Arc::downgrade(&self.inner),
            },
            None => {
                invoke_subscriber(0, callback.as_ref());
                ReadySubscription {
                    id: None,
                    gate: Weak::new(),
                }
            }
        }
    }

    fn mark_ready(&self) {
        let was_ready = {
            let mut state = lock(&self.inner.state);
            let was_ready = state.is_ready;
            state.is_ready = true;
            state.is_initialized = true;
            state.last_ready_check = Some(Instant::now());
            state.phase = GatePhase::Ready;
            was_ready
        };

        if !was_ready {
            self.notify_ready();
        }
    }

    fn notify_ready(&self) {
        let callbacks: Vec<(u64, ReadyCallback)> = lock(&self.inner.subscribers)
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        tracing::debug!(subscribers = callbacks.len(), "notifying readiness subscribers");
        for (id, callback) in callbacks {
            invoke_subscriber(id, callback.as_ref());
        }
    }
}

fn invoke_subscriber(id: u64, callback: &(dyn Fn() + Send + Sync)) {
    if catch_unwind(AssertUnwindSafe(callback)).is_err() {
        tracing::warn!(subscriber = id, "readiness subscriber panicked");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
