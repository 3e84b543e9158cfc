//! Trigger detectors
//!
//! One watcher per trigger kind, all driven by the same activation runner.
//!
//! # Architecture
//!
//! - [`Watch`]: per-kind behaviour: an optional synchronous answer at
//!   activation plus an async watch over the page event stream
//! - [`Detector`]: activation lifecycle (`start` / `stop` / `destroy`)
//!   guaranteeing the callback runs at most once per activation
//! - [`Disposer`] / [`DetectorScope`]: structured cancellation handles
//!
//! Watch failures never escape: a watcher that returns an error is logged
//! and its detector simply never fires. A watcher that panics drops its
//! callback unfired, which the combinator reports as a lost detector.

pub mod cart;
pub mod custom_event;
pub mod exit_intent;
pub mod idle;
pub mod product_view;
pub mod scroll;
pub mod timer;

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use popwise_core::config::{TriggerKind, TriggerSpec};

use crate::error::DetectorError;
use crate::observability::metrics;
use crate::page::{Page, PageEvent};

/// Completion callback. Receives the trigger outcome.
pub type FireCallback = Box<dyn FnOnce(bool) + Send + 'static>;

// ============================================================================
// Watch
// ============================================================================

/// Everything a watcher gets for one activation.
pub struct WatchContext {
    /// The page being watched
    pub page: Page,
    /// Event subscription taken at activation time
    pub events: broadcast::Receiver<PageEvent>,
    /// When the detector was started
    pub activated_at: Instant,
}

impl WatchContext {
    /// Waits for the next page event.
    ///
    /// Returns `Ok(None)` if events were skipped because this watcher fell
    /// behind; the caller decides how to treat the gap.
    ///
    /// # Errors
    ///
    /// Returns `DetectorError::PageClosed` once the event stream ends.
    pub async fn next_event(&mut self) -> Result<Option<PageEvent>, DetectorError> {
        match self.events.recv().await {
            Ok(event) => Ok(Some(event)),
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "detector lagged behind page events");
                Ok(None)
            }
            Err(RecvError::Closed) => Err(DetectorError::PageClosed),
        }
    }
}

/// Per-kind trigger behaviour.
#[async_trait]
pub trait Watch: Send + Sync + 'static {
    /// Returns the trigger kind this watcher implements.
    fn kind(&self) -> TriggerKind;

    /// Answers synchronously at activation, before any task is spawned.
    ///
    /// `None` means the outcome depends on future events.
    fn resolve_now(&self, _page: &Page) -> Option<bool> {
        None
    }

    /// Watches the page until the trigger resolves.
    ///
    /// # Errors
    ///
    /// Returns a `DetectorError` when measurement is impossible; the
    /// detector then never fires.
    async fn watch(&self, cx: WatchContext) -> Result<bool, DetectorError>;
}

/// Builds the watcher for a trigger spec.
#[must_use]
pub fn watcher_for(spec: &TriggerSpec) -> Arc<dyn Watch> {
    match spec {
        TriggerSpec::PageLoad(t) => Arc::new(timer::PageLoadWatch::new(t)),
        TriggerSpec::TimeDelay(t) => Arc::new(timer::TimeDelayWatch::new(t)),
        TriggerSpec::ScrollDepth(t) => Arc::new(scroll::ScrollDepthWatch::new(t)),
        TriggerSpec::ExitIntent(t) => Arc::new(exit_intent::ExitIntentWatch::new(t)),
        TriggerSpec::IdleTimer(t) => Arc::new(idle::IdleWatch::new(t)),
        TriggerSpec::AddToCart(_) => Arc::new(cart::CartEventWatch::add_to_cart()),
        TriggerSpec::CartDrawerOpen(_) => Arc::new(cart::CartEventWatch::drawer_open()),
        TriggerSpec::CartValue(t) => Arc::new(cart::CartValueWatch::new(t)),
        TriggerSpec::ProductView(t) => Arc::new(product_view::ProductViewWatch::new(t)),
        TriggerSpec::CustomEvent(t) => Arc::new(custom_event::CustomEventWatch::new(t)),
    }
}

/// Sleeps until `deadline`, or forever when there is none.
pub(crate) async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ============================================================================
// Disposal
// ============================================================================

/// Cancellation handle for a detector or a whole detector set.
///
/// Cloning shares the underlying token; disposing any clone disposes all.
#[derive(Debug, Clone)]
pub struct Disposer {
    token: CancellationToken,
}

impl Disposer {
    pub(crate) const fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Cancels every watcher governed by this handle. Idempotent.
    pub fn dispose(&self) {
        self.token.cancel();
    }

    /// Returns `true` once disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Owns a list of disposers and releases them all when dropped.
#[derive(Debug, Default)]
pub struct DetectorScope {
    disposers: Vec<Disposer>,
}

impl DetectorScope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a disposer to the scope.
    pub fn push(&mut self, disposer: Disposer) {
        self.disposers.push(disposer);
    }

    /// Returns the number of held disposers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    /// Returns `true` if the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    /// Disposes everything in the scope. Safe to call repeatedly.
    pub fn release(&mut self) {
        for disposer in self.disposers.drain(..) {
            disposer.dispose();
        }
    }
}

impl Drop for DetectorScope {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================================
// Detector
// ============================================================================

/// Runtime state of a single activation. Never reused.
struct Activation {
    token: CancellationToken,
    state: Arc<ActivationState>,
}

struct ActivationState {
    kind: TriggerKind,
    callback: Mutex<Option<FireCallback>>,
    active: AtomicBool,
    fired: AtomicBool,
}

impl ActivationState {
    fn new(kind: TriggerKind, callback: FireCallback) -> Self {
        Self {
            kind,
            callback: Mutex::new(Some(callback)),
            active: AtomicBool::new(true),
            fired: AtomicBool::new(false),
        }
    }

    /// Delivers `result` unless the activation was stopped or already fired.
    fn fire(&self, token: &CancellationToken, result: bool) {
        let callback = {
            let mut slot = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
            if !self.active.load(Ordering::SeqCst) || token.is_cancelled() {
                return;
            }
            self.active.store(false, Ordering::SeqCst);
            self.fired.store(true, Ordering::SeqCst);
            slot.take()
        };
        token.cancel();

        debug!(kind = %self.kind, result, "trigger resolved");
        metrics::record_trigger_resolved(self.kind, result);

        if let Some(callback) = callback {
            callback(result);
        }
    }

    fn deactivate(&self) {
        let _slot = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        self.active.store(false, Ordering::SeqCst);
    }

    fn release_callback(&self) {
        let mut slot = self.callback.lock().unwrap_or_else(PoisonError::into_inner);
        slot.take();
    }
}

/// A trigger detector.
///
/// `start` begins observing and returns a [`Disposer`]; the callback runs
/// at most once, after which the detector stops itself. `stop` and
/// `destroy` are idempotent and safe in any state. Dropping a detector
/// stops it.
pub struct Detector {
    watcher: Arc<dyn Watch>,
    page: Page,
    parent: CancellationToken,
    activation: Option<Activation>,
}

impl Detector {
    /// Creates an idle detector for `spec`.
    ///
    /// Watcher tasks are cancelled when `parent` is cancelled.
    #[must_use]
    pub fn new(spec: &TriggerSpec, page: Page, parent: &CancellationToken) -> Self {
        Self::with_watcher(watcher_for(spec), page, parent)
    }

    /// Creates an idle detector around an arbitrary watcher.
    #[must_use]
    pub fn with_watcher(watcher: Arc<dyn Watch>, page: Page, parent: &CancellationToken) -> Self {
        Self {
            watcher,
            page,
            parent: parent.clone(),
            activation: None,
        }
    }

    /// Returns the trigger kind.
    #[must_use]
    pub fn kind(&self) -> TriggerKind {
        self.watcher.kind()
    }

    /// Returns `true` while observing.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.activation.as_ref().is_some_and(|a| {
            a.state.active.load(Ordering::SeqCst) && !a.token.is_cancelled()
        })
    }

    /// Returns `true` if the current activation fired.
    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.activation
            .as_ref()
            .is_some_and(|a| a.state.fired.load(Ordering::SeqCst))
    }

    /// Starts observing. A no-op returning the existing disposer if the
    /// detector is already active; the new callback is dropped in that case.
    pub fn start(&mut self, callback: FireCallback) -> Disposer {
        if let Some(activation) = self.activation.as_ref().filter(|_| self.is_active()) {
            trace!(kind = %self.kind(), "detector already active");
            return Disposer::new(activation.token.clone());
        }

        let kind = self.watcher.kind();
        let token = self.parent.child_token();
        let state = Arc::new(ActivationState::new(kind, callback));
        let disposer = Disposer::new(token.clone());

        if let Some(result) = self.watcher.resolve_now(&self.page) {
            state.fire(&token, result);
            self.activation = Some(Activation { token, state });
            return disposer;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(kind = %kind, "no async runtime; detector will never fire");
            self.activation = Some(Activation { token, state });
            return disposer;
        };

        let cx = WatchContext {
            events: self.page.subscribe(),
            page: self.page.clone(),
            activated_at: Instant::now(),
        };
        let watcher = Arc::clone(&self.watcher);
        let task_token = token.clone();
        let task_state = Arc::clone(&state);
        runtime.spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = task_token.cancelled() => None,
                result = AssertUnwindSafe(watcher.watch(cx)).catch_unwind() => Some(result),
            };
            match outcome {
                Some(Ok(Ok(result))) => task_state.fire(&task_token, result),
                Some(Ok(Err(e))) => {
                    warn!(kind = %kind, error = %e, "detector fault; trigger will never fire");
                    metrics::record_detector_fault(kind);
                }
                Some(Err(_)) => {
                    // dropping the callback tells the listener this detector is lost
                    warn!(kind = %kind, "detector panicked");
                    metrics::record_detector_fault(kind);
                    task_state.deactivate();
                    task_state.release_callback();
                }
                None => trace!(kind = %kind, "detector cancelled"),
            }
        });

        debug!(kind = %kind, "detector started");
        self.activation = Some(Activation { token, state });
        disposer
    }

    /// Stops observing and releases listeners and timers.
    pub fn stop(&mut self) {
        if let Some(activation) = &self.activation {
            activation.state.deactivate();
            activation.token.cancel();
        }
    }

    /// Stops and releases the callback.
    pub fn destroy(&mut self) {
        self.stop();
        if let Some(activation) = self.activation.take() {
            activation.state.release_callback();
        }
    }
}

impl Drop for Detector {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field("kind", &self.kind())
            .field("active", &self.is_active())
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}
