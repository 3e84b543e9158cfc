//! Campaign orchestration
//!
//! Drives one page view: selects the winning campaigns, evaluates each
//! winner's triggers and session rules, hands passing campaigns to the
//! presenter, and records dismissals when the visitor closes them.
//!
//! Every campaign owns a scope keyed by its campaign id. The scope holds
//! the campaign's cancellation token and its detector sets; removing the
//! scope tears all of it down. Campaigns sharing a tracking key (variants
//! of one experiment on different surfaces) keep separate scopes, so one
//! variant finishing never cancels another. A page-level token, cancelled by
//! [`Orchestrator::cleanup`], parents every campaign token.
//!
//! Evaluation faults fail open: the campaign is shown.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use popwise_core::config::Campaign;

use crate::collab::{CampaignSource, CloseHandle, FrequencyRecorder, Presenter};
use crate::combinator::TriggerCombinator;
use crate::detector::DetectorScope;
use crate::error::CollaboratorError;
use crate::observability::events::{Event, EventEmitter};
use crate::observability::metrics::{self, EvaluationOutcome};
use crate::page::Page;
use crate::selector::{self, Selection};
use crate::session::SessionState;
use crate::session_rules;

// ============================================================================
// Options
// ============================================================================

/// Collaborators and settings for an [`Orchestrator`].
pub struct OrchestratorOptions {
    /// The page being visited
    pub page: Page,
    /// Visitor state for this page view
    pub session: Arc<SessionState>,
    /// Presentation hand-off
    pub presenter: Arc<dyn Presenter>,
    /// Impression recorder
    pub recorder: Arc<dyn FrequencyRecorder>,
    /// Structured event stream
    pub events: Arc<EventEmitter>,
    /// Campaign id requested through a preview link
    pub preview: Option<String>,
}

// ============================================================================
// Campaign Scope
// ============================================================================

/// Everything a campaign holds while registered.
#[derive(Debug)]
struct CampaignScope {
    tracking_key: String,
    token: CancellationToken,
    detectors: DetectorScope,
    resolved: Vec<TriggerCombinator>,
}

impl Drop for CampaignScope {
    fn drop(&mut self) {
        self.token.cancel();
        self.detectors.release();
    }
}

/// How trigger evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerOutcome {
    Resolved(bool),
    Cancelled,
    Fault,
}

/// Releases a campaign's own scope when its task ends, including by panic.
struct TeardownGuard {
    orchestrator: Arc<Orchestrator>,
    campaign_id: String,
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        self.orchestrator.release(&self.campaign_id);
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Page-level campaign driver.
pub struct Orchestrator {
    page: Page,
    session: Arc<SessionState>,
    presenter: Arc<dyn Presenter>,
    recorder: Arc<dyn FrequencyRecorder>,
    events: Arc<EventEmitter>,
    preview: Option<String>,
    scopes: DashMap<String, CampaignScope>,
    shutdown: CancellationToken,
    tasks: TaskTracker,
}

impl Orchestrator {
    /// Creates an orchestrator for one page view.
    #[must_use]
    pub fn new(opts: OrchestratorOptions) -> Self {
        Self {
            page: opts.page,
            session: opts.session,
            presenter: opts.presenter,
            recorder: opts.recorder,
            events: opts.events,
            preview: opts.preview.filter(|id| !id.is_empty()),
            scopes: DashMap::new(),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    /// Returns the page handle.
    #[must_use]
    pub const fn page(&self) -> &Page {
        &self.page
    }

    /// Returns the visitor state.
    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Returns the ids of campaigns with registered scopes, sorted.
    #[must_use]
    pub fn registered(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.scopes.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Returns `true` once [`cleanup`](Self::cleanup) ran.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // ========================================================================
    // Trigger Evaluation
    // ========================================================================

    /// Evaluates a campaign's triggers with a fresh combinator.
    ///
    /// Resolves `false` if the page or the campaign is torn down first, and
    /// `true` on an evaluation fault. Detectors that are still observing
    /// after resolution stay registered until the campaign is torn down.
    pub async fn evaluate_triggers(&self, campaign: &Campaign) -> bool {
        match self.run_triggers(campaign).await {
            TriggerOutcome::Resolved(fired) => fired,
            TriggerOutcome::Cancelled => false,
            TriggerOutcome::Fault => true,
        }
    }

    async fn run_triggers(&self, campaign: &Campaign) -> TriggerOutcome {
        let key = campaign.id.as_str();
        let Some(token) = self.register(campaign) else {
            return TriggerOutcome::Cancelled;
        };

        let mut combinator = TriggerCombinator::new(&campaign.triggers, &self.page);
        trace!(campaign = %campaign.id, kinds = ?combinator.kinds(), "evaluating triggers");
        if let Some(mut scope) = self.scopes.get_mut(key) {
            scope.detectors.push(combinator.disposer());
        }

        let started = Instant::now();
        let result = tokio::select! {
            biased;
            () = token.cancelled() => None,
            result = combinator.evaluate() => Some(result),
        };

        let Some(result) = result else {
            debug!(campaign = %campaign.id, "trigger evaluation cancelled");
            return TriggerOutcome::Cancelled;
        };

        let operator = combinator.operator();
        if let Some(mut scope) = self.scopes.get_mut(key) {
            scope.resolved.push(combinator);
        }

        match result {
            Ok(fired) => {
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                debug!(campaign = %campaign.id, fired, elapsed_ms, "triggers resolved");
                self.events.emit(Event::TriggerFired {
                    timestamp: Utc::now(),
                    campaign_id: campaign.id.clone(),
                    operator,
                    result: fired,
                    elapsed_ms,
                });
                TriggerOutcome::Resolved(fired)
            }
            Err(e) => {
                warn!(campaign = %campaign.id, error = %e, "trigger evaluation failed; showing campaign");
                self.fault(campaign, "triggers", &e.to_string());
                TriggerOutcome::Fault
            }
        }
    }

    /// Returns the campaign token, creating the scope if needed. `None`
    /// after page cleanup.
    fn register(&self, campaign: &Campaign) -> Option<CancellationToken> {
        if self.shutdown.is_cancelled() {
            return None;
        }
        let token = self
            .scopes
            .entry(campaign.id.clone())
            .or_insert_with(|| CampaignScope {
                tracking_key: campaign.tracking_key().to_string(),
                token: self.shutdown.child_token(),
                detectors: DetectorScope::new(),
                resolved: Vec::new(),
            })
            .token
            .clone();
        metrics::set_active_campaigns(self.scopes.len());
        Some(token)
    }

    fn fault(&self, campaign: &Campaign, stage: &'static str, error: &str) {
        metrics::record_evaluation_fault(stage);
        self.events.emit(Event::EvaluationFault {
            timestamp: Utc::now(),
            campaign_id: campaign.id.clone(),
            stage: stage.to_string(),
            error: error.to_string(),
        });
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Releases every campaign registered under `tracking_key`. Idempotent.
    pub fn teardown(&self, tracking_key: &str) {
        let before = self.scopes.len();
        self.scopes.retain(|_, scope| scope.tracking_key != tracking_key);
        let removed = before.saturating_sub(self.scopes.len());
        if removed > 0 {
            debug!(tracking_key, removed, "campaign torn down");
            metrics::set_active_campaigns(self.scopes.len());
        }
    }

    /// Releases the scope of one campaign.
    fn release(&self, campaign_id: &str) {
        if self.scopes.remove(campaign_id).is_some() {
            debug!(campaign = campaign_id, "campaign released");
            metrics::set_active_campaigns(self.scopes.len());
        }
    }

    /// Tears down every campaign and stops pending tasks. Idempotent.
    pub fn cleanup(&self) {
        if !self.shutdown.is_cancelled() {
            info!(campaigns = self.scopes.len(), "cleaning up page");
        }
        self.shutdown.cancel();
        self.scopes.clear();
        metrics::set_active_campaigns(0);
    }

    /// Waits for every campaign task spawned so far to finish.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }

    // ========================================================================
    // Page Driver
    // ========================================================================

    /// Fetches the visitor's campaigns and sets them up.
    ///
    /// # Errors
    ///
    /// Returns `CollaboratorError` if the campaign source fails. Nothing is
    /// shown in that case.
    pub async fn boot(
        self: &Arc<Self>,
        source: &dyn CampaignSource,
    ) -> Result<Vec<Selection>, CollaboratorError> {
        let campaigns = source
            .fetch_active_campaigns(self.session.session_id(), self.session.visitor_id())
            .await
            .inspect_err(|e| warn!(error = %e, "failed to fetch campaigns"))?;
        Ok(self.setup_campaigns(&campaigns))
    }

    /// Selects the winning campaigns and spawns one task per winner.
    ///
    /// Returns the selections in priority order.
    pub fn setup_campaigns(self: &Arc<Self>, campaigns: &[Campaign]) -> Vec<Selection> {
        if self.shutdown.is_cancelled() {
            warn!("setup after cleanup ignored");
            return Vec::new();
        }

        let selections = selector::select(
            campaigns,
            |key| self.session.is_dismissed(key),
            self.preview.as_deref(),
        );

        info!(
            candidates = campaigns.len(),
            selected = selections.len(),
            "campaigns selected"
        );
        self.events.emit(Event::CampaignsSelected {
            timestamp: Utc::now(),
            candidates: campaigns.len(),
            campaign_ids: selections.iter().map(|s| s.campaign.id.clone()).collect(),
            surfaces: selections.iter().map(|s| s.surface).collect(),
        });

        for selection in &selections {
            let orchestrator = Arc::clone(self);
            let selection = selection.clone();
            self.tasks.spawn(async move {
                orchestrator.run_campaign(selection).await;
            });
        }
        selections
    }

    async fn run_campaign(self: Arc<Self>, selection: Selection) {
        let Selection {
            campaign,
            surface,
            preview,
        } = selection;
        let tracking_key = campaign.tracking_key().to_string();
        let _guard = TeardownGuard {
            orchestrator: Arc::clone(&self),
            campaign_id: campaign.id.clone(),
        };
        let started = Instant::now();

        let outcome = if preview {
            debug!(campaign = %campaign.id, "preview bypasses triggers");
            EvaluationOutcome::Passed
        } else {
            match self.run_triggers(&campaign).await {
                TriggerOutcome::Cancelled => {
                    self.suppress(&campaign, EvaluationOutcome::Cancelled, started);
                    return;
                }
                TriggerOutcome::Resolved(false) => {
                    self.suppress(&campaign, EvaluationOutcome::TriggersUnmet, started);
                    return;
                }
                TriggerOutcome::Resolved(true) => self.check_rules(&campaign),
                TriggerOutcome::Fault => EvaluationOutcome::FailedOpen,
            }
        };

        if outcome == EvaluationOutcome::RulesFailed {
            self.suppress(&campaign, outcome, started);
            return;
        }
        metrics::record_evaluation(outcome, started.elapsed());

        if !preview {
            let recorder = Arc::clone(&self.recorder);
            let session_id = self.session.session_id().to_string();
            let key = tracking_key.clone();
            self.tasks.spawn(async move {
                if let Err(e) = recorder.record_frequency(&session_id, &key).await {
                    warn!(tracking_key = %key, error = %e, "failed to record frequency");
                }
            });
        }

        let (close, closed) = CloseHandle::new();
        self.presenter.present(&campaign, surface, close);
        metrics::record_campaign_shown(surface);
        self.events.emit(Event::CampaignShown {
            timestamp: Utc::now(),
            campaign_id: campaign.id.clone(),
            tracking_key: tracking_key.clone(),
            surface,
            preview,
        });

        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => {
                debug!(campaign = %campaign.id, "page closed while campaign shown");
            }
            result = closed => {
                if result.is_ok() {
                    self.dismiss(&campaign, preview);
                } else {
                    debug!(campaign = %campaign.id, "presenter released campaign without closing");
                }
            }
        }
    }

    /// Evaluates session rules, failing open if the page context panics.
    fn check_rules(&self, campaign: &Campaign) -> EvaluationOutcome {
        let context = self.page.context();
        let rules = campaign.session_rules.as_ref();
        match std::panic::catch_unwind(AssertUnwindSafe(|| {
            session_rules::evaluate(rules, context)
        })) {
            Ok(true) => EvaluationOutcome::Passed,
            Ok(false) => EvaluationOutcome::RulesFailed,
            Err(_) => {
                warn!(campaign = %campaign.id, "session rule evaluation failed; showing campaign");
                self.fault(campaign, "session_rules", "session rule evaluation panicked");
                EvaluationOutcome::FailedOpen
            }
        }
    }

    fn suppress(&self, campaign: &Campaign, outcome: EvaluationOutcome, started: Instant) {
        debug!(campaign = %campaign.id, reason = outcome.as_str(), "campaign suppressed");
        metrics::record_evaluation(outcome, started.elapsed());
        self.events.emit(Event::CampaignSuppressed {
            timestamp: Utc::now(),
            campaign_id: campaign.id.clone(),
            reason: outcome.as_str().to_string(),
        });
    }

    fn dismiss(&self, campaign: &Campaign, preview: bool) {
        let tracking_key = campaign.tracking_key();
        let recorded = !preview && self.session.dismiss(tracking_key);
        if recorded {
            metrics::record_dismissal();
        }
        info!(campaign = %campaign.id, tracking_key, recorded, "campaign dismissed");
        self.events.emit(Event::CampaignDismissed {
            timestamp: Utc::now(),
            campaign_id: campaign.id.clone(),
            tracking_key: tracking_key.to_string(),
            recorded,
        });
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("registered", &self.scopes.len())
            .field("tasks", &self.tasks.len())
            .field("shut_down", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// ============================================================================
// Tests
// ============================================================================
