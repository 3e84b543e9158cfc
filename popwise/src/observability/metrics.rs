//! Metrics collection.
//!
//! Prometheus-compatible counters and histograms for campaign evaluation.
//! Every label value comes from a closed set (trigger kinds, surfaces,
//! outcomes), so cardinality is bounded by construction.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use popwise_core::config::{Surface, TriggerKind};

use crate::error::PopwiseError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// How a campaign evaluation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationOutcome {
    /// Triggers and session rules passed
    Passed,
    /// Triggers resolved false
    TriggersUnmet,
    /// Session rules rejected the campaign
    RulesFailed,
    /// Torn down before resolving
    Cancelled,
    /// An evaluation fault occurred; the campaign was shown anyway
    FailedOpen,
}

impl EvaluationOutcome {
    /// Returns the metrics label for this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::TriggersUnmet => "triggers_unmet",
            Self::RulesFailed => "rules_failed",
            Self::Cancelled => "cancelled",
            Self::FailedOpen => "failed_open",
        }
    }
}

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `PopwiseError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), PopwiseError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| PopwiseError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "popwise_evaluations_total",
        "Campaign evaluations by outcome"
    );
    describe_histogram!(
        "popwise_evaluation_duration_ms",
        "Time from evaluation start to decision in milliseconds"
    );
    describe_counter!(
        "popwise_trigger_fires_total",
        "Detector resolutions by trigger kind and result"
    );
    describe_counter!(
        "popwise_detector_faults_total",
        "Detectors that degraded to never firing"
    );
    describe_counter!(
        "popwise_evaluation_faults_total",
        "Unexpected evaluation faults (fail-open)"
    );
    describe_counter!(
        "popwise_campaigns_shown_total",
        "Campaigns handed to presentation by surface"
    );
    describe_counter!("popwise_dismissals_total", "Campaigns dismissed by visitors");
    describe_gauge!(
        "popwise_active_campaigns",
        "Campaigns currently evaluating or shown"
    );
}

/// Records a detector resolution.
pub fn record_trigger_resolved(kind: TriggerKind, fired: bool) {
    counter!(
        "popwise_trigger_fires_total",
        "kind" => kind.as_str(),
        "result" => if fired { "true" } else { "false" },
    )
    .increment(1);
}

/// Records a detector fault.
pub fn record_detector_fault(kind: TriggerKind) {
    counter!("popwise_detector_faults_total", "kind" => kind.as_str()).increment(1);
}

/// Records the end of a campaign evaluation.
pub fn record_evaluation(outcome: EvaluationOutcome, duration: Duration) {
    counter!("popwise_evaluations_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("popwise_evaluation_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

/// Records an evaluation fault at the given stage.
pub fn record_evaluation_fault(stage: &'static str) {
    counter!("popwise_evaluation_faults_total", "stage" => stage).increment(1);
}

/// Records a campaign shown on a surface.
pub fn record_campaign_shown(surface: Surface) {
    counter!("popwise_campaigns_shown_total", "surface" => surface.as_str()).increment(1);
}

/// Records a dismissal.
pub fn record_dismissal() {
    counter!("popwise_dismissals_total").increment(1);
}

/// Sets the number of campaigns currently registered with the orchestrator.
#[allow(clippy::cast_precision_loss)]
pub fn set_active_campaigns(count: usize) {
    gauge!("popwise_active_campaigns").set(count as f64);
}
