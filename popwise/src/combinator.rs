//! Trigger combination
//!
//! Runs every enabled detector of a campaign and folds their outcomes with
//! the campaign's logic operator:
//!
//! - `OR` resolves `true` on the first detector that fires `true`, and
//!   `false` only once every detector has resolved `false`
//! - `AND` waits for every detector and resolves `true` only if all fired
//!   `true`
//!
//! A campaign with no enabled triggers resolves `true` without starting
//! anything. Detectors left running after an `OR` short-circuit keep going
//! until the combinator is disposed or dropped.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use popwise_core::config::{LogicOperator, TriggerConfig, TriggerKind};

use crate::detector::{Detector, Disposer};
use crate::error::EvaluationError;
use crate::page::Page;

/// Combines a campaign's detectors under one logic operator.
#[derive(Debug)]
pub struct TriggerCombinator {
    operator: LogicOperator,
    detectors: Vec<Detector>,
    root: CancellationToken,
}

impl TriggerCombinator {
    /// Builds detectors for every enabled trigger in `config`.
    #[must_use]
    pub fn new(config: &TriggerConfig, page: &Page) -> Self {
        let root = CancellationToken::new();
        let detectors = config
            .enabled_triggers()
            .iter()
            .map(|spec| Detector::new(spec, page.clone(), &root))
            .collect();
        Self {
            operator: config.operator(),
            detectors,
            root,
        }
    }

    /// Returns the operator in effect.
    #[must_use]
    pub const fn operator(&self) -> LogicOperator {
        self.operator
    }

    /// Returns the kinds of the managed detectors.
    #[must_use]
    pub fn kinds(&self) -> Vec<TriggerKind> {
        self.detectors.iter().map(Detector::kind).collect()
    }

    /// Returns `true` if no trigger is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Returns the number of detectors still observing.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.detectors.iter().filter(|d| d.is_active()).count()
    }

    /// Returns a handle that stops every detector of this combinator.
    ///
    /// Disposal is final: later calls to [`evaluate`](Self::evaluate)
    /// resolve `false` without starting anything.
    #[must_use]
    pub fn disposer(&self) -> Disposer {
        Disposer::new(self.root.clone())
    }

    /// Starts all detectors and resolves with the combined outcome.
    ///
    /// The future stays pending while the outcome is undecided, including
    /// forever if a detector can never fire. A disposed combinator resolves
    /// `false`.
    ///
    /// # Errors
    ///
    /// Returns `EvaluationError::DetectorLost` if a detector is torn down
    /// without reporting.
    pub async fn evaluate(&mut self) -> Result<bool, EvaluationError> {
        if self.root.is_cancelled() {
            trace!("combinator disposed");
            return Ok(false);
        }
        if self.detectors.is_empty() {
            trace!("no enabled triggers");
            return Ok(true);
        }

        debug!(operator = %self.operator, detectors = self.detectors.len(), "evaluating triggers");

        let mut outcomes = FuturesUnordered::new();
        for detector in &mut self.detectors {
            let kind = detector.kind();
            let (tx, rx) = oneshot::channel();
            detector.stop();
            detector.start(Box::new(move |fired| {
                let _ = tx.send(fired);
            }));
            outcomes.push(async move {
                rx.await
                    .map(|fired| (kind, fired))
                    .map_err(|_| EvaluationError::DetectorLost { kind })
            });
        }

        match self.operator {
            LogicOperator::Or => {
                while let Some(outcome) = outcomes.next().await {
                    let (kind, fired) = outcome?;
                    if fired {
                        debug!(kind = %kind, "OR satisfied");
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            LogicOperator::And => {
                let mut all = true;
                while let Some(outcome) = outcomes.next().await {
                    let (kind, fired) = outcome?;
                    if !fired {
                        debug!(kind = %kind, "AND condition failed");
                    }
                    all &= fired;
                }
                Ok(all)
            }
        }
    }
}

impl Drop for TriggerCombinator {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
