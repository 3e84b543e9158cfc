//! Scripted page visits
//!
//! A script describes the initial page state and a timeline of visitor
//! actions. [`run_script`] replays it against an [`Orchestrator`] in real
//! time, then unloads the page.
//!
//! ```yaml
//! page:
//!   viewport: { scroll_height: 3000, client_height: 1000 }
//! steps:
//!   - at: 2s
//!     action: scroll_to
//!     top: 1200
//!   - at: 4s
//!     action: close
//!     campaign: welcome
//! duration: 10s
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::collab::LogPresenter;
use crate::error::PopwiseError;
use crate::orchestrator::Orchestrator;
use crate::page::{CartSnapshot, PageEvent, PageSnapshot, SimulatedPage};

// ============================================================================
// Script
// ============================================================================

/// A scripted page visit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageScript {
    /// Initial page state
    #[serde(default)]
    pub page: PageSnapshot,

    /// Visitor actions, replayed in `at` order
    #[serde(default)]
    pub steps: Vec<ScriptStep>,

    /// When the page unloads, measured from page load. Defaults to the
    /// last step.
    #[serde(default, deserialize_with = "optional_duration")]
    pub duration: Option<Duration>,
}

impl PageScript {
    /// Reads a script from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, PopwiseError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Returns the unload time: `duration` if set, else the last step.
    #[must_use]
    pub fn end(&self) -> Duration {
        self.duration.unwrap_or_else(|| {
            self.steps
                .iter()
                .map(|s| s.at)
                .max()
                .unwrap_or(Duration::ZERO)
        })
    }
}

/// One timed visitor action.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptStep {
    /// Offset from page load (`"250ms"`, `"3s"`, `"1m 30s"`)
    #[serde(deserialize_with = "duration")]
    pub at: Duration,

    /// What happens
    #[serde(flatten)]
    pub action: StepAction,
}

/// A visitor action.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StepAction {
    /// Pointer moves to viewport coordinates
    PointerMove {
        /// Horizontal position
        #[serde(default)]
        x: f64,
        /// Vertical position
        y: f64,
    },
    /// Pointer button pressed
    PointerDown,
    /// Key pressed
    KeyDown,
    /// Touch started
    Touch,
    /// Click
    Click,
    /// Document scrolls to an offset
    ScrollTo {
        /// New vertical offset
        top: f64,
    },
    /// DOM custom event
    Dom {
        /// Event name
        name: String,
        /// Event detail
        #[serde(default)]
        detail: serde_json::Value,
    },
    /// Cart library event
    CartLibrary {
        /// Event name
        name: String,
        /// Event detail
        #[serde(default)]
        detail: serde_json::Value,
    },
    /// Live cart changes (no event is published)
    SetCart {
        /// New cart, absent for unreadable
        #[serde(default)]
        cart: Option<CartSnapshot>,
    },
    /// Visitor closes a shown campaign
    Close {
        /// Campaign id
        campaign: String,
    },
}

fn duration<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

fn optional_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    Option::<String>::deserialize(deserializer)?
        .map(|raw| humantime::parse_duration(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

// ============================================================================
// Runner
// ============================================================================

/// Replays `script` and unloads the page at its end.
///
/// The orchestrator must be built over a page backed by `sim`. Campaigns
/// should already be set up; timing is measured from the page handle's
/// load instant.
pub async fn run_script(
    orchestrator: &Arc<Orchestrator>,
    sim: &SimulatedPage,
    presenter: &LogPresenter,
    script: &PageScript,
) {
    let loaded_at = Instant::now() - orchestrator.page().time_on_page();
    let mut steps: Vec<&ScriptStep> = script.steps.iter().collect();
    steps.sort_by_key(|s| s.at);

    for step in steps {
        tokio::time::sleep_until(loaded_at + step.at).await;
        debug!(at = ?step.at, action = ?step.action, "script step");
        apply(orchestrator, sim, presenter, &step.action);
    }

    tokio::time::sleep_until(loaded_at + script.end()).await;
    info!(shown = ?presenter.shown(), "page unloading");
    orchestrator.cleanup();
    orchestrator.wait_idle().await;
}

fn apply(
    orchestrator: &Orchestrator,
    sim: &SimulatedPage,
    presenter: &LogPresenter,
    action: &StepAction,
) {
    let page = orchestrator.page();
    match action {
        StepAction::PointerMove { x, y } => {
            page.emit(PageEvent::PointerMove { x: *x, y: *y });
        }
        StepAction::PointerDown => {
            page.emit(PageEvent::PointerDown);
        }
        StepAction::KeyDown => {
            page.emit(PageEvent::KeyDown);
        }
        StepAction::Touch => {
            page.emit(PageEvent::Touch);
        }
        StepAction::Click => {
            page.emit(PageEvent::Click);
        }
        StepAction::ScrollTo { top } => {
            sim.scroll_to(*top);
            page.emit(PageEvent::Scroll);
        }
        StepAction::Dom { name, detail } => {
            page.emit(PageEvent::Dom {
                name: name.clone(),
                detail: detail.clone(),
            });
        }
        StepAction::CartLibrary { name, detail } => {
            page.emit(PageEvent::CartLibrary {
                name: name.clone(),
                detail: detail.clone(),
            });
        }
        StepAction::SetCart { cart } => sim.set_cart(*cart),
        StepAction::Close { campaign } => {
            if !presenter.close(campaign) {
                warn!(campaign = %campaign, "close step for a campaign that is not shown");
            }
        }
    }
}
