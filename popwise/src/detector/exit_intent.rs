//! Exit intent watcher.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use popwise_core::config::{ExitIntentTrigger, TriggerKind};

use super::{Watch, WatchContext};
use crate::error::DetectorError;
use crate::page::{Page, PageEvent};

/// Fires when the pointer reaches the top edge of the viewport.
///
/// Touch devices have no pointer to leave with, so on mobile the trigger
/// resolves `false` at activation unless `allow_mobile` is set.
#[derive(Debug, Clone)]
pub struct ExitIntentWatch {
    threshold_px: f64,
    delay: Duration,
    allow_mobile: bool,
}

impl ExitIntentWatch {
    /// Creates a watcher from its settings.
    #[must_use]
    pub const fn new(trigger: &ExitIntentTrigger) -> Self {
        Self {
            threshold_px: trigger.sensitivity.threshold_px(),
            delay: Duration::from_millis(trigger.delay_ms),
            allow_mobile: trigger.allow_mobile,
        }
    }
}

#[async_trait]
impl Watch for ExitIntentWatch {
    fn kind(&self) -> TriggerKind {
        TriggerKind::ExitIntent
    }

    fn resolve_now(&self, page: &Page) -> Option<bool> {
        if !self.allow_mobile && page.is_mobile() {
            debug!("exit intent disabled on mobile");
            return Some(false);
        }
        None
    }

    async fn watch(&self, mut cx: WatchContext) -> Result<bool, DetectorError> {
        loop {
            if let Some(PageEvent::PointerMove { y, .. }) = cx.next_event().await? {
                if y <= self.threshold_px && cx.activated_at.elapsed() >= self.delay {
                    return Ok(true);
                }
            }
        }
    }
}
