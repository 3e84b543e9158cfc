//! Idle timer watcher.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use popwise_core::config::{IdleTrigger, TriggerKind};

use super::{Watch, WatchContext};
use crate::error::DetectorError;

/// Fires after a period with no user activity. Every activity event
/// restarts the full countdown.
#[derive(Debug, Clone)]
pub struct IdleWatch {
    idle: Duration,
}

impl IdleWatch {
    /// Creates a watcher from its settings.
    #[must_use]
    pub const fn new(trigger: &IdleTrigger) -> Self {
        Self {
            idle: Duration::from_millis(trigger.idle_ms),
        }
    }
}

#[async_trait]
impl Watch for IdleWatch {
    fn kind(&self) -> TriggerKind {
        TriggerKind::IdleTimer
    }

    async fn watch(&self, mut cx: WatchContext) -> Result<bool, DetectorError> {
        let mut deadline = cx.activated_at + self.idle;
        loop {
            tokio::select! {
                () = tokio::time::sleep_until(deadline) => return Ok(true),
                event = cx.next_event() => {
                    // skipped events are assumed to include activity
                    if event?.is_none_or(|e| e.is_user_activity()) {
                        deadline = Instant::now() + self.idle;
                    }
                }
            }
        }
    }
}
