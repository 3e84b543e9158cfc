//! Time-based watchers: page-load delay and time delay.

use std::time::Duration;

use async_trait::async_trait;

use popwise_core::config::{PageLoadTrigger, TimeDelayTrigger, TriggerKind};

use super::{Watch, WatchContext};
use crate::error::DetectorError;
use crate::page::Page;

/// Fires a fixed delay after activation. A zero delay fires on the next
/// scheduler tick rather than synchronously.
#[derive(Debug, Clone)]
pub struct PageLoadWatch {
    delay: Duration,
}

impl PageLoadWatch {
    /// Creates a watcher from its settings.
    #[must_use]
    pub const fn new(trigger: &PageLoadTrigger) -> Self {
        Self {
            delay: Duration::from_millis(trigger.delay_ms),
        }
    }
}

#[async_trait]
impl Watch for PageLoadWatch {
    fn kind(&self) -> TriggerKind {
        TriggerKind::PageLoad
    }

    async fn watch(&self, cx: WatchContext) -> Result<bool, DetectorError> {
        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep_until(cx.activated_at + self.delay).await;
        }
        Ok(true)
    }
}

/// Fires after a delay; resolves synchronously when `immediate` is set or
/// the delay is not positive.
#[derive(Debug, Clone)]
pub struct TimeDelayWatch {
    delay_ms: i64,
    immediate: bool,
}

impl TimeDelayWatch {
    /// Creates a watcher from its settings.
    #[must_use]
    pub const fn new(trigger: &TimeDelayTrigger) -> Self {
        Self {
            delay_ms: trigger.delay_ms,
            immediate: trigger.immediate,
        }
    }
}

#[async_trait]
impl Watch for TimeDelayWatch {
    fn kind(&self) -> TriggerKind {
        TriggerKind::TimeDelay
    }

    fn resolve_now(&self, _page: &Page) -> Option<bool> {
        (self.immediate || self.delay_ms <= 0).then_some(true)
    }

    async fn watch(&self, cx: WatchContext) -> Result<bool, DetectorError> {
        let delay = Duration::from_millis(self.delay_ms.unsigned_abs());
        tokio::time::sleep_until(cx.activated_at + delay).await;
        Ok(true)
    }
}
