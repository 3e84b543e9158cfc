//! Product view watcher.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::debug;

use popwise_core::config::{ProductViewTrigger, TriggerKind};

use super::{Watch, WatchContext, sleep_until_opt};
use crate::error::DetectorError;
use crate::page::{Page, PageEvent};

/// Fires on product pages, optionally restricted to an allow-list and
/// gated on time spent on the page and a scroll interaction.
#[derive(Debug, Clone)]
pub struct ProductViewWatch {
    trigger: ProductViewTrigger,
}

impl ProductViewWatch {
    /// Creates a watcher from its settings.
    #[must_use]
    pub fn new(trigger: &ProductViewTrigger) -> Self {
        Self {
            trigger: trigger.clone(),
        }
    }
}

#[async_trait]
impl Watch for ProductViewWatch {
    fn kind(&self) -> TriggerKind {
        TriggerKind::ProductView
    }

    fn resolve_now(&self, page: &Page) -> Option<bool> {
        let Some(product) = page.context().product() else {
            debug!("not a product page");
            return Some(false);
        };
        if !self.trigger.product_ids.is_empty() && !product.matches_any(&self.trigger.product_ids) {
            debug!(product = %product.id, "product not in allow-list");
            return Some(false);
        }
        if self.trigger.has_deferred_conditions() {
            None
        } else {
            Some(true)
        }
    }

    async fn watch(&self, mut cx: WatchContext) -> Result<bool, DetectorError> {
        // minimum time counts from page load, not activation
        let mut time_deadline = self.trigger.min_time_on_page_ms.and_then(|ms| {
            let remaining = Duration::from_millis(ms).saturating_sub(cx.page.time_on_page());
            (!remaining.is_zero()).then(|| Instant::now() + remaining)
        });
        let mut scrolled = !self.trigger.require_scroll;

        loop {
            if time_deadline.is_none() && scrolled {
                return Ok(true);
            }
            tokio::select! {
                () = sleep_until_opt(time_deadline) => time_deadline = None,
                event = cx.next_event() => {
                    if matches!(event?, Some(PageEvent::Scroll)) {
                        scrolled = true;
                    }
                }
            }
        }
    }
}
