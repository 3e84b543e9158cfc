//! Scroll depth watcher.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::warn;

use popwise_core::config::{ScrollDepthTrigger, TriggerKind};

use super::{Watch, WatchContext, sleep_until_opt};
use crate::error::DetectorError;
use crate::page::{Page, PageEvent, ScrollMetrics};

/// Fires once scroll depth reaches the configured percentage.
///
/// Depth is measured at activation and then after each burst of scroll
/// events has been quiet for the debounce interval. A page that cannot
/// scroll never fires.
#[derive(Debug, Clone)]
pub struct ScrollDepthWatch {
    threshold: f64,
    debounce: Duration,
}

impl ScrollDepthWatch {
    /// Creates a watcher from its settings.
    #[must_use]
    pub const fn new(trigger: &ScrollDepthTrigger) -> Self {
        Self {
            threshold: trigger.percentage,
            debounce: Duration::from_millis(trigger.debounce_ms),
        }
    }

    fn reached(&self, metrics: &ScrollMetrics) -> bool {
        metrics.scroll_height - metrics.client_height > 0.0
            && metrics.depth_percent() >= self.threshold
    }
}

#[async_trait]
impl Watch for ScrollDepthWatch {
    fn kind(&self) -> TriggerKind {
        TriggerKind::ScrollDepth
    }

    fn resolve_now(&self, page: &Page) -> Option<bool> {
        match page.context().scroll_metrics() {
            Ok(metrics) if self.reached(&metrics) => Some(true),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "initial scroll depth unreadable");
                None
            }
        }
    }

    async fn watch(&self, mut cx: WatchContext) -> Result<bool, DetectorError> {
        let mut pending: Option<Instant> = None;
        loop {
            tokio::select! {
                () = sleep_until_opt(pending) => {
                    pending = None;
                    let metrics = cx.page.context().scroll_metrics()?;
                    if self.reached(&metrics) {
                        return Ok(true);
                    }
                }
                event = cx.next_event() => match event? {
                    // a lag may have swallowed scrolls, so measure anyway
                    Some(PageEvent::Scroll) | None => {
                        pending = Some(Instant::now() + self.debounce);
                    }
                    Some(_) => {}
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use popwise_core::config::TriggerSpec;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::detector::Detector;
    use crate::detector::test_support::{oneshot_callback, page_with, settle};
    use crate::page::{PageSnapshot, Viewport};

    fn spec(percentage: f64) -> TriggerSpec {
        TriggerSpec::ScrollDepth(ScrollDepthTrigger {
            enabled: true,
            percentage,
            debounce_ms: 100,
        })
    }

    fn tall_page(scroll_top: f64) -> PageSnapshot {
        PageSnapshot {
            viewport: Viewport {
                scroll_top,
                scroll_height: 3000.0,
                client_height: 1000.0,
            },
            ..PageSnapshot::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_past_threshold_fires_at_activation() {
        let (page, _) = page_with(tall_page(1200.0));
        let root = CancellationToken::new();
        let mut detector = Detector::new(&spec(50.0), page.clone(), &root);
        let (callback, mut rx) = oneshot_callback();

        detector.start(callback);
        assert_eq!(rx.try_recv(), Ok(true));
        assert_eq!(page.subscriber_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_debounced_scroll() {
        let (page, sim) = page_with(tall_page(0.0));
        let root = CancellationToken::new();
        let mut detector = Detector::new(&spec(50.0), page.clone(), &root);
        let (callback, mut rx) = oneshot_callback();
        detector.start(callback);
        settle().await;

        sim.scroll_to(1100.0);
        page.emit(PageEvent::Scroll);
        settle().await;
        tokio::time::advance(Duration::from_millis(50)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(50)).await;
        settle().await;
        assert_eq!(rx.try_recv(), Ok(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shallow_scroll_does_not_fire() {
        let (page, sim) = page_with(tall_page(0.0));
        let root = CancellationToken::new();
        let mut detector = Detector::new(&spec(75.0), page.clone(), &root);
        let (callback, mut rx) = oneshot_callback();
        detector.start(callback);
        settle().await;

        sim.scroll_to(1000.0);
        page.emit(PageEvent::Scroll);
        settle().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
        assert!(detector.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_scrollable_page_never_fires() {
        let (page, _) = page_with(PageSnapshot::default());
        let root = CancellationToken::new();
        let mut detector = Detector::new(&spec(0.0), page.clone(), &root);
        let (callback, mut rx) = oneshot_callback();
        detector.start(callback);
        settle().await;

        page.emit(PageEvent::Scroll);
        settle().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreadable_metrics_never_fire() {
        let (page, _) = page_with(PageSnapshot {
            scroll_unavailable: true,
            ..tall_page(2000.0)
        });
        let root = CancellationToken::new();
        let mut detector = Detector::new(&spec(10.0), page.clone(), &root);
        let (callback, mut rx) = oneshot_callback();
        detector.start(callback);
        settle().await;

        page.emit(PageEvent::Scroll);
        settle().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
        assert!(!detector.has_fired());
    }
}
