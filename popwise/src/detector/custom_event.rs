//! Custom event watcher.

use async_trait::async_trait;

use popwise_core::config::{CustomEventTrigger, TriggerKind};

use super::{Watch, WatchContext};
use crate::error::DetectorError;
use crate::page::PageEvent;

/// Fires on the first DOM event whose name is configured.
#[derive(Debug, Clone)]
pub struct CustomEventWatch {
    names: Vec<String>,
}

impl CustomEventWatch {
    /// Creates a watcher from its settings.
    #[must_use]
    pub fn new(trigger: &CustomEventTrigger) -> Self {
        Self {
            names: trigger.names().into_iter().map(str::to_string).collect(),
        }
    }
}

#[async_trait]
impl Watch for CustomEventWatch {
    fn kind(&self) -> TriggerKind {
        TriggerKind::CustomEvent
    }

    async fn watch(&self, mut cx: WatchContext) -> Result<bool, DetectorError> {
        loop {
            if let Some(PageEvent::Dom { name, .. }) = cx.next_event().await? {
                if self.names.contains(&name) {
                    return Ok(true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use popwise_core::config::TriggerSpec;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::detector::Detector;
    use crate::detector::test_support::{oneshot_callback, page_with, settle};
    use crate::page::PageSnapshot;

    #[tokio::test]
    async fn test_legacy_event_name_is_honoured() {
        let (page, _) = page_with(PageSnapshot::default());
        let root = CancellationToken::new();
        let spec = TriggerSpec::CustomEvent(CustomEventTrigger {
            enabled: true,
            event_names: vec!["quiz:complete".to_string()],
            event_name: Some("newsletter:closed".to_string()),
        });
        let mut detector = Detector::new(&spec, page.clone(), &root);
        let (callback, mut rx) = oneshot_callback();
        detector.start(callback);
        settle().await;

        page.emit(PageEvent::CartLibrary {
            name: "newsletter:closed".to_string(),
            detail: Value::Null,
        });
        settle().await;
        assert!(rx.try_recv().is_err());

        page.emit(PageEvent::Dom {
            name: "newsletter:closed".to_string(),
            detail: Value::Null,
        });
        settle().await;
        assert_eq!(rx.try_recv(), Ok(true));
    }
}
