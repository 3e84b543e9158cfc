//! Presenter that logs campaigns instead of rendering them.

use dashmap::DashMap;
use tracing::info;

use popwise_core::config::{Campaign, Surface};

use super::{CloseHandle, Presenter};

/// Logs every presented campaign and keeps its close handle so callers can
/// simulate the visitor closing it.
#[derive(Debug, Default)]
pub struct LogPresenter {
    open: DashMap<String, (Surface, CloseHandle)>,
}

impl LogPresenter {
    /// Creates a presenter with nothing shown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the ids of campaigns currently shown, sorted.
    #[must_use]
    pub fn shown(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.open.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Returns the surface a shown campaign occupies.
    #[must_use]
    pub fn surface_of(&self, campaign_id: &str) -> Option<Surface> {
        self.open.get(campaign_id).map(|e| e.value().0)
    }

    /// Closes a shown campaign. Returns `false` if it is not shown.
    pub fn close(&self, campaign_id: &str) -> bool {
        match self.open.remove(campaign_id) {
            Some((_, (surface, handle))) => {
                info!(campaign = campaign_id, %surface, "campaign closed");
                handle.close()
            }
            None => false,
        }
    }
}

impl Presenter for LogPresenter {
    fn present(&self, campaign: &Campaign, surface: Surface, close: CloseHandle) {
        info!(
            campaign = %campaign.id,
            name = campaign.name.as_deref().unwrap_or(""),
            %surface,
            "campaign presented"
        );
        self.open.insert(campaign.id.clone(), (surface, close));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_present_then_close() {
        let presenter = LogPresenter::new();
        let (handle, rx) = CloseHandle::new();
        presenter.present(&Campaign::new("c1"), Surface::Modal, handle);

        assert_eq!(presenter.shown(), vec!["c1".to_string()]);
        assert_eq!(presenter.surface_of("c1"), Some(Surface::Modal));
        assert!(presenter.close("c1"));
        assert!(rx.await.is_ok());
        assert!(presenter.shown().is_empty());
        assert!(!presenter.close("c1"));
    }
}
