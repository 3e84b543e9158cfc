//! External collaborators
//!
//! The engine talks to the outside world through three seams:
//!
//! - [`CampaignSource`]: delivers the active campaigns for a visitor
//! - [`FrequencyRecorder`]: records that a campaign was shown
//! - [`Presenter`]: renders a campaign and reports when it is closed
//!
//! Each seam has a file or HTTP backed implementation for the CLI and an
//! in-memory one for tests.

pub mod file;
pub mod http;
pub mod presenter;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::oneshot;

use popwise_core::config::{Campaign, Surface};

use crate::error::CollaboratorError;

pub use file::FileCampaignSource;
pub use http::{HttpCampaignSource, HttpFrequencyRecorder};
pub use presenter::LogPresenter;

/// Delivers the campaigns active for a visitor.
#[async_trait]
pub trait CampaignSource: Send + Sync {
    /// Fetches the active campaigns.
    ///
    /// # Errors
    ///
    /// Returns `CollaboratorError` if the campaigns cannot be retrieved or
    /// parsed.
    async fn fetch_active_campaigns(
        &self,
        session_id: &str,
        visitor_id: &str,
    ) -> Result<Vec<Campaign>, CollaboratorError>;
}

/// Records campaign impressions for frequency bookkeeping.
#[async_trait]
pub trait FrequencyRecorder: Send + Sync {
    /// Records one impression of `tracking_key` in `session_id`.
    ///
    /// # Errors
    ///
    /// Returns `CollaboratorError` if the backend rejects the record.
    async fn record_frequency(
        &self,
        session_id: &str,
        tracking_key: &str,
    ) -> Result<(), CollaboratorError>;
}

/// Hands a selected campaign to presentation.
pub trait Presenter: Send + Sync {
    /// Shows `campaign` on `surface`. The presenter calls
    /// [`CloseHandle::close`] when the visitor dismisses it.
    fn present(&self, campaign: &Campaign, surface: Surface, close: CloseHandle);
}

/// Recorder that discards every impression.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

#[async_trait]
impl FrequencyRecorder for NoopRecorder {
    async fn record_frequency(
        &self,
        _session_id: &str,
        _tracking_key: &str,
    ) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// Signals that a presented campaign was closed.
///
/// Clones share one underlying signal; only the first `close` is delivered.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl CloseHandle {
    /// Creates a handle and the receiver that observes it.
    #[must_use]
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            rx,
        )
    }

    /// Reports the close. Returns `false` if already closed or nobody is
    /// listening anymore.
    pub fn close(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some_and(|tx| tx.send(()).is_ok())
    }

    /// Returns `true` once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_delivered_once() {
        let (handle, rx) = CloseHandle::new();
        let clone = handle.clone();

        assert!(handle.close());
        assert!(!clone.close());
        assert!(clone.is_closed());
        assert!(rx.await.is_ok());
    }

    #[test]
    fn test_receiver_pending_until_close() {
        let (handle, rx) = CloseHandle::new();
        let mut closed = tokio_test::task::spawn(rx);

        tokio_test::assert_pending!(closed.poll());
        assert!(handle.close());
        assert!(closed.is_woken());
        tokio_test::assert_ready_ok!(closed.poll());
    }

    #[test]
    fn test_close_without_listener() {
        let (handle, rx) = CloseHandle::new();
        drop(rx);
        assert!(!handle.close());
        assert!(handle.is_closed());
    }

    #[tokio::test]
    async fn test_noop_recorder() {
        assert!(NoopRecorder.record_frequency("s", "k").await.is_ok());
    }
}
