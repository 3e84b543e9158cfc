//! HTTP collaborators.
//!
//! `GET {base}/campaigns/active` for campaigns and `POST {base}/frequency`
//! for impressions. Redirects are not followed.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect;
use serde::Serialize;
use tracing::{debug, warn};

use popwise_core::config::Campaign;

use super::{CampaignSource, FrequencyRecorder};
use crate::config::ConfigLoader;
use crate::error::CollaboratorError;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client(timeout: Duration) -> Result<reqwest::Client, CollaboratorError> {
    Ok(reqwest::Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(timeout)
        .build()?)
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}

// ============================================================================
// Campaign Source
// ============================================================================

/// Fetches active campaigns from the campaign backend.
#[derive(Debug, Clone)]
pub struct HttpCampaignSource {
    client: reqwest::Client,
    url: String,
    loader: std::sync::Arc<ConfigLoader>,
}

impl HttpCampaignSource {
    /// Creates a source for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `CollaboratorError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "campaigns/active"),
            loader: std::sync::Arc::new(ConfigLoader::with_defaults()),
        })
    }

    /// Returns the campaigns endpoint.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl CampaignSource for HttpCampaignSource {
    async fn fetch_active_campaigns(
        &self,
        session_id: &str,
        visitor_id: &str,
    ) -> Result<Vec<Campaign>, CollaboratorError> {
        debug!(url = %self.url, "fetching active campaigns");
        let response = self
            .client
            .get(&self.url)
            .query(&[("session_id", session_id), ("visitor_id", visitor_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }

        let body = response.text().await?;
        let result = self.loader.parse(&body, Path::new(&self.url))?;
        for warning in &result.warnings {
            warn!(source = %self.url, "{warning}");
        }
        Ok(result.campaigns)
    }
}

// ============================================================================
// Frequency Recorder
// ============================================================================

#[derive(Debug, Serialize)]
struct FrequencyRecord<'a> {
    session_id: &'a str,
    tracking_key: &'a str,
}

/// Posts impressions to the campaign backend.
#[derive(Debug, Clone)]
pub struct HttpFrequencyRecorder {
    client: reqwest::Client,
    url: String,
}

impl HttpFrequencyRecorder {
    /// Creates a recorder for the backend at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `CollaboratorError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CollaboratorError> {
        Ok(Self {
            client: build_client(timeout)?,
            url: endpoint(base_url, "frequency"),
        })
    }
}

#[async_trait]
impl FrequencyRecorder for HttpFrequencyRecorder {
    async fn record_frequency(
        &self,
        session_id: &str,
        tracking_key: &str,
    ) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&FrequencyRecord {
                session_id,
                tracking_key,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                url: self.url.clone(),
            });
        }
        Ok(())
    }
}
