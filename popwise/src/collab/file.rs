//! Campaign source backed by a local YAML or JSON file.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::warn;

use popwise_core::config::Campaign;

use super::CampaignSource;
use crate::config::ConfigLoader;
use crate::error::CollaboratorError;

/// Reads campaigns from a file on every fetch.
#[derive(Debug)]
pub struct FileCampaignSource {
    path: PathBuf,
    loader: ConfigLoader,
}

impl FileCampaignSource {
    /// Creates a source for `path` with limits from the environment.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_loader(path, ConfigLoader::with_defaults())
    }

    /// Creates a source using the given loader.
    #[must_use]
    pub fn with_loader(path: impl Into<PathBuf>, loader: ConfigLoader) -> Self {
        Self {
            path: path.into(),
            loader,
        }
    }

    /// Returns the campaign file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CampaignSource for FileCampaignSource {
    async fn fetch_active_campaigns(
        &self,
        _session_id: &str,
        _visitor_id: &str,
    ) -> Result<Vec<Campaign>, CollaboratorError> {
        let result = self.loader.load(&self.path)?;
        for warning in &result.warnings {
            warn!(path = %self.path.display(), "{warning}");
        }
        Ok(result.campaigns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("campaigns.yaml");
        std::fs::write(&path, "campaigns:\n  - id: a\n    priority: 2\n  - id: b\n").unwrap();

        let source = FileCampaignSource::new(&path);
        let campaigns = source.fetch_active_campaigns("s", "v").await.unwrap();
        let ids: Vec<_> = campaigns.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let source = FileCampaignSource::new("/nonexistent/campaigns.yaml");
        let err = source.fetch_active_campaigns("s", "v").await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Config(_)));
    }
}
