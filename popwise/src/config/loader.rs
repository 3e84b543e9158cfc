//! Campaign file loader
//!
//! Pipeline:
//! 1. Size limit check
//! 2. YAML parsing (JSON documents parse as YAML)
//! 3. Document shape: a bare list or `{ campaigns: [...] }`
//! 4. Per-campaign deserialization
//! 5. Validation

use std::path::Path;

use serde_yaml::Value;
use tracing::{debug, warn};

use popwise_core::config::Campaign;

use crate::config::validation::Validator;
use crate::error::ConfigError;

// ============================================================================
// Public API
// ============================================================================

/// Limits guarding against oversized campaign documents.
#[derive(Debug, Clone)]
pub struct ConfigLimits {
    /// Maximum number of campaigns per document.
    pub max_campaigns: usize,

    /// Maximum document size in bytes.
    pub max_config_size: usize,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            max_campaigns: env_or("POPWISE_MAX_CAMPAIGNS", 500),
            max_config_size: env_or("POPWISE_MAX_CONFIG_SIZE", 10 * 1024 * 1024),
        }
    }
}

/// Result of loading a campaign document.
#[derive(Debug)]
pub struct LoadResult {
    /// Campaigns in document order.
    pub campaigns: Vec<Campaign>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during campaign loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {location}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Campaign document loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    limits: ConfigLimits,
}

impl ConfigLoader {
    /// Creates a loader with the given limits.
    #[must_use]
    pub const fn new(limits: ConfigLimits) -> Self {
        Self { limits }
    }

    /// Creates a loader with limits taken from the environment.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Returns the limits in effect.
    #[must_use]
    pub const fn limits(&self) -> &ConfigLimits {
        &self.limits
    }

    /// Loads and validates a campaign file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - Parsing fails or the document has the wrong shape
    /// - Validation reports errors
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
        if size > self.limits.max_config_size {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.limits.max_config_size,
            });
        }

        let content = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let result = self.parse(&content, path)?;
        debug!(
            path = %path.display(),
            campaigns = result.campaigns.len(),
            warnings = result.warnings.len(),
            "campaign file loaded"
        );
        Ok(result)
    }

    /// Parses and validates a campaign document. `origin` is used in error
    /// messages only.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing or validation fails.
    pub fn parse(&self, content: &str, origin: &Path) -> Result<LoadResult, ConfigError> {
        if content.len() > self.limits.max_config_size {
            return Err(ConfigError::TooLarge {
                path: origin.to_path_buf(),
                size: content.len(),
                limit: self.limits.max_config_size,
            });
        }

        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let root: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: origin.to_path_buf(),
            line: e.location().map(|l| l.line()),
            message: e.to_string(),
        })?;

        let campaigns = campaigns_from_document(root, origin)?;

        let validation = Validator::new().validate(&campaigns, &self.limits);
        if validation.has_errors() {
            return Err(ConfigError::ValidationError {
                path: origin.display().to_string(),
                errors: validation.errors,
            });
        }

        let warnings = validation
            .warnings
            .into_iter()
            .map(|issue| LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            })
            .collect();

        Ok(LoadResult {
            campaigns,
            warnings,
        })
    }
}

// ============================================================================
// Document Shape
// ============================================================================

/// Extracts campaigns from a bare list or a `campaigns` mapping.
fn campaigns_from_document(root: Value, origin: &Path) -> Result<Vec<Campaign>, ConfigError> {
    let items = match root {
        Value::Null => {
            return Err(ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: None,
                message: "campaign file is empty".to_string(),
            });
        }
        Value::Sequence(items) => items,
        Value::Mapping(mut map) => match map.remove("campaigns") {
            Some(Value::Sequence(items)) => items,
            Some(Value::Null) => Vec::new(),
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    field: "campaigns".to_string(),
                    value: "non-list".to_string(),
                    expected: "a list of campaigns".to_string(),
                });
            }
            None => {
                return Err(ConfigError::InvalidValue {
                    field: "campaigns".to_string(),
                    value: "missing".to_string(),
                    expected: "a list of campaigns or a 'campaigns' key".to_string(),
                });
            }
        },
        _ => {
            return Err(ConfigError::InvalidValue {
                field: "campaigns".to_string(),
                value: "scalar".to_string(),
                expected: "a list of campaigns or a 'campaigns' key".to_string(),
            });
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_yaml::from_value(item).map_err(|e| ConfigError::ParseError {
                path: origin.to_path_buf(),
                line: None,
                message: format!("campaigns[{index}]: {e}"),
            })
        })
        .collect()
}

/// Parses an environment variable with a default value.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var = name, value = %raw, "ignoring unparseable limit override");
            default
        }),
        Err(_) => default,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use popwise_core::config::{CampaignType, LogicOperator, TriggerKind};

    use super::*;

    fn loader() -> ConfigLoader {
        ConfigLoader::new(ConfigLimits {
            max_campaigns: 10,
            max_config_size: 64 * 1024,
        })
    }

    #[test]
    fn test_parse_bare_list() {
        let yaml = r"
- id: welcome
  priority: 5
  type: popup
  triggers:
    time_delay: { enabled: true, delay_ms: 3000 }
    scroll_depth: { enabled: true, percentage: 40 }
    trigger_combination: { operator: OR }
";
        let result = loader().parse(yaml, Path::new("inline.yaml")).unwrap();
        assert_eq!(result.campaigns.len(), 1);
        let campaign = &result.campaigns[0];
        assert_eq!(campaign.priority, 5);
        assert_eq!(campaign.triggers.operator(), LogicOperator::Or);
        let kinds: Vec<_> = campaign
            .triggers
            .enabled_triggers()
            .iter()
            .map(popwise_core::config::TriggerSpec::kind)
            .collect();
        assert_eq!(kinds, vec![TriggerKind::TimeDelay, TriggerKind::ScrollDepth]);
    }

    #[test]
    fn test_parse_wrapped_json() {
        let json = r#"{"campaigns": [{"id": "bar", "campaignType": "free-shipping", "experimentId": "exp-2"}]}"#;
        let result = loader().parse(json, Path::new("active.json")).unwrap();
        assert_eq!(result.campaigns[0].campaign_type, CampaignType::FreeShipping);
        assert_eq!(result.campaigns[0].tracking_key(), "exp-2");
    }

    #[test]
    fn test_parse_empty_document() {
        let err = loader().parse("", Path::new("empty.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_parse_reports_campaign_index() {
        let yaml = "- id: ok\n- id: bad\n  priority: high\n";
        let err = loader().parse(yaml, Path::new("bad.yaml")).unwrap_err();
        assert!(err.to_string().contains("campaigns[1]"));
    }

    #[test]
    fn test_parse_wrong_shape() {
        let err = loader().parse("campaign: {}", Path::new("x.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_validation_errors_fail_load() {
        let yaml = "- id: dup\n- id: dup\n";
        let err = loader().parse(yaml, Path::new("dup.yaml")).unwrap_err();
        match err {
            ConfigError::ValidationError { errors, .. } => assert_eq!(errors.len(), 1),
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn test_validation_warnings_are_returned() {
        let yaml = "- id: c1\n  triggers:\n    hover_intent: { enabled: true }\n";
        let result = loader().parse(yaml, Path::new("warn.yaml")).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].message.contains("hover_intent"));
    }

    #[test]
    fn test_load_enforces_size_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![b'#'; 2048]).unwrap();
        let loader = ConfigLoader::new(ConfigLimits {
            max_campaigns: 10,
            max_config_size: 1024,
        });
        let err = loader.load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge { size: 2048, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = loader()
            .load(Path::new("/nonexistent/popwise/campaigns.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn test_config_limits_default() {
        let limits = ConfigLimits::default();
        assert!(limits.max_campaigns > 0);
        assert!(limits.max_config_size > 0);
    }
}
