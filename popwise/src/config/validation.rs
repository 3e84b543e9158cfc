//! Campaign validation
//!
//! Semantic checks on deserialized campaigns. Validation collects every
//! issue rather than stopping at the first one. Errors prevent loading;
//! warnings describe configuration the engine will ignore or treat as
//! vacuously true.

use std::collections::HashSet;

use popwise_core::config::{Campaign, RuleField, RuleOperator, SessionRules, TriggerConfig};

use crate::config::loader::ConfigLimits;
use crate::error::{Severity, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Result of campaign validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Campaign validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a campaign list and returns the result.
    pub fn validate(&mut self, campaigns: &[Campaign], limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        if campaigns.len() > limits.max_campaigns {
            self.add_error(
                "campaigns",
                &format!(
                    "Too many campaigns: {} (maximum: {}). \
                     Set POPWISE_MAX_CAMPAIGNS to increase the limit.",
                    campaigns.len(),
                    limits.max_campaigns
                ),
            );
        }

        let mut seen = HashSet::new();
        for (index, campaign) in campaigns.iter().enumerate() {
            let path = format!("campaigns[{index}]");

            if campaign.id.trim().is_empty() {
                self.add_error(&format!("{path}.id"), "Campaign id is required and cannot be empty");
            } else if !seen.insert(campaign.id.as_str()) {
                self.add_error(
                    &format!("{path}.id"),
                    &format!("Duplicate campaign id '{}'", campaign.id),
                );
            }

            if campaign.priority < 0 {
                self.add_warning(
                    &format!("{path}.priority"),
                    "Negative priority ranks below every default campaign",
                );
            }

            self.validate_triggers(&campaign.triggers, &format!("{path}.triggers"));
            if let Some(rules) = &campaign.session_rules {
                self.validate_session_rules(rules, &format!("{path}.session_rules"));
            }
        }

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Triggers
    // ========================================================================

    fn validate_triggers(&mut self, triggers: &TriggerConfig, path: &str) {
        for kind in triggers.unknown_kinds() {
            self.add_warning(
                &format!("{path}.{kind}"),
                &format!("Unknown trigger kind '{kind}' is ignored"),
            );
        }

        if let Some(scroll) = triggers.scroll_depth.as_ref().filter(|t| t.enabled) {
            if !(0.0..=100.0).contains(&scroll.percentage) {
                self.add_error(
                    &format!("{path}.scroll_depth.percentage"),
                    &format!(
                        "Scroll percentage must be between 0 and 100, got {}",
                        scroll.percentage
                    ),
                );
            }
        }

        if let Some(cart) = triggers.cart_value.as_ref().filter(|t| t.enabled) {
            if let (Some(min), Some(max)) = (cart.min_value, cart.max_value) {
                if min > max {
                    self.add_error(
                        &format!("{path}.cart_value"),
                        &format!("min_value ({min}) is greater than max_value ({max})"),
                    );
                }
            }
        }

        if let Some(custom) = triggers.custom_event.as_ref().filter(|t| t.enabled) {
            if custom.names().is_empty() {
                self.add_error(
                    &format!("{path}.custom_event.event_names"),
                    "Enabled custom event trigger has no event names and can never fire",
                );
            }
        }
    }

    // ========================================================================
    // Session Rules
    // ========================================================================

    fn validate_session_rules(&mut self, rules: &SessionRules, path: &str) {
        if rules.enabled && rules.conditions.is_empty() {
            self.add_warning(
                &format!("{path}.conditions"),
                "Session rules are enabled but have no conditions; they always pass",
            );
        }

        for (index, condition) in rules.conditions.iter().enumerate() {
            let condition_path = format!("{path}.conditions[{index}]");
            if let RuleField::Other(field) = &condition.field {
                self.add_warning(
                    &format!("{condition_path}.field"),
                    &format!("Unknown session rule field '{field}' is treated as satisfied"),
                );
            }
            if condition.operator == RuleOperator::Unknown {
                self.add_warning(
                    &format!("{condition_path}.operator"),
                    "Unknown session rule operator; the condition never passes",
                );
            }
        }
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use popwise_core::config::{
        CartValueTrigger, CustomEventTrigger, RuleCondition, ScrollDepthTrigger,
    };

    use super::*;

    fn limits() -> ConfigLimits {
        ConfigLimits {
            max_campaigns: 3,
            max_config_size: 1024,
        }
    }

    fn validate(campaigns: &[Campaign]) -> ValidationResult {
        Validator::new().validate(campaigns, &limits())
    }

    #[test]
    fn test_validate_minimal_campaign() {
        let result = validate(&[Campaign::new("c1")]);
        assert!(result.is_valid());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_validate_empty_and_duplicate_ids() {
        let result = validate(&[Campaign::new(""), Campaign::new("a"), Campaign::new("a")]);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].path, "campaigns[0].id");
        assert!(result.errors[1].message.contains("Duplicate"));
    }

    #[test]
    fn test_validate_too_many_campaigns() {
        let campaigns: Vec<_> = (0..4).map(|i| Campaign::new(format!("c{i}"))).collect();
        let result = validate(&campaigns);
        assert!(result.errors[0].message.contains("POPWISE_MAX_CAMPAIGNS"));
    }

    #[test]
    fn test_validate_collects_all_trigger_errors() {
        let mut campaign = Campaign::new("c1");
        campaign.triggers.scroll_depth = Some(ScrollDepthTrigger {
            enabled: true,
            percentage: 150.0,
            debounce_ms: 100,
        });
        campaign.triggers.cart_value = Some(CartValueTrigger {
            enabled: true,
            min_value: Some(100.0),
            max_value: Some(50.0),
        });
        campaign.triggers.custom_event = Some(CustomEventTrigger {
            enabled: true,
            event_names: Vec::new(),
            event_name: Some(String::new()),
        });
        let result = validate(&[campaign]);
        assert_eq!(result.errors.len(), 3);
    }

    #[test]
    fn test_disabled_triggers_are_not_checked() {
        let mut campaign = Campaign::new("c1");
        campaign.triggers.scroll_depth = Some(ScrollDepthTrigger {
            enabled: false,
            percentage: -5.0,
            debounce_ms: 100,
        });
        assert!(validate(&[campaign]).is_valid());
    }

    #[test]
    fn test_session_rule_warnings() {
        let mut campaign = Campaign::new("c1");
        campaign.priority = -1;
        campaign.session_rules = Some(SessionRules {
            enabled: true,
            logic_operator: popwise_core::config::LogicOperator::And,
            conditions: vec![RuleCondition {
                field: RuleField::Other("utm_source".to_string()),
                operator: RuleOperator::Unknown,
                value: serde_json::Value::Null,
            }],
        });
        let result = validate(&[campaign]);
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 3);
    }

    #[test]
    fn test_enabled_rules_without_conditions_warn() {
        let mut campaign = Campaign::new("c1");
        campaign.session_rules = Some(SessionRules {
            enabled: true,
            ..SessionRules::default()
        });
        let result = validate(&[campaign]);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].path.ends_with("conditions"));
    }
}
