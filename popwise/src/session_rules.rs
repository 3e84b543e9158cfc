//! Session rule evaluation
//!
//! A synchronous gate over live page signals, applied after a campaign's
//! triggers pass. Disabled or empty rule sets always pass.
//!
//! Numeric operators coerce both sides to `f64`: numbers as-is, numeric
//! strings parsed, booleans as `1`/`0`, everything else `NaN`. Every
//! comparison against `NaN` is false. `eq`/`ne` compare strictly without
//! coercion, and `in`/`nin` test membership in an array (or equality with
//! a scalar).

use serde_json::Value;
use tracing::{debug, warn};

use popwise_core::config::{LogicOperator, RuleCondition, RuleField, RuleOperator, SessionRules};

use crate::page::PageContext;

/// Evaluates session rules against the live page.
///
/// `None` means the campaign has no rules and passes.
#[must_use]
pub fn evaluate(rules: Option<&SessionRules>, context: &dyn PageContext) -> bool {
    let Some(rules) = rules.filter(|r| r.enabled && !r.conditions.is_empty()) else {
        return true;
    };

    let mut results = rules.conditions.iter().map(|c| evaluate_condition(c, context));
    let passed = match rules.logic_operator {
        LogicOperator::And => results.all(|r| r),
        LogicOperator::Or => results.any(|r| r),
    };
    debug!(operator = %rules.logic_operator, passed, "session rules evaluated");
    passed
}

/// Evaluates one condition.
#[must_use]
pub fn evaluate_condition(condition: &RuleCondition, context: &dyn PageContext) -> bool {
    let actual = match &condition.field {
        RuleField::CartItemCount => context.cart().map(|c| Value::from(c.item_count)),
        RuleField::CartValue => context.cart().map(|c| Value::from(c.total_value)),
        RuleField::Other(name) => {
            warn!(field = %name, "unknown session rule field; treating as satisfied");
            return true;
        }
    };
    let Some(actual) = actual else {
        debug!(field = ?condition.field, "session signal unavailable");
        return false;
    };
    compare(&actual, condition.operator, &condition.value)
}

fn compare(actual: &Value, operator: RuleOperator, expected: &Value) -> bool {
    match operator {
        RuleOperator::Gt => to_number(actual) > to_number(expected),
        RuleOperator::Gte => to_number(actual) >= to_number(expected),
        RuleOperator::Lt => to_number(actual) < to_number(expected),
        RuleOperator::Lte => to_number(actual) <= to_number(expected),
        RuleOperator::Eq => strict_eq(actual, expected),
        RuleOperator::Ne => !strict_eq(actual, expected),
        RuleOperator::In => contains(expected, actual),
        RuleOperator::Nin => !contains(expected, actual),
        RuleOperator::Unknown => {
            warn!("unknown session rule operator; condition fails");
            false
        }
    }
}

/// Coerces a JSON value to a number, `NaN` when not numeric.
fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Equality without type coercion. Numbers compare by value so that `2`
/// and `2.0` are equal.
fn strict_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => left == right,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match haystack {
        Value::Array(items) => items.iter().any(|item| strict_eq(item, needle)),
        scalar => strict_eq(scalar, needle),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::page::{CartSnapshot, PageSnapshot, SimulatedPage};

    fn cart_page(total_value: f64, item_count: u64) -> SimulatedPage {
        SimulatedPage::new(PageSnapshot {
            cart: Some(CartSnapshot {
                total_value,
                item_count,
            }),
            ..PageSnapshot::default()
        })
    }

    fn rules(operator: LogicOperator, conditions: serde_json::Value) -> SessionRules {
        serde_json::from_value(json!({
            "enabled": true,
            "logicOperator": operator.to_string(),
            "conditions": conditions,
        }))
        .unwrap()
    }

    #[test]
    fn test_cart_value_gt_threshold() {
        let rules = rules(
            LogicOperator::And,
            json!([{"field": "cartValue", "operator": "gt", "value": 50}]),
        );
        assert!(!evaluate(Some(&rules), &cart_page(0.0, 0)));
        assert!(evaluate(Some(&rules), &cart_page(75.0, 2)));
    }

    #[test]
    fn test_unavailable_signal_is_false() {
        let rules = rules(
            LogicOperator::And,
            json!([{"field": "cart_value", "operator": "gt", "value": 50}]),
        );
        assert!(!evaluate(Some(&rules), &SimulatedPage::default()));
    }

    #[test]
    fn test_disabled_or_empty_rules_pass() {
        let page = SimulatedPage::default();
        assert!(evaluate(None, &page));

        let mut disabled = rules(
            LogicOperator::And,
            json!([{"field": "cartValue", "operator": "gt", "value": 50}]),
        );
        disabled.enabled = false;
        assert!(evaluate(Some(&disabled), &page));

        let empty = rules(LogicOperator::And, json!([]));
        assert!(evaluate(Some(&empty), &page));
    }

    #[test]
    fn test_unknown_field_is_vacuously_true() {
        let rules = rules(
            LogicOperator::And,
            json!([{"field": "referrer", "operator": "eq", "value": "google"}]),
        );
        assert!(evaluate(Some(&rules), &SimulatedPage::default()));
    }

    #[test]
    fn test_unknown_operator_fails() {
        let rules = rules(
            LogicOperator::And,
            json!([{"field": "cartValue", "operator": "between", "value": [1, 2]}]),
        );
        assert!(!evaluate(Some(&rules), &cart_page(1.5, 1)));
    }

    #[test]
    fn test_or_combination() {
        let rules = rules(
            LogicOperator::Or,
            json!([
                {"field": "cartValue", "operator": "gte", "value": 100},
                {"field": "cartItemCount", "operator": "gte", "value": "3"},
            ]),
        );
        assert!(evaluate(Some(&rules), &cart_page(20.0, 3)));
        assert!(!evaluate(Some(&rules), &cart_page(20.0, 1)));
    }

    #[test]
    fn test_numeric_coercion() {
        assert!(compare(&json!(75.0), RuleOperator::Gt, &json!("50")));
        assert!(compare(&json!(1), RuleOperator::Gte, &json!(true)));
        assert!(!compare(&json!(75.0), RuleOperator::Gt, &json!("fifty")));
        assert!(!compare(&json!(75.0), RuleOperator::Lt, &json!("fifty")));
        assert!(!compare(&json!(75.0), RuleOperator::Gt, &json!(null)));
    }

    #[test]
    fn test_eq_is_strict() {
        assert!(compare(&json!(2), RuleOperator::Eq, &json!(2.0)));
        assert!(!compare(&json!(2), RuleOperator::Eq, &json!("2")));
        assert!(compare(&json!(2), RuleOperator::Ne, &json!("2")));
    }

    #[test]
    fn test_membership() {
        assert!(compare(&json!(3), RuleOperator::In, &json!([1, 2, 3])));
        assert!(!compare(&json!(3), RuleOperator::In, &json!(["3"])));
        assert!(compare(&json!(3), RuleOperator::In, &json!(3)));
        assert!(compare(&json!(4), RuleOperator::Nin, &json!([1, 2, 3])));
    }
}
