//! Campaign configuration schema
//!
//! This module defines the campaign types consumed by the selection engine.
//! Field names follow the backend's snake_case wire format; camelCase
//! spellings used by older storefront scripts are accepted as aliases.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ============================================================================
// Campaign
// ============================================================================

/// A popup campaign competing for a display surface.
///
/// Campaigns are immutable for the duration of a page view; the engine
/// never mutates them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Campaign {
    /// Campaign identifier (required)
    pub id: String,

    /// Human-readable campaign name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Campaign kind, used for surface classification
    #[serde(default, alias = "type", alias = "campaignType")]
    pub campaign_type: CampaignType,

    /// Explicit display mode override
    #[serde(default, alias = "displayMode", skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<DisplayMode>,

    /// Priority; higher wins ties for a surface
    #[serde(default)]
    pub priority: i64,

    /// A/B experiment identifier, used as the tracking key when present
    #[serde(default, alias = "experimentId", skip_serializing_if = "Option::is_none")]
    pub experiment_id: Option<String>,

    /// Display triggers
    #[serde(default)]
    pub triggers: TriggerConfig,

    /// Secondary gating over live session signals
    #[serde(default, alias = "sessionRules", skip_serializing_if = "Option::is_none")]
    pub session_rules: Option<SessionRules>,

    /// Opaque content configuration, passed through to presentation
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub content: serde_json::Value,

    /// Opaque design configuration, passed through to presentation
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub design: serde_json::Value,
}

impl Campaign {
    /// Creates a campaign with default settings and no triggers.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            campaign_type: CampaignType::default(),
            display_mode: None,
            priority: 0,
            experiment_id: None,
            triggers: TriggerConfig::default(),
            session_rules: None,
            content: serde_json::Value::Null,
            design: serde_json::Value::Null,
        }
    }

    /// Returns the key used for dismissal and frequency bookkeeping.
    ///
    /// The experiment id takes precedence over the campaign id so that all
    /// variants of an experiment share one dismissal record.
    #[must_use]
    pub fn tracking_key(&self) -> &str {
        self.experiment_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .unwrap_or(&self.id)
    }
}

/// Campaign kind.
///
/// Unknown kinds are preserved verbatim and classified as modals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CampaignType {
    /// Generic popup (email capture, spin wheel, ...)
    #[default]
    Popup,
    /// Recent-purchase style notification
    SocialProof,
    /// Free-shipping progress bar
    FreeShipping,
    /// Countdown timer bar
    CountdownTimer,
    /// Announcement bar
    Announcement,
    /// Any other campaign kind
    Other(String),
}

impl From<String> for CampaignType {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "" | "popup" => Self::Popup,
            "social_proof" => Self::SocialProof,
            "free_shipping" => Self::FreeShipping,
            "countdown_timer" => Self::CountdownTimer,
            "announcement" => Self::Announcement,
            _ => Self::Other(raw),
        }
    }
}

impl From<CampaignType> for String {
    fn from(kind: CampaignType) -> Self {
        match kind {
            CampaignType::Popup => "popup".to_string(),
            CampaignType::SocialProof => "social_proof".to_string(),
            CampaignType::FreeShipping => "free_shipping".to_string(),
            CampaignType::CountdownTimer => "countdown_timer".to_string(),
            CampaignType::Announcement => "announcement".to_string(),
            CampaignType::Other(raw) => raw,
        }
    }
}

/// Explicit display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Centered modal
    Modal,
    /// Top or bottom bar
    Banner,
    /// Any other mode (slide-in, fullscreen, ...)
    #[serde(other)]
    Other,
}

/// On-screen slot a campaign occupies. At most one campaign is shown per
/// surface at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    /// Modal overlay
    Modal,
    /// Banner bar
    Banner,
    /// Corner notification
    Notification,
}

impl Surface {
    /// Returns the wire name of this surface.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Modal => "modal",
            Self::Banner => "banner",
            Self::Notification => "notification",
        }
    }
}

impl std::fmt::Display for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Logic Operator
// ============================================================================

/// Boolean combinator used for triggers and session rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogicOperator {
    /// Every result must be true
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    /// Any result may be true
    #[serde(rename = "OR", alias = "or")]
    Or,
}

impl std::fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => f.write_str("AND"),
            Self::Or => f.write_str("OR"),
        }
    }
}

// ============================================================================
// Trigger Configuration
// ============================================================================

/// Trigger kind names recognised by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fixed delay after page load
    PageLoad,
    /// Fixed delay after evaluation starts
    TimeDelay,
    /// Scroll depth percentage
    ScrollDepth,
    /// Pointer leaving through the top of the viewport
    ExitIntent,
    /// No user activity for a duration
    IdleTimer,
    /// Item added to cart
    AddToCart,
    /// Cart drawer opened
    CartDrawerOpen,
    /// Cart total within a range
    CartValue,
    /// Product page context
    ProductView,
    /// Named custom DOM event
    CustomEvent,
}

impl TriggerKind {
    /// All kinds, in evaluation order.
    pub const ALL: [Self; 10] = [
        Self::PageLoad,
        Self::TimeDelay,
        Self::ScrollDepth,
        Self::ExitIntent,
        Self::IdleTimer,
        Self::AddToCart,
        Self::CartDrawerOpen,
        Self::CartValue,
        Self::ProductView,
        Self::CustomEvent,
    ];

    /// Returns the configuration key for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PageLoad => "page_load",
            Self::TimeDelay => "time_delay",
            Self::ScrollDepth => "scroll_depth",
            Self::ExitIntent => "exit_intent",
            Self::IdleTimer => "idle_timer",
            Self::AddToCart => "add_to_cart",
            Self::CartDrawerOpen => "cart_drawer_open",
            Self::CartValue => "cart_value",
            Self::ProductView => "product_view",
            Self::CustomEvent => "custom_event",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-campaign trigger configuration as delivered on the wire.
///
/// Each known kind is an optional settings record. Keys that name no known
/// kind are collected in `unknown` so they can be reported and ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TriggerConfig {
    /// Delay after page load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_load: Option<PageLoadTrigger>,

    /// Delay after evaluation starts
    #[serde(default, alias = "timeDelay", skip_serializing_if = "Option::is_none")]
    pub time_delay: Option<TimeDelayTrigger>,

    /// Scroll depth
    #[serde(default, alias = "scrollDepth", skip_serializing_if = "Option::is_none")]
    pub scroll_depth: Option<ScrollDepthTrigger>,

    /// Exit intent
    #[serde(default, alias = "exitIntent", skip_serializing_if = "Option::is_none")]
    pub exit_intent: Option<ExitIntentTrigger>,

    /// Idle timer
    #[serde(default, alias = "idleTimer", skip_serializing_if = "Option::is_none")]
    pub idle_timer: Option<IdleTrigger>,

    /// Add to cart
    #[serde(default, alias = "addToCart", skip_serializing_if = "Option::is_none")]
    pub add_to_cart: Option<CartEventTrigger>,

    /// Cart drawer open
    #[serde(default, alias = "cartDrawerOpen", skip_serializing_if = "Option::is_none")]
    pub cart_drawer_open: Option<CartEventTrigger>,

    /// Cart value threshold
    #[serde(default, alias = "cartValue", skip_serializing_if = "Option::is_none")]
    pub cart_value: Option<CartValueTrigger>,

    /// Product page context
    #[serde(default, alias = "productView", skip_serializing_if = "Option::is_none")]
    pub product_view: Option<ProductViewTrigger>,

    /// Custom DOM events
    #[serde(default, alias = "customEvent", skip_serializing_if = "Option::is_none")]
    pub custom_event: Option<CustomEventTrigger>,

    /// Combination settings (preferred over `logic_operator`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_combination: Option<TriggerCombination>,

    /// Legacy combination operator
    #[serde(default, alias = "logicOperator", skip_serializing_if = "Option::is_none")]
    pub logic_operator: Option<LogicOperator>,

    /// Unrecognised trigger kinds
    #[serde(flatten)]
    pub unknown: IndexMap<String, serde_json::Value>,
}

/// `trigger_combination` block.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TriggerCombination {
    /// Operator applied across enabled triggers
    #[serde(default)]
    pub operator: LogicOperator,
}

impl TriggerConfig {
    /// Returns the operator applied across enabled triggers.
    ///
    /// `trigger_combination.operator` wins over the legacy
    /// `logic_operator`; both absent means `AND`.
    #[must_use]
    pub fn operator(&self) -> LogicOperator {
        self.trigger_combination
            .map(|c| c.operator)
            .or(self.logic_operator)
            .unwrap_or_default()
    }

    /// Returns the enabled triggers as typed specs, in evaluation order.
    #[must_use]
    pub fn enabled_triggers(&self) -> Vec<TriggerSpec> {
        let mut specs = Vec::new();
        if let Some(t) = self.page_load.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::PageLoad(t.clone()));
        }
        if let Some(t) = self.time_delay.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::TimeDelay(t.clone()));
        }
        if let Some(t) = self.scroll_depth.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::ScrollDepth(t.clone()));
        }
        if let Some(t) = self.exit_intent.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::ExitIntent(t.clone()));
        }
        if let Some(t) = self.idle_timer.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::IdleTimer(t.clone()));
        }
        if let Some(t) = self.add_to_cart.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::AddToCart(t.clone()));
        }
        if let Some(t) = self.cart_drawer_open.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::CartDrawerOpen(t.clone()));
        }
        if let Some(t) = self.cart_value.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::CartValue(t.clone()));
        }
        if let Some(t) = self.product_view.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::ProductView(t.clone()));
        }
        if let Some(t) = self.custom_event.as_ref().filter(|t| t.enabled) {
            specs.push(TriggerSpec::CustomEvent(t.clone()));
        }
        specs
    }

    /// Returns the names of configured keys that are not trigger kinds.
    pub fn unknown_kinds(&self) -> impl Iterator<Item = &str> {
        self.unknown.keys().map(String::as_str)
    }
}

/// A validated, enabled trigger. One variant per kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerSpec {
    /// Page-load delay
    PageLoad(PageLoadTrigger),
    /// Time delay
    TimeDelay(TimeDelayTrigger),
    /// Scroll depth
    ScrollDepth(ScrollDepthTrigger),
    /// Exit intent
    ExitIntent(ExitIntentTrigger),
    /// Idle timer
    IdleTimer(IdleTrigger),
    /// Add to cart
    AddToCart(CartEventTrigger),
    /// Cart drawer open
    CartDrawerOpen(CartEventTrigger),
    /// Cart value threshold
    CartValue(CartValueTrigger),
    /// Product view
    ProductView(ProductViewTrigger),
    /// Custom events
    CustomEvent(CustomEventTrigger),
}

impl TriggerSpec {
    /// Returns the kind of this trigger.
    #[must_use]
    pub const fn kind(&self) -> TriggerKind {
        match self {
            Self::PageLoad(_) => TriggerKind::PageLoad,
            Self::TimeDelay(_) => TriggerKind::TimeDelay,
            Self::ScrollDepth(_) => TriggerKind::ScrollDepth,
            Self::ExitIntent(_) => TriggerKind::ExitIntent,
            Self::IdleTimer(_) => TriggerKind::IdleTimer,
            Self::AddToCart(_) => TriggerKind::AddToCart,
            Self::CartDrawerOpen(_) => TriggerKind::CartDrawerOpen,
            Self::CartValue(_) => TriggerKind::CartValue,
            Self::ProductView(_) => TriggerKind::ProductView,
            Self::CustomEvent(_) => TriggerKind::CustomEvent,
        }
    }
}

/// Page-load delay settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLoadTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
    /// Delay in milliseconds (0 fires on the next tick)
    #[serde(default, alias = "delay", alias = "delayMs")]
    pub delay_ms: u64,
}

/// Time delay settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeDelayTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
    /// Delay in milliseconds; non-positive resolves immediately
    #[serde(default, alias = "delay", alias = "delayMs")]
    pub delay_ms: i64,
    /// Resolve immediately regardless of delay
    #[serde(default)]
    pub immediate: bool,
}

/// Scroll depth settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollDepthTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
    /// Depth threshold in percent
    #[serde(default = "default_scroll_percentage", alias = "depth", alias = "threshold")]
    pub percentage: f64,
    /// Trailing debounce applied to scroll events, in milliseconds
    #[serde(default = "default_scroll_debounce_ms", alias = "debounceMs")]
    pub debounce_ms: u64,
}

impl Default for ScrollDepthTrigger {
    fn default() -> Self {
        Self {
            enabled: false,
            percentage: default_scroll_percentage(),
            debounce_ms: default_scroll_debounce_ms(),
        }
    }
}

const fn default_scroll_percentage() -> f64 {
    50.0
}

const fn default_scroll_debounce_ms() -> u64 {
    100
}

/// Exit intent sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// 5px from the top edge
    Low,
    /// 20px from the top edge
    #[default]
    Medium,
    /// 50px from the top edge
    High,
}

impl Sensitivity {
    /// Returns the pointer Y threshold in CSS pixels.
    #[must_use]
    pub const fn threshold_px(self) -> f64 {
        match self {
            Self::Low => 5.0,
            Self::Medium => 20.0,
            Self::High => 50.0,
        }
    }
}

/// Exit intent settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitIntentTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
    /// Distance from the top edge that counts as leaving
    #[serde(default)]
    pub sensitivity: Sensitivity,
    /// Minimum time since activation, in milliseconds
    #[serde(default, alias = "delay", alias = "delayMs")]
    pub delay_ms: u64,
    /// Keep the trigger active on touch devices
    #[serde(default, alias = "allowMobile")]
    pub allow_mobile: bool,
}

/// Idle timer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
    /// Inactivity duration in milliseconds
    #[serde(default = "default_idle_ms", alias = "idleTime", alias = "idle_time")]
    pub idle_ms: u64,
}

impl Default for IdleTrigger {
    fn default() -> Self {
        Self {
            enabled: false,
            idle_ms: default_idle_ms(),
        }
    }
}

const fn default_idle_ms() -> u64 {
    30_000
}

/// Add-to-cart and cart-drawer settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartEventTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
}

/// Cart value threshold settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartValueTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
    /// Inclusive lower bound
    #[serde(default, alias = "minValue", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Inclusive upper bound
    #[serde(default, alias = "maxValue", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
}

impl CartValueTrigger {
    /// Returns `true` if `value` lies within the configured bounds.
    #[must_use]
    pub fn accepts(&self, value: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        self.min_value.is_none_or(|min| value >= min) && self.max_value.is_none_or(|max| value <= max)
    }
}

/// Product view settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductViewTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
    /// Allow-list of product ids or handles (empty = any product)
    #[serde(default, alias = "productIds", skip_serializing_if = "Vec::is_empty")]
    pub product_ids: Vec<String>,
    /// Minimum time on page, in milliseconds
    #[serde(default, alias = "minTimeOnPage", skip_serializing_if = "Option::is_none")]
    pub min_time_on_page_ms: Option<u64>,
    /// Require a scroll interaction
    #[serde(default, alias = "requireScroll")]
    pub require_scroll: bool,
}

impl ProductViewTrigger {
    /// Returns `true` if resolution waits on extra conditions.
    #[must_use]
    pub const fn has_deferred_conditions(&self) -> bool {
        self.min_time_on_page_ms.is_some() || self.require_scroll
    }
}

/// Custom event settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEventTrigger {
    /// Whether the trigger participates
    #[serde(default)]
    pub enabled: bool,
    /// Event names that fire the trigger
    #[serde(default, alias = "eventNames", alias = "events")]
    pub event_names: Vec<String>,
    /// Legacy single event name
    #[serde(default, alias = "eventName", skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
}

impl CustomEventTrigger {
    /// Returns every configured event name, including the legacy field.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.event_names
            .iter()
            .map(String::as_str)
            .chain(self.event_name.as_deref())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

// ============================================================================
// Session Rules
// ============================================================================

/// Secondary gating over live session signals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionRules {
    /// Whether rules are evaluated at all
    #[serde(default)]
    pub enabled: bool,
    /// Operator across conditions
    #[serde(default, rename = "logicOperator", alias = "logic_operator")]
    pub logic_operator: LogicOperator,
    /// Ordered conditions
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
}

/// A single `(field, operator, value)` condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleCondition {
    /// Live signal to read
    pub field: RuleField,
    /// Comparison operator
    pub operator: RuleOperator,
    /// Configured comparison value
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Live signal referenced by a rule condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleField {
    /// Number of items in the cart
    CartItemCount,
    /// Cart total
    CartValue,
    /// Unrecognised field (vacuously true)
    Other(String),
}

impl From<String> for RuleField {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "cart_item_count" | "cartItemCount" => Self::CartItemCount,
            "cart_value" | "cartValue" => Self::CartValue,
            _ => Self::Other(raw),
        }
    }
}

impl From<RuleField> for String {
    fn from(field: RuleField) -> Self {
        match field {
            RuleField::CartItemCount => "cart_item_count".to_string(),
            RuleField::CartValue => "cart_value".to_string(),
            RuleField::Other(raw) => raw,
        }
    }
}

/// Comparison operator for rule conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOperator {
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Strict equality
    Eq,
    /// Strict inequality
    Ne,
    /// Membership
    In,
    /// Non-membership
    Nin,
    /// Unrecognised operator (always false)
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_campaign_defaults() {
        let campaign: Campaign = serde_json::from_value(json!({"id": "c1"})).unwrap();
        assert_eq!(campaign.priority, 0);
        assert_eq!(campaign.campaign_type, CampaignType::Popup);
        assert!(campaign.triggers.enabled_triggers().is_empty());
        assert_eq!(campaign.triggers.operator(), LogicOperator::And);
    }

    #[test]
    fn test_tracking_key_prefers_experiment() {
        let mut campaign = Campaign::new("c1");
        assert_eq!(campaign.tracking_key(), "c1");
        campaign.experiment_id = Some("exp-9".to_string());
        assert_eq!(campaign.tracking_key(), "exp-9");
        campaign.experiment_id = Some(String::new());
        assert_eq!(campaign.tracking_key(), "c1");
    }

    #[test]
    fn test_camel_case_aliases() {
        let campaign: Campaign = serde_json::from_value(json!({
            "id": "c2",
            "type": "social-proof",
            "experimentId": "exp",
            "displayMode": "banner",
            "triggers": {"exitIntent": {"enabled": true, "sensitivity": "high"}}
        }))
        .unwrap();
        assert_eq!(campaign.campaign_type, CampaignType::SocialProof);
        assert_eq!(campaign.experiment_id.as_deref(), Some("exp"));
        assert_eq!(campaign.display_mode, Some(DisplayMode::Banner));
        let specs = campaign.triggers.enabled_triggers();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind(), TriggerKind::ExitIntent);
    }

    #[test]
    fn test_disabled_triggers_excluded() {
        let config: TriggerConfig = serde_json::from_value(json!({
            "scroll_depth": {"enabled": false, "percentage": 40},
            "time_delay": {"enabled": true, "delay_ms": 5000},
            "page_load": {}
        }))
        .unwrap();
        let kinds: Vec<_> = config.enabled_triggers().iter().map(TriggerSpec::kind).collect();
        assert_eq!(kinds, vec![TriggerKind::TimeDelay]);
    }

    #[test]
    fn test_operator_precedence() {
        let config: TriggerConfig = serde_json::from_value(json!({
            "trigger_combination": {"operator": "OR"},
            "logic_operator": "AND"
        }))
        .unwrap();
        assert_eq!(config.operator(), LogicOperator::Or);

        let legacy: TriggerConfig =
            serde_json::from_value(json!({"logic_operator": "or"})).unwrap();
        assert_eq!(legacy.operator(), LogicOperator::Or);
    }

    #[test]
    fn test_unknown_trigger_kinds_collected() {
        let config: TriggerConfig = serde_json::from_value(json!({
            "hover_intent": {"enabled": true},
            "time_delay": {"enabled": true}
        }))
        .unwrap();
        assert_eq!(config.unknown_kinds().collect::<Vec<_>>(), vec!["hover_intent"]);
        assert_eq!(config.enabled_triggers().len(), 1);
    }

    #[test]
    fn test_scroll_defaults() {
        let config: TriggerConfig =
            serde_json::from_value(json!({"scroll_depth": {"enabled": true}})).unwrap();
        match &config.enabled_triggers()[0] {
            TriggerSpec::ScrollDepth(t) => {
                assert!((t.percentage - 50.0).abs() < f64::EPSILON);
                assert_eq!(t.debounce_ms, 100);
            }
            other => panic!("unexpected spec: {other:?}"),
        }
    }

    #[test]
    fn test_sensitivity_thresholds() {
        assert!((Sensitivity::Low.threshold_px() - 5.0).abs() < f64::EPSILON);
        assert!((Sensitivity::Medium.threshold_px() - 20.0).abs() < f64::EPSILON);
        assert!((Sensitivity::High.threshold_px() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_cart_value_bounds() {
        let trigger = CartValueTrigger {
            enabled: true,
            min_value: Some(50.0),
            max_value: Some(200.0),
        };
        assert!(!trigger.accepts(49.99));
        assert!(trigger.accepts(50.0));
        assert!(trigger.accepts(200.0));
        assert!(!trigger.accepts(200.01));
        assert!(!trigger.accepts(f64::NAN));
        assert!(CartValueTrigger::default().accepts(0.0));
    }

    #[test]
    fn test_custom_event_names_include_legacy() {
        let trigger: CustomEventTrigger = serde_json::from_value(json!({
            "enabled": true,
            "event_names": ["quiz:done"],
            "eventName": "newsletter:open"
        }))
        .unwrap();
        assert_eq!(trigger.names(), vec!["quiz:done", "newsletter:open"]);
    }

    #[test]
    fn test_session_rules_parse() {
        let rules: SessionRules = serde_json::from_value(json!({
            "enabled": true,
            "logicOperator": "OR",
            "conditions": [
                {"field": "cartValue", "operator": "gt", "value": 50},
                {"field": "visits", "operator": "between", "value": [1, 2]}
            ]
        }))
        .unwrap();
        assert_eq!(rules.logic_operator, LogicOperator::Or);
        assert_eq!(rules.conditions[0].field, RuleField::CartValue);
        assert_eq!(rules.conditions[0].operator, RuleOperator::Gt);
        assert_eq!(rules.conditions[1].field, RuleField::Other("visits".to_string()));
        assert_eq!(rules.conditions[1].operator, RuleOperator::Unknown);
    }

    #[test]
    fn test_campaign_type_roundtrip_preserves_unknown() {
        let kind = CampaignType::from("spin_wheel".to_string());
        assert_eq!(kind, CampaignType::Other("spin_wheel".to_string()));
        assert_eq!(String::from(kind), "spin_wheel");
    }
}
