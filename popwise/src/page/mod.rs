//! Page signal bus
//!
//! A page visit is modelled as a broadcast stream of [`PageEvent`]s plus a
//! synchronous [`PageContext`] for reading live page state. Detectors
//! subscribe to the stream and query the context; nothing in the engine
//! touches the browser directly.
//!
//! - [`Page`]: cloneable handle bundling the event sender, the context and
//!   the page-load instant
//! - [`SimulatedPage`]: in-memory context used by the CLI and tests

pub mod simulated;

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::error::DetectorError;

pub use simulated::{PageSnapshot, SimulatedPage, Viewport};

/// Capacity of the page event channel. Slow detectors that fall further
/// behind than this skip the oldest events.
const EVENT_CAPACITY: usize = 256;

/// User agents treated as touch/mobile for exit intent.
static MOBILE_UA: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)android|iphone|ipad|ipod|mobile|blackberry|iemobile|opera mini").ok()
});

// ============================================================================
// Events
// ============================================================================

/// A signal observed on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    /// Pointer moved to viewport coordinates
    PointerMove {
        /// Horizontal position in CSS pixels
        x: f64,
        /// Vertical position in CSS pixels
        y: f64,
    },
    /// Pointer button pressed
    PointerDown,
    /// Key pressed
    KeyDown,
    /// Document scrolled; read the new offset from [`PageContext::scroll_metrics`]
    Scroll,
    /// Touch started
    Touch,
    /// Click
    Click,
    /// DOM custom event dispatched by the theme or other scripts
    Dom {
        /// Event name
        name: String,
        /// Event detail payload
        #[serde(default)]
        detail: serde_json::Value,
    },
    /// Event published by the third-party cart library
    CartLibrary {
        /// Event name
        name: String,
        /// Event detail payload
        #[serde(default)]
        detail: serde_json::Value,
    },
}

impl PageEvent {
    /// Returns `true` for events that count as user activity for the
    /// idle timer.
    #[must_use]
    pub const fn is_user_activity(&self) -> bool {
        matches!(
            self,
            Self::PointerMove { .. }
                | Self::PointerDown
                | Self::KeyDown
                | Self::Scroll
                | Self::Touch
                | Self::Click
        )
    }
}

// ============================================================================
// Context
// ============================================================================

/// Document scroll geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollMetrics {
    /// Current vertical offset
    pub scroll_top: f64,
    /// Total document height
    pub scroll_height: f64,
    /// Viewport height
    pub client_height: f64,
}

impl ScrollMetrics {
    /// Returns the scroll depth in percent, clamped to `[0, 100]`.
    ///
    /// A document that does not scroll has depth 0.
    #[must_use]
    pub fn depth_percent(&self) -> f64 {
        let scrollable = self.scroll_height - self.client_height;
        if scrollable <= 0.0 || !scrollable.is_finite() {
            return 0.0;
        }
        let depth = self.scroll_top / scrollable * 100.0;
        if depth.is_nan() {
            return 0.0;
        }
        depth.clamp(0.0, 100.0)
    }
}

/// Live cart state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    /// Cart total in store currency
    pub total_value: f64,
    /// Number of items
    pub item_count: u64,
}

/// Product page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    /// Product identifier
    pub id: String,
    /// Product handle (URL slug)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl ProductInfo {
    /// Returns `true` if the allow-list names this product by id or handle.
    #[must_use]
    pub fn matches_any(&self, allowed: &[String]) -> bool {
        allowed
            .iter()
            .any(|entry| *entry == self.id || self.handle.as_deref() == Some(entry.as_str()))
    }
}

/// Synchronous read access to live page state.
pub trait PageContext: Send + Sync {
    /// Returns the current scroll geometry.
    ///
    /// # Errors
    ///
    /// Returns `DetectorError::Unavailable` if the geometry cannot be read.
    fn scroll_metrics(&self) -> Result<ScrollMetrics, DetectorError>;

    /// Returns the browser user agent, if known.
    fn user_agent(&self) -> Option<String>;

    /// Returns `true` if the device reports touch input.
    fn is_touch_device(&self) -> bool;

    /// Returns the live cart, or `None` if the cart cannot be read.
    fn cart(&self) -> Option<CartSnapshot>;

    /// Returns the current product, or `None` off product pages.
    fn product(&self) -> Option<ProductInfo>;

    /// Returns `true` if the third-party cart library is loaded.
    fn cart_library_present(&self) -> bool;
}

// ============================================================================
// Page Handle
// ============================================================================

/// Cloneable handle to the current page visit.
#[derive(Clone)]
pub struct Page {
    events: broadcast::Sender<PageEvent>,
    context: Arc<dyn PageContext>,
    loaded_at: Instant,
}

impl Page {
    /// Creates a page handle; the page-load clock starts now.
    #[must_use]
    pub fn new(context: Arc<dyn PageContext>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            events,
            context,
            loaded_at: Instant::now(),
        }
    }

    /// Publishes an event to every active detector.
    ///
    /// Returns the number of subscribers that received it. Events with no
    /// subscribers are dropped.
    pub fn emit(&self, event: PageEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }

    /// Returns the number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Returns the page context.
    #[must_use]
    pub fn context(&self) -> &dyn PageContext {
        self.context.as_ref()
    }

    /// Returns the time elapsed since the page loaded.
    #[must_use]
    pub fn time_on_page(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    /// Returns `true` on touch devices or mobile user agents.
    #[must_use]
    pub fn is_mobile(&self) -> bool {
        if self.context.is_touch_device() {
            return true;
        }
        self.context.user_agent().is_some_and(|ua| {
            MOBILE_UA
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(&ua))
        })
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("subscribers", &self.events.receiver_count())
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}
