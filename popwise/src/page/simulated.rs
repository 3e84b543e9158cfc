//! In-memory page context.
//!
//! Backs the `simulate` command and the test suites. State lives behind a
//! `RwLock` so a script runner can mutate it while detectors read it.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use super::{CartSnapshot, PageContext, ProductInfo, ScrollMetrics};
use crate::error::DetectorError;

/// Viewport geometry of a simulated page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Current vertical offset
    #[serde(default)]
    pub scroll_top: f64,
    /// Total document height
    pub scroll_height: f64,
    /// Viewport height
    pub client_height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            scroll_top: 0.0,
            scroll_height: 800.0,
            client_height: 800.0,
        }
    }
}

/// Mutable state of a simulated page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageSnapshot {
    /// Scroll geometry
    #[serde(default)]
    pub viewport: Viewport,
    /// Browser user agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Device reports touch input
    #[serde(default)]
    pub touch: bool,
    /// Live cart (absent = unreadable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cart: Option<CartSnapshot>,
    /// Current product (absent = not a product page)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductInfo>,
    /// Third-party cart library loaded
    #[serde(default)]
    pub cart_library: bool,
    /// Make scroll geometry reads fail
    #[serde(default)]
    pub scroll_unavailable: bool,
}

/// [`PageContext`] over an in-memory [`PageSnapshot`].
#[derive(Debug, Default)]
pub struct SimulatedPage {
    state: RwLock<PageSnapshot>,
}

impl SimulatedPage {
    /// Creates a simulated page with the given initial state.
    #[must_use]
    pub const fn new(snapshot: PageSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
        }
    }

    /// Applies a mutation to the page state.
    pub fn update(&self, mutate: impl FnOnce(&mut PageSnapshot)) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        mutate(&mut state);
    }

    /// Moves the vertical scroll offset.
    pub fn scroll_to(&self, scroll_top: f64) {
        self.update(|s| s.viewport.scroll_top = scroll_top);
    }

    /// Replaces the live cart.
    pub fn set_cart(&self, cart: Option<CartSnapshot>) {
        self.update(|s| s.cart = cart);
    }

    /// Returns a copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> PageSnapshot {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PageContext for SimulatedPage {
    fn scroll_metrics(&self) -> Result<ScrollMetrics, DetectorError> {
        let state = self.state.read().map_err(|e| DetectorError::Unavailable {
            capability: "scroll metrics",
            reason: e.to_string(),
        })?;
        if state.scroll_unavailable {
            return Err(DetectorError::Unavailable {
                capability: "scroll metrics",
                reason: "document element not available".to_string(),
            });
        }
        Ok(ScrollMetrics {
            scroll_top: state.viewport.scroll_top,
            scroll_height: state.viewport.scroll_height,
            client_height: state.viewport.client_height,
        })
    }

    fn user_agent(&self) -> Option<String> {
        self.snapshot().user_agent
    }

    fn is_touch_device(&self) -> bool {
        self.snapshot().touch
    }

    fn cart(&self) -> Option<CartSnapshot> {
        self.snapshot().cart
    }

    fn product(&self) -> Option<ProductInfo> {
        self.snapshot().product
    }

    fn cart_library_present(&self) -> bool {
        self.snapshot().cart_library
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_to_updates_metrics() {
        let page = SimulatedPage::new(PageSnapshot {
            viewport: Viewport {
                scroll_top: 0.0,
                scroll_height: 3000.0,
                client_height: 1000.0,
            },
            ..PageSnapshot::default()
        });
        page.scroll_to(1200.0);
        let metrics = page.scroll_metrics().unwrap();
        assert!((metrics.depth_percent() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_scroll_unavailable_is_error() {
        let page = SimulatedPage::new(PageSnapshot {
            scroll_unavailable: true,
            ..PageSnapshot::default()
        });
        assert!(page.scroll_metrics().is_err());
    }

    #[test]
    fn test_snapshot_deserializes_from_yaml() {
        let yaml = r"
viewport: { scroll_height: 2400, client_height: 800 }
cart: { total_value: 35.5, item_count: 2 }
product: { id: '991', handle: linen-shirt }
cart_library: true
";
        let snapshot: PageSnapshot = serde_yaml::from_str(yaml).unwrap();
        assert!(snapshot.viewport.scroll_top.abs() < f64::EPSILON);
        assert_eq!(snapshot.cart.unwrap().item_count, 2);
        assert_eq!(snapshot.product.unwrap().handle.as_deref(), Some("linen-shirt"));
        assert!(snapshot.cart_library);
    }
}
