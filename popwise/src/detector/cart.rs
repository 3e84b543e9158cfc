//! Cart watchers: add-to-cart, cart drawer and cart value.
//!
//! Storefront themes announce cart activity under many different DOM event
//! names; each watcher listens for a fixed set of them. When the
//! third-party cart library is loaded its own events are honoured as well.

use async_trait::async_trait;
use serde_json::Value;
use tracing::trace;

use popwise_core::config::{CartValueTrigger, TriggerKind};

use super::{Watch, WatchContext};
use crate::error::DetectorError;
use crate::page::PageEvent;

/// DOM events announcing an item added to the cart.
pub const ADD_TO_CART_EVENTS: &[&str] = &[
    "cart:add",
    "cart:added",
    "cart:item-added",
    "product:added-to-cart",
    "ajaxProduct:added",
    "theme:cart:add",
];

/// DOM events announcing the cart drawer opened.
pub const CART_DRAWER_EVENTS: &[&str] = &[
    "cart:open",
    "cart:drawer:open",
    "cart-drawer:open",
    "drawer:open",
    "theme:cart:open",
];

/// DOM events announcing a cart change.
pub const CART_UPDATE_EVENTS: &[&str] = &[
    "cart:updated",
    "cart:change",
    "cart:refresh",
    "theme:cart:change",
    "cart:add",
    "cart:added",
    "cart:item-added",
];

const LIBRARY_ADD_EVENTS: &[&str] = &["item:added"];
const LIBRARY_DRAWER_EVENTS: &[&str] = &["drawer:opened"];
const LIBRARY_UPDATE_EVENTS: &[&str] = &[
    "cart:updated",
    "item:added",
    "item:removed",
    "item:quantity-updated",
];

/// Event names a cart watcher reacts to.
#[derive(Debug, Clone, Copy)]
struct EventSet {
    dom: &'static [&'static str],
    library: &'static [&'static str],
}

impl EventSet {
    /// Returns the event detail if `event` belongs to this set.
    fn matching<'a>(&self, event: &'a PageEvent, library_present: bool) -> Option<&'a Value> {
        match event {
            PageEvent::Dom { name, detail } if self.dom.iter().any(|n| *n == name.as_str()) => {
                Some(detail)
            }
            PageEvent::CartLibrary { name, detail }
                if library_present && self.library.iter().any(|n| *n == name.as_str()) =>
            {
                Some(detail)
            }
            _ => None,
        }
    }
}

// ============================================================================
// Cart Events
// ============================================================================

/// Fires on the first matching cart event.
#[derive(Debug, Clone)]
pub struct CartEventWatch {
    kind: TriggerKind,
    events: EventSet,
}

impl CartEventWatch {
    /// Watcher for items added to the cart.
    #[must_use]
    pub const fn add_to_cart() -> Self {
        Self {
            kind: TriggerKind::AddToCart,
            events: EventSet {
                dom: ADD_TO_CART_EVENTS,
                library: LIBRARY_ADD_EVENTS,
            },
        }
    }

    /// Watcher for the cart drawer opening.
    #[must_use]
    pub const fn drawer_open() -> Self {
        Self {
            kind: TriggerKind::CartDrawerOpen,
            events: EventSet {
                dom: CART_DRAWER_EVENTS,
                library: LIBRARY_DRAWER_EVENTS,
            },
        }
    }
}

#[async_trait]
impl Watch for CartEventWatch {
    fn kind(&self) -> TriggerKind {
        self.kind
    }

    async fn watch(&self, mut cx: WatchContext) -> Result<bool, DetectorError> {
        let library_present = cx.page.context().cart_library_present();
        loop {
            if let Some(event) = cx.next_event().await? {
                if self.events.matching(&event, library_present).is_some() {
                    return Ok(true);
                }
            }
        }
    }
}

// ============================================================================
// Cart Value
// ============================================================================

/// Fires when a cart change leaves the total within the configured range.
///
/// The total is read from the event detail when present, otherwise from
/// the live cart.
#[derive(Debug, Clone)]
pub struct CartValueWatch {
    trigger: CartValueTrigger,
    events: EventSet,
}

impl CartValueWatch {
    /// Creates a watcher from its settings.
    #[must_use]
    pub fn new(trigger: &CartValueTrigger) -> Self {
        Self {
            trigger: trigger.clone(),
            events: EventSet {
                dom: CART_UPDATE_EVENTS,
                library: LIBRARY_UPDATE_EVENTS,
            },
        }
    }
}

/// Extracts a cart total from an event detail payload.
fn detail_total(detail: &Value) -> Option<f64> {
    ["/total_price", "/cart/total_price", "/value"]
        .iter()
        .filter_map(|pointer| detail.pointer(pointer))
        .find_map(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

#[async_trait]
impl Watch for CartValueWatch {
    fn kind(&self) -> TriggerKind {
        TriggerKind::CartValue
    }

    async fn watch(&self, mut cx: WatchContext) -> Result<bool, DetectorError> {
        let library_present = cx.page.context().cart_library_present();
        loop {
            let Some(event) = cx.next_event().await? else {
                continue;
            };
            let Some(detail) = self.events.matching(&event, library_present) else {
                continue;
            };
            let total = detail_total(detail)
                .or_else(|| cx.page.context().cart().map(|c| c.total_value));
            trace!(?total, "cart changed");
            if total.is_some_and(|value| self.trigger.accepts(value)) {
                return Ok(true);
            }
        }
    }
}
