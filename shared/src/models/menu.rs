//! Menu item and order draft models

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

/// Menu item entity (as served by the menu API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    /// Arabic name for bilingual menus
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_ar: Option<String>,
    /// Price in the tenant's base currency
    pub price: f64,
    /// Percentage discount currently applied to this item (0 = none)
    #[serde(default)]
    pub discount_percent: f64,
    /// Extra option groups (e.g. "toppings", "sides")
    #[serde(default)]
    pub extras: Vec<ExtraGroup>,
    pub is_active: bool,
}

/// Group of selectable extras on a menu item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraGroup {
    /// Group key referenced by draft items (e.g. "toppings")
    pub key: String,
    pub name: String,
    pub options: Vec<ExtraOption>,
}

/// One selectable extra option with its own price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraOption {
    pub id: String,
    pub name: String,
    /// Price in the tenant's base currency
    pub price: f64,
}

impl MenuItem {
    /// Look up the price of a selected extra option.
    ///
    /// Unknown group keys or option ids yield `None`; the caller decides
    /// whether to skip the selection or reject the draft.
    pub fn extra_price(&self, group_key: &str, option_id: &str) -> Option<f64> {
        self.extras
            .iter()
            .find(|g| g.key == group_key)?
            .options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.price)
    }
}

/// One line of a customer's order draft
///
/// Created when the customer adds an item via the item modal, mutated by
/// quantity changes, destroyed on submission or cart reset. The price is
/// carried as the string decimal the menu API sent, unparsed, so the draft
/// round-trips exactly what the customer saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DraftItem {
    pub menu_item_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_ar: Option<String>,
    /// Unit price in base currency, as a string decimal
    pub price: String,
    /// Base currency code
    pub currency: String,
    /// Always >= 1; a decrement at 1 removes the line instead
    #[validate(range(min = 1, message = "item quantity must be at least 1"))]
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Selected extras: group key → selected option ids
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extras: HashMap<String, Vec<String>>,
}

impl DraftItem {
    /// Parse the carried string price; malformed values read as zero.
    pub fn price_value(&self) -> f64 {
        self.price.trim().parse().unwrap_or(0.0)
    }

    /// Two lines merge when they are the same item configured the same way.
    fn same_configuration(&self, other: &DraftItem) -> bool {
        self.menu_item_id == other.menu_item_id
            && self.extras == other.extras
            && self.notes == other.notes
    }
}

/// The customer's in-progress cart.
///
/// | op          | behavior                                             |
/// |-------------|------------------------------------------------------|
/// | `add`       | merge into a matching line or append a new one       |
/// | `increment` | quantity + 1                                         |
/// | `decrement` | quantity - 1; a line at quantity 1 is removed        |
/// | `remove`    | drop the line                                        |
/// | `reset`     | empty the cart (submission or explicit clear)        |
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub items: Vec<DraftItem>,
}

impl OrderDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line, merging with an existing line for the same item and
    /// configuration (extras and notes) by summing quantities.
    pub fn add(&mut self, item: DraftItem) {
        match self.items.iter_mut().find(|l| l.same_configuration(&item)) {
            Some(line) => line.quantity += item.quantity,
            None => self.items.push(item),
        }
    }

    /// Increase a line's quantity by one. Out-of-range lines are ignored.
    pub fn increment(&mut self, line: usize) {
        if let Some(item) = self.items.get_mut(line) {
            item.quantity += 1;
        }
    }

    /// Decrease a line's quantity by one, removing the line at quantity 1.
    pub fn decrement(&mut self, line: usize) {
        let Some(item) = self.items.get_mut(line) else {
            return;
        };
        if item.quantity > 1 {
            item.quantity -= 1;
        } else {
            self.items.remove(line);
        }
    }

    /// Remove a line outright, whatever its quantity.
    pub fn remove(&mut self, line: usize) {
        if line < self.items.len() {
            self.items.remove(line);
        }
    }

    /// Empty the cart (after submission, or an explicit clear).
    pub fn reset(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of units across all lines (the cart badge count).
    pub fn unit_count(&self) -> u32 {
        self.items.iter().map(|l| l.quantity).sum()
    }
}
