//! Cart line and order total calculation
//!
//! All arithmetic is done in `Decimal` and converted to `f64` only at the
//! serialization boundary. Every line is rounded on its own (2 decimal
//! places, half-up); there is no cumulative rounding pass.
//!
//! Order of operations per line, all in base currency:
//!
//! ```text
//! line_total = (discounted_unit_price + extras_unit_price) * quantity
//! ```
//!
//! Currency conversion (see [`super::convert`]) happens strictly after this,
//! one display call at a time.

use crate::models::{DraftItem, MenuItem};
use rust_decimal::prelude::*;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Per-unit price after the item's percentage discount.
///
/// The discount applies in base currency, before any conversion. A
/// non-positive discount leaves the base price untouched.
pub fn discounted_unit_price(base_price: f64, discount_percent: f64) -> Decimal {
    let base = to_decimal(base_price);
    if discount_percent > 0.0 {
        let discount = base * to_decimal(discount_percent) / Decimal::ONE_HUNDRED;
        (base - discount).max(Decimal::ZERO)
    } else {
        base
    }
}

/// Per-unit price of the selected extras.
///
/// Option prices come from the menu item definition, not the draft; a
/// selection that no longer resolves (option removed from the menu since
/// the draft was built) is skipped.
pub fn extras_unit_price(item: &MenuItem, draft: &DraftItem) -> Decimal {
    let mut total = Decimal::ZERO;
    for (group_key, option_ids) in &draft.extras {
        for option_id in option_ids {
            match item.extra_price(group_key, option_id) {
                Some(price) => total += to_decimal(price),
                None => {
                    tracing::debug!(
                        group = %group_key,
                        option = %option_id,
                        item = %item.id,
                        "Draft references unknown extra option, skipping"
                    );
                }
            }
        }
    }
    total
}

/// Line total for one draft item.
///
/// `(discounted unit price + extras unit price) * quantity`, rounded per
/// line.
pub fn line_total(item: &MenuItem, draft: &DraftItem) -> Decimal {
    let unit = discounted_unit_price(item.price, item.discount_percent);
    let extras = extras_unit_price(item, draft);
    let quantity = Decimal::from(draft.quantity);

    ((unit + extras) * quantity)
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Order grand total in base currency: sum of rounded line totals.
pub fn order_total<'a, I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (&'a MenuItem, &'a DraftItem)>,
{
    lines
        .into_iter()
        .map(|(item, draft)| line_total(item, draft))
        .sum()
}

/// Total of a submitted draft using the prices captured at cart time.
///
/// 服务端没有菜单快照时使用 (价格随草稿一起提交)。
/// Extras are already folded into the captured unit price.
pub fn draft_total(items: &[DraftItem]) -> Decimal {
    items
        .iter()
        .map(|draft| {
            (to_decimal(draft.price_value()) * Decimal::from(draft.quantity))
                .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtraGroup, ExtraOption};
    use std::collections::HashMap;

    fn item(price: f64, discount: f64) -> MenuItem {
        MenuItem {
            id: "m1".to_string(),
            name: "Falafel Plate".to_string(),
            name_ar: None,
            price,
            discount_percent: discount,
            extras: vec![ExtraGroup {
                key: "extras".to_string(),
                name: "Extras".to_string(),
                options: vec![ExtraOption {
                    id: "hummus".to_string(),
                    name: "Hummus".to_string(),
                    price: 2.0,
                }],
            }],
            is_active: true,
        }
    }

    fn draft(quantity: u32, extras: &[&str]) -> DraftItem {
        let mut map = HashMap::new();
        if !extras.is_empty() {
            map.insert(
                "extras".to_string(),
                extras.iter().map(|s| s.to_string()).collect(),
            );
        }
        DraftItem {
            menu_item_id: "m1".to_string(),
            name: "Falafel Plate".to_string(),
            name_ar: None,
            price: "10".to_string(),
            currency: "USD".to_string(),
            quantity,
            notes: None,
            extras: map,
        }
    }

    #[test]
    fn test_discount_then_extras_then_quantity() {
        // 10 with 20% off = 8, plus extra 2 = 10 per unit, times 3 = 30
        let total = line_total(&item(10.0, 20.0), &draft(3, &["hummus"]));
        assert_eq!(to_f64(total), 30.0);
    }

    #[test]
    fn test_no_discount_passthrough() {
        let total = line_total(&item(10.99, 0.0), &draft(3, &[]));
        assert_eq!(to_f64(total), 32.97);
    }

    #[test]
    fn test_discount_applies_to_base_only() {
        // The extra's 2.0 is not discounted: 10*0.5 + 2 = 7 per unit
        let total = line_total(&item(10.0, 50.0), &draft(1, &["hummus"]));
        assert_eq!(to_f64(total), 7.0);
    }

    #[test]
    fn test_unknown_extra_selection_skipped() {
        let total = line_total(&item(10.0, 0.0), &draft(2, &["hummus", "ghost"]));
        // Unknown "ghost" contributes nothing: (10 + 2) * 2
        assert_eq!(to_f64(total), 24.0);
    }

    #[test]
    fn test_excessive_discount_clamps_to_zero() {
        let total = line_total(&item(10.0, 150.0), &draft(1, &[]));
        assert_eq!(to_f64(total), 0.0);
    }

    #[test]
    fn test_line_rounding_is_per_line() {
        // 3 * 3.333 = 9.999 rounds to 10.00 on the line, and the order total
        // sums already-rounded lines
        let a_item = item(3.333, 0.0);
        let a_draft = draft(3, &[]);
        let b_item = item(0.005, 0.0);
        let b_draft = draft(1, &[]);

        let total = order_total(vec![(&a_item, &a_draft), (&b_item, &b_draft)]);
        // 10.00 + 0.01
        assert_eq!(to_f64(total), 10.01);
    }

    #[test]
    fn test_decimal_accumulation_precision() {
        // Sum 0.01 a thousand times without float drift
        let mut total = Decimal::ZERO;
        for _ in 0..1000 {
            total += to_decimal(0.01);
        }
        assert_eq!(to_f64(total), 10.0);
    }

    #[test]
    fn test_tricky_percentage() {
        let total = line_total(&item(100.0, 33.33), &draft(1, &[]));
        assert_eq!(to_f64(total), 66.67);
    }
}
