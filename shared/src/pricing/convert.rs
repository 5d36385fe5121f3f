//! Currency conversion engine
//!
//! Converts amounts from a tenant's base currency into a customer-selected
//! display currency. The same function backs the displayed unit price, the
//! discounted unit price, each selected extra's price and the order grand
//! total — each call converts one base amount independently.

use crate::models::CurrencyExchange;
use serde::{Deserialize, Serialize};

/// A monetary amount tagged with its currency code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
}

impl Money {
    pub fn new(amount: f64, currency: impl Into<String>) -> Self {
        Self {
            amount,
            currency: currency.into(),
        }
    }

    /// Render as `"12.34 USD"`, rounding to 2 decimal places here and only
    /// here. Each display site rounds its own call; amounts are never
    /// rounded before this point.
    pub fn display(&self) -> String {
        let rounded = super::totals::to_f64(super::totals::to_decimal(self.amount));
        format!("{:.2} {}", rounded, self.currency)
    }
}

/// Find the first usable rate for a target currency.
///
/// Eligible means: case-insensitive currency match, `is_active`, and a
/// positive finite rate (a zero or negative rate is treated exactly like an
/// inactive one — see DESIGN.md). Returning `Option` keeps the fallback a
/// visible branch at every call site.
pub fn find_active_rate<'a>(
    rates: &'a [CurrencyExchange],
    currency: &str,
) -> Option<&'a CurrencyExchange> {
    rates.iter().find(|r| {
        r.is_active
            && r.exchange_rate.is_finite()
            && r.exchange_rate > 0.0
            && r.currency.eq_ignore_ascii_case(currency)
    })
}

/// Convert a base-currency amount into the customer's display currency.
///
/// - `target` of `None`, or equal to `base` (case-insensitive), is the
///   identity case: the base amount comes back untouched.
/// - A target with no eligible rate silently falls back to the identity
///   case — the menu keeps working in base currency rather than erroring.
/// - Otherwise the rate's magnitude picks the direction: `rate >= 1`
///   divides, `rate < 1` multiplies.
///
/// No rounding is applied; display sites round per call.
pub fn convert(
    amount_in_base: f64,
    target: Option<&str>,
    base: &str,
    rates: &[CurrencyExchange],
) -> Money {
    let target = match target {
        Some(t) if !t.eq_ignore_ascii_case(base) => t,
        _ => return Money::new(amount_in_base, base),
    };

    match find_active_rate(rates, target).and_then(|r| r.direction()) {
        Some(direction) => Money::new(direction.apply(amount_in_base), target),
        None => Money::new(amount_in_base, base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn syp_rate() -> CurrencyExchange {
        CurrencyExchange::new("SYP", 12100.0, true)
    }

    #[test]
    fn test_identity_when_no_target() {
        let result = convert(42.5, None, "USD", &[syp_rate()]);
        assert_eq!(result, Money::new(42.5, "USD"));
    }

    #[test]
    fn test_identity_when_target_is_base() {
        let result = convert(42.5, Some("usd"), "USD", &[syp_rate()]);
        assert_eq!(result, Money::new(42.5, "USD"));
    }

    #[test]
    fn test_large_rate_divides() {
        let result = convert(100.0, Some("SYP"), "USD", &[syp_rate()]);
        assert_eq!(result.amount, 100.0 / 12100.0);
        assert_eq!(result.currency, "SYP");
    }

    #[test]
    fn test_small_rate_multiplies() {
        let rates = [CurrencyExchange::new("NEW", 0.01, true)];
        let result = convert(100.0, Some("NEW"), "USD", &rates);
        assert_eq!(result.amount, 1.0);
        assert_eq!(result.currency, "NEW");
    }

    #[test]
    fn test_missing_rate_falls_back_to_base() {
        let result = convert(100.0, Some("EUR"), "USD", &[]);
        assert_eq!(result, Money::new(100.0, "USD"));
    }

    #[test]
    fn test_inactive_rate_falls_back_to_base() {
        let rates = [CurrencyExchange::new("EUR", 0.9, false)];
        let result = convert(100.0, Some("EUR"), "USD", &rates);
        assert_eq!(result, Money::new(100.0, "USD"));
    }

    #[test]
    fn test_zero_rate_treated_as_inactive() {
        let rates = [CurrencyExchange::new("EUR", 0.0, true)];
        let result = convert(100.0, Some("EUR"), "USD", &rates);
        assert_eq!(result, Money::new(100.0, "USD"));
    }

    #[test]
    fn test_negative_rate_treated_as_inactive() {
        let rates = [CurrencyExchange::new("EUR", -0.9, true)];
        let result = convert(100.0, Some("EUR"), "USD", &rates);
        assert_eq!(result, Money::new(100.0, "USD"));
    }

    #[test]
    fn test_currency_match_is_case_insensitive() {
        let result = convert(100.0, Some("syp"), "USD", &[syp_rate()]);
        assert_eq!(result.amount, 100.0 / 12100.0);
        assert_eq!(result.currency, "syp");
    }

    #[test]
    fn test_first_matching_rate_wins() {
        let rates = [
            CurrencyExchange::new("EUR", 2.0, true),
            CurrencyExchange::new("EUR", 4.0, true),
        ];
        let result = convert(100.0, Some("EUR"), "USD", &rates);
        assert_eq!(result.amount, 50.0);
    }

    #[test]
    fn test_inactive_rate_skipped_in_favor_of_later_active_one() {
        let rates = [
            CurrencyExchange::new("EUR", 2.0, false),
            CurrencyExchange::new("EUR", 4.0, true),
        ];
        let result = convert(100.0, Some("EUR"), "USD", &rates);
        assert_eq!(result.amount, 25.0);
    }

    #[test]
    fn test_display_rounds_half_up_per_call() {
        assert_eq!(Money::new(100.0 / 12100.0, "SYP").display(), "0.01 SYP");
        assert_eq!(Money::new(2.006, "USD").display(), "2.01 USD");
        assert_eq!(Money::new(5.0, "EUR").display(), "5.00 EUR");
    }

    #[test]
    fn test_negative_amount_passes_through() {
        // No negative-amount guard: refund-style amounts convert like any other
        let result = convert(-50.0, Some("SYP"), "USD", &[syp_rate()]);
        assert_eq!(result.amount, -50.0 / 12100.0);
    }
}
