//! Currency exchange model
//!
//! A tenant stores menu prices in one base currency and may offer customers
//! a set of alternative display currencies, each backed by a single
//! exchange-rate record maintained in the restaurant settings.

use serde::{Deserialize, Serialize};

/// Exchange rate between a tenant's base currency and one display currency
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CurrencyExchange {
    /// ISO-like currency code (e.g. "USD", "SYP")
    pub currency: String,
    /// Rate value; its direction is inferred from magnitude, see
    /// [`RateDirection`]
    pub exchange_rate: f64,
    /// Only active rates are eligible for customer selection
    pub is_active: bool,
}

impl CurrencyExchange {
    pub fn new(currency: impl Into<String>, exchange_rate: f64, is_active: bool) -> Self {
        Self {
            currency: currency.into(),
            exchange_rate,
            is_active,
        }
    }

    /// The directional convention this rate encodes, if the rate is usable.
    ///
    /// Zero and negative rates have no meaningful direction and yield `None`;
    /// callers treat such records the same as inactive ones.
    pub fn direction(&self) -> Option<RateDirection> {
        RateDirection::from_rate(self.exchange_rate)
    }
}

/// Directional convention of an exchange rate
///
/// The rate-data producer does not store which way a rate converts; the
/// convention is inferred from magnitude at use-time:
///
/// - `rate >= 1`: "N base units == 1 target unit" → divide base amounts
/// - `rate < 1`: "rate target units == 1 base unit" → multiply base amounts
///
/// The enum makes that inference an explicit, testable branch. If the
/// convention is ever recorded at data entry instead, only
/// [`RateDirection::from_rate`] needs to change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDirection {
    /// `rate` base-currency units buy one unit of the target currency
    BaseUnitsPerTarget(f64),
    /// One base-currency unit buys `rate` units of the target currency
    TargetUnitsPerBase(f64),
}

impl RateDirection {
    /// Infer the direction from the rate's magnitude.
    pub fn from_rate(rate: f64) -> Option<Self> {
        if !rate.is_finite() || rate <= 0.0 {
            return None;
        }
        if rate >= 1.0 {
            Some(RateDirection::BaseUnitsPerTarget(rate))
        } else {
            Some(RateDirection::TargetUnitsPerBase(rate))
        }
    }

    /// Apply this rate to an amount expressed in the base currency.
    pub fn apply(&self, amount_in_base: f64) -> f64 {
        match self {
            RateDirection::BaseUnitsPerTarget(rate) => amount_in_base / rate,
            RateDirection::TargetUnitsPerBase(rate) => amount_in_base * rate,
        }
    }
}
