//! Pricing math
//!
//! Two layers, kept deliberately separate:
//!
//! - [`convert`] — the currency conversion engine. Pure f64 arithmetic so
//!   converted amounts match what the dashboard and public menu have always
//!   shown; no rounding happens here, each display site rounds its own call.
//! - [`totals`] — cart line and order totals. `rust_decimal` internally,
//!   2 decimal places half-up per line, then converted back to f64 for
//!   serialization.

pub mod convert;
pub mod totals;

pub use convert::{convert, find_active_rate, Money};
pub use totals::{
    discounted_unit_price, draft_total, extras_unit_price, line_total, order_total, to_decimal,
    to_f64,
};
