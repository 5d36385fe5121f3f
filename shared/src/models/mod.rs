//! Data models shared between the live gateway and session clients

pub mod currency;
pub mod menu;
pub mod order;

pub use currency::{CurrencyExchange, RateDirection};
pub use menu::{DraftItem, ExtraGroup, ExtraOption, MenuItem, OrderDraft};
pub use order::{Order, OrderStatus, ServiceType};
