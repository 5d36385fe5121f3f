//! Shared types for the QR ordering platform
//!
//! Common types used across the live gateway and the session client:
//! data models, the live event vocabulary, pricing math, response
//! structures, and small utilities.

pub mod color;
pub mod live;
pub mod models;
pub mod pricing;
pub mod response;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

// Live channel re-exports (for convenient access)
pub use live::{LiveEventType, LiveMessage, RoomScope, PROTOCOL_VERSION};

// Pricing re-exports
pub use pricing::{convert, Money};
