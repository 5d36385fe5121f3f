//! Menu client runtime
//!
//! Client-side half of the live order system: endpoint derivation, the
//! live TCP/in-memory channel, order notification handling, sounds, and
//! list pagination helpers. UI shells build on top of this crate.

pub mod channel;
pub mod endpoint;
pub mod error;
pub mod pagination;
pub mod sound;
pub mod types;

pub use channel::{ConnectionState, LiveClient, OrderChannel};
pub use endpoint::derive_endpoint;
pub use error::{ClientError, ClientResult};
pub use sound::{NotificationSounds, SoundPreference};
pub use types::{Identity, Role};
