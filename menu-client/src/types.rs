//! Session identity types

use serde::{Deserialize, Serialize};

/// Role of the signed-in user, as reported by the auth layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Platform administrator
    Admin,
    /// Restaurant owner
    Owner,
    /// Anonymous customer session
    Customer,
}

/// Identity of the current session
///
/// Drives the one-shot automatic room join: admins land in their admin
/// room, owners in their restaurant's room. Customers join table rooms
/// explicitly when they scan a QR code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub role: Role,
    /// Restaurant owned by this user (owners only)
    #[serde(rename = "restaurantId", skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
}
