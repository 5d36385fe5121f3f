//! Order model and status lifecycle

use serde::{Deserialize, Serialize};

/// Order status lifecycle
///
/// ```text
/// PENDING → CONFIRMED → PREPARING → READY → DELIVERED
///     └──────────┴──────────┴────────┴───► COMPLETED / CANCELLED (terminal)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    /// Terminal statuses stop further update notifications.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "PENDING"),
            OrderStatus::Confirmed => write!(f, "CONFIRMED"),
            OrderStatus::Preparing => write!(f, "PREPARING"),
            OrderStatus::Ready => write!(f, "READY"),
            OrderStatus::Delivered => write!(f, "DELIVERED"),
            OrderStatus::Completed => write!(f, "COMPLETED"),
            OrderStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// 服务类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    /// 堂食（扫码点餐）
    #[default]
    DineIn,
    /// 外送
    Delivery,
}

/// Order summary as carried in live event payloads
///
/// A summary without an `id` represents an order whose server-side creation
/// failed; the event still travels, consumers must not notify for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order ID (absent = creation failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Owning restaurant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restaurant_id: Option<String>,
    /// QR code (table) the order came from, dine-in only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_code_id: Option<String>,
    /// Current status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    /// Dine-in or delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<ServiceType>,
    /// Grand total in the tenant's base currency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    /// Base currency code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// Creation timestamp (Unix milliseconds)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl Order {
    /// Whether the server-side creation succeeded.
    pub fn exists(&self) -> bool {
        self.id.as_ref().is_some_and(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Preparing.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&OrderStatus::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
    }

    #[test]
    fn test_order_without_id_does_not_exist() {
        assert!(!Order::default().exists());
        let order = Order {
            id: Some(String::new()),
            ..Default::default()
        };
        assert!(!order.exists());
        let order = Order {
            id: Some("ord-1".to_string()),
            ..Default::default()
        };
        assert!(order.exists());
    }
}
