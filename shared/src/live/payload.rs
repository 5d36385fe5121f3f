use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{DraftItem, Order, OrderStatus, ServiceType};

// ==================== Payloads ====================

/// 握手载荷 (客户端 -> 服务端)
///
/// 包含客户端的协议版本信息，用于服务端进行版本校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandshakePayload {
    /// 协议版本
    pub version: u16,
    /// 客户端名称/标识
    pub client_name: Option<String>,
    /// 客户端版本
    pub client_version: Option<String>,
}

/// Join / leave 载荷 (客户端 -> 服务端)
///
/// `id` is the restaurant id, QR code id or admin id depending on the
/// event type carrying it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinPayload {
    pub id: String,
}

/// 订单事件载荷 (服务端 -> 客户端)
///
/// Carried by `new_order`, `order_updated` and `order_status_update`.
/// Every field of the order summary is optional; recipients decide per
/// event type whether a partial order is worth surfacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEventPayload {
    pub order: Order,
    /// Who triggered the change ("restaurant", "customer", "admin")
    #[serde(rename = "updatedBy", skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// 下单请求载荷 (客户端 -> 服务端)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct CreateOrderPayload {
    #[serde(rename = "restaurantId")]
    #[validate(length(min = 1, message = "restaurantId is required"))]
    pub restaurant_id: String,
    /// QR code of the table placing the order (dine-in only)
    #[serde(rename = "qrCodeId", skip_serializing_if = "Option::is_none")]
    pub qr_code_id: Option<String>,
    pub service: ServiceType,
    #[validate(
        length(min = 1, message = "order must contain at least one item"),
        nested
    )]
    pub items: Vec<DraftItem>,
    /// Currency the cart was priced in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(rename = "customerName", skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(rename = "customerPhone", skip_serializing_if = "Option::is_none")]
    pub customer_phone: Option<String>,
    #[serde(rename = "deliveryAddress", skip_serializing_if = "Option::is_none")]
    pub delivery_address: Option<String>,
}

/// 状态变更请求载荷 (客户端 -> 服务端)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateStatusPayload {
    #[serde(rename = "orderId")]
    pub order_id: String,
    #[serde(rename = "restaurantId")]
    pub restaurant_id: String,
    /// Table the order belongs to, when known by the caller
    #[serde(rename = "qrCodeId", skip_serializing_if = "Option::is_none")]
    pub qr_code_id: Option<String>,
    pub status: OrderStatus,
    /// Who triggered the change ("restaurant", "customer", "admin")
    #[serde(rename = "updatedBy", skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// 确认载荷 (服务端 -> 客户端)
///
/// Carried by `joined_restaurant`, `joined_table` and
/// `order_update_success`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckPayload {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 错误载荷 (服务端 -> 客户端)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

// ==================== Convenience Constructors ====================

impl HandshakePayload {
    pub fn current(client_name: impl Into<String>) -> Self {
        Self {
            version: super::PROTOCOL_VERSION,
            client_name: Some(client_name.into()),
            client_version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

impl AckPayload {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn ok_with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_event_payload_field_names() {
        let payload = OrderEventPayload {
            order: Order::default(),
            updated_by: Some("restaurant".to_string()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["updatedBy"], "restaurant");
    }

    #[test]
    fn test_create_order_payload_roundtrip() {
        let payload = CreateOrderPayload {
            restaurant_id: "r1".to_string(),
            qr_code_id: Some("qr-7".to_string()),
            service: ServiceType::DineIn,
            items: vec![],
            currency: Some("USD".to_string()),
            customer_name: None,
            customer_phone: None,
            delivery_address: None,
        };
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"restaurantId\":\"r1\""));
        assert!(!json.contains("customerName"));
        let back: CreateOrderPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }
}
