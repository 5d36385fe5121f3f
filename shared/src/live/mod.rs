//! Live channel message types
//!
//! 这些类型在 live-server 和 clients 之间共享，用于
//! 进程内（内存）和网络（TCP）通信。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use uuid::Uuid;

pub mod payload;
pub use payload::*;

/// 协议版本号
pub const PROTOCOL_VERSION: u16 = 1;

/// Live channel event vocabulary
///
/// Client operations (`handshake` through `create_order`) travel client →
/// server only; server events (`new_order` onwards) travel server → client
/// only. The server drops client frames that claim a server event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LiveEventType {
    // ========== Client operations ==========
    /// 握手消息
    Handshake = 0,
    JoinRestaurant = 1,
    JoinTable = 2,
    JoinAdmin = 3,
    LeaveRestaurant = 4,
    LeaveTable = 5,
    LeaveAdmin = 6,
    UpdateOrderStatus = 7,
    CreateOrder = 8,

    // ========== Server events ==========
    NewOrder = 9,
    OrderUpdated = 10,
    OrderStatusUpdate = 11,
    JoinedRestaurant = 12,
    JoinedTable = 13,
    OrderUpdateSuccess = 14,
    Error = 15,
}

impl LiveEventType {
    /// Event types only the server is allowed to emit.
    pub fn is_server_event(&self) -> bool {
        matches!(
            self,
            LiveEventType::NewOrder
                | LiveEventType::OrderUpdated
                | LiveEventType::OrderStatusUpdate
                | LiveEventType::JoinedRestaurant
                | LiveEventType::JoinedTable
                | LiveEventType::OrderUpdateSuccess
                | LiveEventType::Error
        )
    }
}

impl TryFrom<u8> for LiveEventType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0 => Ok(LiveEventType::Handshake),
            1 => Ok(LiveEventType::JoinRestaurant),
            2 => Ok(LiveEventType::JoinTable),
            3 => Ok(LiveEventType::JoinAdmin),
            4 => Ok(LiveEventType::LeaveRestaurant),
            5 => Ok(LiveEventType::LeaveTable),
            6 => Ok(LiveEventType::LeaveAdmin),
            7 => Ok(LiveEventType::UpdateOrderStatus),
            8 => Ok(LiveEventType::CreateOrder),
            9 => Ok(LiveEventType::NewOrder),
            10 => Ok(LiveEventType::OrderUpdated),
            11 => Ok(LiveEventType::OrderStatusUpdate),
            12 => Ok(LiveEventType::JoinedRestaurant),
            13 => Ok(LiveEventType::JoinedTable),
            14 => Ok(LiveEventType::OrderUpdateSuccess),
            15 => Ok(LiveEventType::Error),
            _ => Err(()),
        }
    }
}

impl fmt::Display for LiveEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LiveEventType::Handshake => "handshake",
            LiveEventType::JoinRestaurant => "join_restaurant",
            LiveEventType::JoinTable => "join_table",
            LiveEventType::JoinAdmin => "join_admin",
            LiveEventType::LeaveRestaurant => "leave_restaurant",
            LiveEventType::LeaveTable => "leave_table",
            LiveEventType::LeaveAdmin => "leave_admin",
            LiveEventType::UpdateOrderStatus => "update_order_status",
            LiveEventType::CreateOrder => "create_order",
            LiveEventType::NewOrder => "new_order",
            LiveEventType::OrderUpdated => "order_updated",
            LiveEventType::OrderStatusUpdate => "order_status_update",
            LiveEventType::JoinedRestaurant => "joined_restaurant",
            LiveEventType::JoinedTable => "joined_table",
            LiveEventType::OrderUpdateSuccess => "order_update_success",
            LiveEventType::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Broadcast scope a session can join
///
/// Mutually exclusive per session role: a tenant dashboard joins its
/// restaurant room, a customer session joins the table room of the scanned
/// QR code, the platform admin joins the admin room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomScope {
    Restaurant(String),
    Table(String),
    Admin(String),
}

impl RoomScope {
    /// Parse a `kind:id` room name.
    pub fn parse(name: &str) -> Option<Self> {
        let (kind, id) = name.split_once(':')?;
        if id.is_empty() {
            return None;
        }
        match kind {
            "restaurant" => Some(RoomScope::Restaurant(id.to_string())),
            "table" => Some(RoomScope::Table(id.to_string())),
            "admin" => Some(RoomScope::Admin(id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for RoomScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomScope::Restaurant(id) => write!(f, "restaurant:{}", id),
            RoomScope::Table(id) => write!(f, "table:{}", id),
            RoomScope::Admin(id) => write!(f, "admin:{}", id),
        }
    }
}

/// Live channel message body
///
/// `room` and `source` are server-side routing metadata; they are never
/// framed on the wire (the payload carries the business identifiers).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveMessage {
    pub request_id: Uuid,
    pub event_type: LiveEventType,
    /// Room this message is addressed to (None = every connected session)
    #[serde(skip)]
    pub room: Option<String>,
    /// Originating session, injected by the server on receipt
    #[serde(skip)]
    pub source: Option<String>,
    /// Correlates an ack to the request that caused it
    pub correlation_id: Option<Uuid>,
    pub payload: Vec<u8>,
}

impl LiveMessage {
    pub fn new(event_type: LiveEventType, payload: Vec<u8>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            event_type,
            room: None,
            source: None,
            correlation_id: None,
            payload,
        }
    }

    /// Address this message to a room
    pub fn with_room(mut self, scope: &RoomScope) -> Self {
        self.room = Some(scope.to_string());
        self
    }

    /// Set correlation ID (for acks)
    pub fn with_correlation_id(mut self, id: Uuid) -> Self {
        self.correlation_id = Some(id);
        self
    }

    /// 创建握手消息
    pub fn handshake(payload: &HandshakePayload) -> Self {
        Self::new(
            LiveEventType::Handshake,
            serde_json::to_vec(payload).expect("Failed to serialize handshake payload"),
        )
    }

    /// Create a join message for a scope
    pub fn join(scope: &RoomScope) -> Self {
        let (event_type, id) = match scope {
            RoomScope::Restaurant(id) => (LiveEventType::JoinRestaurant, id),
            RoomScope::Table(id) => (LiveEventType::JoinTable, id),
            RoomScope::Admin(id) => (LiveEventType::JoinAdmin, id),
        };
        Self::new(
            event_type,
            serde_json::to_vec(&JoinPayload { id: id.clone() })
                .expect("Failed to serialize join payload"),
        )
    }

    /// Create a leave message for a scope
    pub fn leave(scope: &RoomScope) -> Self {
        let (event_type, id) = match scope {
            RoomScope::Restaurant(id) => (LiveEventType::LeaveRestaurant, id),
            RoomScope::Table(id) => (LiveEventType::LeaveTable, id),
            RoomScope::Admin(id) => (LiveEventType::LeaveAdmin, id),
        };
        Self::new(
            event_type,
            serde_json::to_vec(&JoinPayload { id: id.clone() })
                .expect("Failed to serialize leave payload"),
        )
    }

    /// Create an order event message (new_order / order_updated / order_status_update)
    pub fn order_event(event_type: LiveEventType, payload: &OrderEventPayload) -> Self {
        Self::new(
            event_type,
            serde_json::to_vec(payload).expect("Failed to serialize order event payload"),
        )
    }

    /// Create an error message
    pub fn error(message: impl Into<String>) -> Self {
        let payload = ErrorPayload {
            message: message.into(),
        };
        Self::new(
            LiveEventType::Error,
            serde_json::to_vec(&payload).expect("Failed to serialize error payload"),
        )
    }

    /// Parse the JSON payload into a typed value
    pub fn parse_payload<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_roundtrip() {
        for v in 0u8..=15 {
            let event_type = LiveEventType::try_from(v).unwrap();
            assert_eq!(event_type as u8, v);
        }
        assert!(LiveEventType::try_from(16).is_err());
    }

    #[test]
    fn test_server_events_flagged() {
        assert!(LiveEventType::NewOrder.is_server_event());
        assert!(LiveEventType::Error.is_server_event());
        assert!(!LiveEventType::CreateOrder.is_server_event());
        assert!(!LiveEventType::Handshake.is_server_event());
    }

    #[test]
    fn test_room_scope_display_and_parse() {
        let scope = RoomScope::Table("qr-77".to_string());
        assert_eq!(scope.to_string(), "table:qr-77");
        assert_eq!(RoomScope::parse("table:qr-77"), Some(scope));
        assert_eq!(
            RoomScope::parse("admin:1"),
            Some(RoomScope::Admin("1".to_string()))
        );
        assert_eq!(RoomScope::parse("kitchen:1"), None);
        assert_eq!(RoomScope::parse("restaurant:"), None);
        assert_eq!(RoomScope::parse("restaurant"), None);
    }

    #[test]
    fn test_join_message_picks_event_type() {
        let msg = LiveMessage::join(&RoomScope::Admin("a1".to_string()));
        assert_eq!(msg.event_type, LiveEventType::JoinAdmin);
        let payload: JoinPayload = msg.parse_payload().unwrap();
        assert_eq!(payload.id, "a1");
    }
}
