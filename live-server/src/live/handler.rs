//! Live event handler
//!
//! `LiveHandler` 订阅客户端通道，处理加入/退出房间、下单和状态变更，
//! 并把产生的服务器事件按房间广播出去。

use shared::live::{
    AckPayload, CreateOrderPayload, JoinPayload, LiveEventType, LiveMessage, OrderEventPayload,
    RoomScope, UpdateStatusPayload,
};
use shared::models::{Order, OrderStatus};
use shared::pricing::{draft_total, to_f64};
use shared::util::now_millis;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use validator::Validate;

use super::bus::RoomBus;
use crate::utils::{AppError, AppResult};

/// Who a change is attributed to when the caller does not say
const DEFAULT_UPDATED_BY: &str = "restaurant";

/// Server-side live event handler
///
/// Long-running task consuming the client channel of the [`RoomBus`].
pub struct LiveHandler {
    bus: RoomBus,
    receiver: broadcast::Receiver<LiveMessage>,
    shutdown_token: CancellationToken,
}

impl LiveHandler {
    pub fn new(bus: RoomBus) -> Self {
        let receiver = bus.subscribe_to_clients();
        let shutdown_token = bus.shutdown_token().clone();
        Self {
            bus,
            receiver,
            shutdown_token,
        }
    }

    /// Start processing messages
    ///
    /// This is a long-running task that should be spawned in the background.
    pub async fn run(mut self) {
        tracing::info!("Live handler started");

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Live handler shutting down");
                    break;
                }

                msg_result = self.receiver.recv() => {
                    match msg_result {
                        Ok(msg) => {
                            if let Err(e) = self.handle_message(&msg).await {
                                tracing::error!(
                                    event_type = %msg.event_type,
                                    error = %e,
                                    "Failed to handle message"
                                );
                                self.send_error(&msg, e.to_string()).await;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("Live handler lagged, skipped {} messages", skipped);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("Client channel closed");
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Live handler stopped");
    }

    async fn handle_message(&self, msg: &LiveMessage) -> AppResult<()> {
        match msg.event_type {
            LiveEventType::JoinRestaurant => self.handle_join(msg, RoomKind::Restaurant).await,
            LiveEventType::JoinTable => self.handle_join(msg, RoomKind::Table).await,
            LiveEventType::JoinAdmin => self.handle_join(msg, RoomKind::Admin).await,
            LiveEventType::LeaveRestaurant => self.handle_leave(msg, RoomKind::Restaurant),
            LiveEventType::LeaveTable => self.handle_leave(msg, RoomKind::Table),
            LiveEventType::LeaveAdmin => self.handle_leave(msg, RoomKind::Admin),
            LiveEventType::CreateOrder => self.handle_create_order(msg).await,
            LiveEventType::UpdateOrderStatus => self.handle_update_status(msg).await,
            // 握手在 TCP 层处理；其余类型客户端不应该发
            other => {
                tracing::warn!(event_type = %other, "Unexpected event from session, dropping");
                Ok(())
            }
        }
    }

    // ========== 房间加入/退出 ==========

    async fn handle_join(&self, msg: &LiveMessage, kind: RoomKind) -> AppResult<()> {
        let session_id = Self::source_of(msg)?;
        let payload: JoinPayload = msg
            .parse_payload()
            .map_err(|e| AppError::invalid(format!("Invalid join payload: {}", e)))?;
        let scope = kind.scope(payload.id);

        self.bus.join(session_id, &scope);

        // 顾客和餐厅端收到确认; 管理员加入没有确认事件
        let ack_type = match kind {
            RoomKind::Restaurant => Some(LiveEventType::JoinedRestaurant),
            RoomKind::Table => Some(LiveEventType::JoinedTable),
            RoomKind::Admin => None,
        };
        if let Some(ack_type) = ack_type {
            let ack = LiveMessage::new(
                ack_type,
                serde_json::to_vec(&AckPayload::ok()).unwrap_or_default(),
            )
            .with_correlation_id(msg.request_id);
            self.bus.send_to_client(session_id, ack).await?;
        }
        Ok(())
    }

    fn handle_leave(&self, msg: &LiveMessage, kind: RoomKind) -> AppResult<()> {
        let session_id = Self::source_of(msg)?;
        let payload: JoinPayload = msg
            .parse_payload()
            .map_err(|e| AppError::invalid(format!("Invalid leave payload: {}", e)))?;
        self.bus.leave(session_id, &kind.scope(payload.id));
        tracing::debug!(
            session_id = %session_id,
            remaining = ?self.bus.rooms_of(session_id),
            "Session membership after leave"
        );
        Ok(())
    }

    // ========== 订单事件 ==========

    async fn handle_create_order(&self, msg: &LiveMessage) -> AppResult<()> {
        let session_id = Self::source_of(msg)?;
        let payload: CreateOrderPayload = msg
            .parse_payload()
            .map_err(|e| AppError::invalid(format!("Invalid create_order payload: {}", e)))?;

        let restaurant_scope = RoomScope::Restaurant(payload.restaurant_id.clone());

        if let Err(reason) = validate_create_order(&payload) {
            tracing::warn!(
                restaurant_id = %payload.restaurant_id,
                reason = %reason,
                "Order creation rejected"
            );

            // 事件照常到达所有房间，但没有 id；消费端据此不提醒
            let failed = Order {
                restaurant_id: some_nonempty(payload.restaurant_id),
                qr_code_id: payload.qr_code_id.clone(),
                ..Order::default()
            };
            let event = OrderEventPayload {
                order: failed,
                updated_by: None,
            };
            self.fan_out_new_order(&restaurant_scope, payload.qr_code_id.as_deref(), &event)?;

            let error =
                LiveMessage::error(reason).with_correlation_id(msg.request_id);
            self.bus.send_to_client(session_id, error).await?;
            return Ok(());
        }

        let total = to_f64(draft_total(&payload.items));
        let currency = payload
            .currency
            .clone()
            .or_else(|| payload.items.first().map(|i| i.currency.clone()));

        let order = Order {
            id: Some(Uuid::new_v4().to_string()),
            restaurant_id: Some(payload.restaurant_id.clone()),
            qr_code_id: payload.qr_code_id.clone(),
            status: Some(OrderStatus::Pending),
            service: Some(payload.service),
            total: Some(total),
            currency,
            created_at: Some(now_millis()),
        };

        tracing::info!(
            order_id = ?order.id,
            restaurant_id = %payload.restaurant_id,
            total = %total,
            "Order created"
        );

        let event = OrderEventPayload {
            order: order.clone(),
            updated_by: None,
        };
        self.fan_out_new_order(&restaurant_scope, payload.qr_code_id.as_deref(), &event)
    }

    /// 新订单事件的扇出，成功和失败路径走同一套房间。
    fn fan_out_new_order(
        &self,
        restaurant_scope: &RoomScope,
        qr_code_id: Option<&str>,
        event: &OrderEventPayload,
    ) -> AppResult<()> {
        let new_order = LiveMessage::order_event(LiveEventType::NewOrder, event);

        // 餐厅端看到新订单
        self.bus.publish_to_room(restaurant_scope, new_order.clone())?;

        // 平台管理员房间收到所有租户的订单
        for room in self.bus.room_names() {
            if let Some(RoomScope::Admin(id)) = RoomScope::parse(&room) {
                self.bus
                    .publish_to_room(&RoomScope::Admin(id), new_order.clone())?;
            }
        }

        // 下单的桌台收到自己的跟踪事件
        if let Some(qr) = qr_code_id {
            self.bus.publish_to_room(
                &RoomScope::Table(qr.to_string()),
                LiveMessage::order_event(LiveEventType::OrderStatusUpdate, event),
            )?;
        }

        Ok(())
    }

    async fn handle_update_status(&self, msg: &LiveMessage) -> AppResult<()> {
        let session_id = Self::source_of(msg)?;
        let payload: UpdateStatusPayload = msg
            .parse_payload()
            .map_err(|e| AppError::invalid(format!("Invalid update_order_status payload: {}", e)))?;

        if payload.order_id.is_empty() {
            return Err(AppError::validation("orderId is required"));
        }

        let order = Order {
            id: Some(payload.order_id.clone()),
            restaurant_id: Some(payload.restaurant_id.clone()),
            qr_code_id: payload.qr_code_id.clone(),
            status: Some(payload.status),
            ..Order::default()
        };
        let event = OrderEventPayload {
            order,
            updated_by: Some(
                payload
                    .updated_by
                    .clone()
                    .unwrap_or_else(|| DEFAULT_UPDATED_BY.to_string()),
            ),
        };

        tracing::info!(
            order_id = %payload.order_id,
            status = %payload.status,
            "Order status updated"
        );

        let updated = LiveMessage::order_event(LiveEventType::OrderUpdated, &event);
        self.bus.publish_to_room(
            &RoomScope::Restaurant(payload.restaurant_id.clone()),
            updated.clone(),
        )?;

        if let Some(qr) = &payload.qr_code_id {
            let table = RoomScope::Table(qr.clone());
            self.bus.publish_to_room(&table, updated.clone())?;
            self.bus.publish_to_room(
                &table,
                LiveMessage::order_event(LiveEventType::OrderStatusUpdate, &event),
            )?;
        }

        // 调用方收到带关联 id 的成功确认
        let ack = LiveMessage::new(
            LiveEventType::OrderUpdateSuccess,
            serde_json::to_vec(&AckPayload::ok()).unwrap_or_default(),
        )
        .with_correlation_id(msg.request_id);
        self.bus.send_to_client(session_id, ack).await?;

        Ok(())
    }

    // ========== 辅助 ==========

    fn source_of(msg: &LiveMessage) -> AppResult<&str> {
        msg.source
            .as_deref()
            .ok_or_else(|| AppError::internal("Message without source session"))
    }

    async fn send_error(&self, msg: &LiveMessage, reason: String) {
        if let Some(session_id) = msg.source.as_deref() {
            let error = LiveMessage::error(reason).with_correlation_id(msg.request_id);
            if let Err(e) = self.bus.send_to_client(session_id, error).await {
                tracing::debug!(session_id = %session_id, "Failed to send error: {}", e);
            }
        }
    }
}

/// Room kind selector used by the join/leave handlers
#[derive(Debug, Clone, Copy)]
enum RoomKind {
    Restaurant,
    Table,
    Admin,
}

impl RoomKind {
    fn scope(self, id: String) -> RoomScope {
        match self {
            RoomKind::Restaurant => RoomScope::Restaurant(id),
            RoomKind::Table => RoomScope::Table(id),
            RoomKind::Admin => RoomScope::Admin(id),
        }
    }
}

fn validate_create_order(payload: &CreateOrderPayload) -> Result<(), String> {
    // length(min = 1) misses whitespace-only ids
    if payload.restaurant_id.trim().is_empty() {
        return Err("restaurantId is required".to_string());
    }
    payload.validate().map_err(|e| e.to_string())
}

fn some_nonempty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{DraftItem, ServiceType};
    use std::collections::HashMap;

    fn draft(price: &str, quantity: u32) -> DraftItem {
        DraftItem {
            menu_item_id: "m1".to_string(),
            name: "Falafel".to_string(),
            name_ar: None,
            price: price.to_string(),
            currency: "USD".to_string(),
            quantity,
            notes: None,
            extras: HashMap::new(),
        }
    }

    fn create_payload(items: Vec<DraftItem>) -> CreateOrderPayload {
        CreateOrderPayload {
            restaurant_id: "r1".to_string(),
            qr_code_id: Some("qr-1".to_string()),
            service: ServiceType::DineIn,
            items,
            currency: Some("USD".to_string()),
            customer_name: None,
            customer_phone: None,
            delivery_address: None,
        }
    }

    #[test]
    fn test_validation_rules() {
        assert!(validate_create_order(&create_payload(vec![draft("5.00", 2)])).is_ok());
        assert!(validate_create_order(&create_payload(vec![])).is_err());
        assert!(validate_create_order(&create_payload(vec![draft("5.00", 0)])).is_err());

        let mut no_restaurant = create_payload(vec![draft("5.00", 1)]);
        no_restaurant.restaurant_id = "  ".to_string();
        assert!(validate_create_order(&no_restaurant).is_err());
    }

    async fn setup() -> (RoomBus, tokio::task::JoinHandle<()>) {
        let bus = RoomBus::with_capacity(64);
        let handler = LiveHandler::new(bus.clone());
        let handle = tokio::spawn(handler.run());
        (bus, handle)
    }

    fn with_source(mut msg: LiveMessage, session: &str) -> LiveMessage {
        msg.source = Some(session.to_string());
        msg
    }

    #[tokio::test]
    async fn test_create_order_reaches_restaurant_room() {
        let (bus, _handle) = setup().await;
        let mut rx = bus.subscribe();
        bus.join("dash", &RoomScope::Restaurant("r1".to_string()));

        let msg = LiveMessage::new(
            LiveEventType::CreateOrder,
            serde_json::to_vec(&create_payload(vec![draft("10.00", 3)])).unwrap(),
        );
        bus.send_to_server(with_source(msg, "customer")).unwrap();

        // First room-stamped broadcast is the restaurant new_order
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, LiveEventType::NewOrder);
        assert_eq!(event.room.as_deref(), Some("restaurant:r1"));
        let payload: OrderEventPayload = event.parse_payload().unwrap();
        assert!(payload.order.exists());
        assert_eq!(payload.order.total, Some(30.0));
        assert_eq!(payload.order.status, Some(OrderStatus::Pending));

        // Table room gets the tracking event
        let tracking = rx.recv().await.unwrap();
        assert_eq!(tracking.event_type, LiveEventType::OrderStatusUpdate);
        assert_eq!(tracking.room.as_deref(), Some("table:qr-1"));

        bus.shutdown();
    }

    #[tokio::test]
    async fn test_invalid_order_broadcasts_without_id() {
        let (bus, _handle) = setup().await;
        let mut rx = bus.subscribe();

        let msg = LiveMessage::new(
            LiveEventType::CreateOrder,
            serde_json::to_vec(&create_payload(vec![])).unwrap(),
        );
        bus.send_to_server(with_source(msg, "customer")).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, LiveEventType::NewOrder);
        let payload: OrderEventPayload = event.parse_payload().unwrap();
        assert!(!payload.order.exists());

        bus.shutdown();
    }

    #[tokio::test]
    async fn test_new_order_fans_out_to_admin_rooms() {
        let (bus, _handle) = setup().await;
        bus.join("admin-session", &RoomScope::Admin("a1".to_string()));
        let mut rx = bus.subscribe();

        let msg = LiveMessage::new(
            LiveEventType::CreateOrder,
            serde_json::to_vec(&create_payload(vec![draft("4.00", 1)])).unwrap(),
        );
        bus.send_to_server(with_source(msg, "customer")).unwrap();

        let mut rooms = Vec::new();
        for _ in 0..3 {
            rooms.push(rx.recv().await.unwrap().room.unwrap());
        }
        assert!(rooms.contains(&"restaurant:r1".to_string()));
        assert!(rooms.contains(&"admin:a1".to_string()));
        assert!(rooms.contains(&"table:qr-1".to_string()));

        bus.shutdown();
    }

    #[tokio::test]
    async fn test_status_update_attributes_restaurant_by_default() {
        let (bus, _handle) = setup().await;
        let mut rx = bus.subscribe();

        let payload = UpdateStatusPayload {
            order_id: "o1".to_string(),
            restaurant_id: "r1".to_string(),
            qr_code_id: Some("qr-1".to_string()),
            status: OrderStatus::Preparing,
            updated_by: None,
        };
        let msg = LiveMessage::new(
            LiveEventType::UpdateOrderStatus,
            serde_json::to_vec(&payload).unwrap(),
        );
        bus.send_to_server(with_source(msg, "dash")).unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, LiveEventType::OrderUpdated);
        let parsed: OrderEventPayload = event.parse_payload().unwrap();
        assert_eq!(parsed.updated_by.as_deref(), Some("restaurant"));
        assert_eq!(parsed.order.status, Some(OrderStatus::Preparing));

        bus.shutdown();
    }
}
