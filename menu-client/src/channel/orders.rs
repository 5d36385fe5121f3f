//! Order event channel
//!
//! The single long-lived object a session constructs once and shares by
//! reference: joins and leaves rooms, emits order operations, counts
//! notification-worthy inbound events and rings the notification sounds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tokio::sync::broadcast;

use crate::error::ClientResult;
use crate::sound::{
    NEW_ORDER_TONES, NotificationSounds, ORDER_UPDATED_TONES, SoundPreference, ToneSequence,
};
use crate::types::{Identity, Role};
use shared::live::{
    CreateOrderPayload, LiveEventType, LiveMessage, OrderEventPayload, RoomScope,
    UpdateStatusPayload,
};
use shared::models::OrderStatus;

use super::client::LiveClient;

/// Attribution value carried by updates originating from a dashboard
const RESTAURANT_ACTOR: &str = "restaurant";

/// Order event channel over a [`LiveClient`]
///
/// Cheap to clone; all clones share the same counters and join state.
#[derive(Clone)]
pub struct OrderChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    client: LiveClient,
    /// Process-local re-dispatch bus for independent UI subtrees
    redispatch: broadcast::Sender<LiveMessage>,
    new_orders: AtomicU32,
    updated_orders: AtomicU32,
    /// apply_identity 只生效一次
    auto_joined: AtomicBool,
    /// Set when this session joined a restaurant room
    viewer_is_restaurant: AtomicBool,
    sounds: Arc<dyn NotificationSounds>,
    preference: Arc<SoundPreference>,
}

impl OrderChannel {
    pub fn new(
        client: LiveClient,
        sounds: Arc<dyn NotificationSounds>,
        preference: Arc<SoundPreference>,
    ) -> Self {
        let (redispatch, _) = broadcast::channel(1024);
        let inner = Arc::new(ChannelInner {
            client,
            redispatch,
            new_orders: AtomicU32::new(0),
            updated_orders: AtomicU32::new(0),
            auto_joined: AtomicBool::new(false),
            viewer_is_restaurant: AtomicBool::new(false),
            sounds,
            preference,
        });

        // Inbound processing task
        let task_inner = inner.clone();
        let mut rx = inner.client.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(msg) => task_inner.process_inbound(msg),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(dropped_messages = n, "Order channel lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Self { inner }
    }

    // ========== Room operations ==========

    /// Join the restaurant room and wait for the `joined_restaurant` ack
    pub async fn join_restaurant(&self, restaurant_id: &str) -> ClientResult<()> {
        let msg = LiveMessage::join(&RoomScope::Restaurant(restaurant_id.to_string()));
        self.inner.client.request(&msg).await?;
        self.inner
            .viewer_is_restaurant
            .store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Join the table room and wait for the `joined_table` ack
    pub async fn join_table(&self, qr_code_id: &str) -> ClientResult<()> {
        let msg = LiveMessage::join(&RoomScope::Table(qr_code_id.to_string()));
        self.inner.client.request(&msg).await?;
        Ok(())
    }

    /// Join the admin room; the server does not ack admin joins
    pub async fn join_admin(&self, admin_id: &str) -> ClientResult<()> {
        let msg = LiveMessage::join(&RoomScope::Admin(admin_id.to_string()));
        self.inner.client.send(&msg).await
    }

    pub async fn leave_restaurant(&self, restaurant_id: &str) -> ClientResult<()> {
        self.inner
            .viewer_is_restaurant
            .store(false, Ordering::Relaxed);
        let msg = LiveMessage::leave(&RoomScope::Restaurant(restaurant_id.to_string()));
        self.inner.client.send(&msg).await
    }

    pub async fn leave_table(&self, qr_code_id: &str) -> ClientResult<()> {
        let msg = LiveMessage::leave(&RoomScope::Table(qr_code_id.to_string()));
        self.inner.client.send(&msg).await
    }

    pub async fn leave_admin(&self, admin_id: &str) -> ClientResult<()> {
        let msg = LiveMessage::leave(&RoomScope::Admin(admin_id.to_string()));
        self.inner.client.send(&msg).await
    }

    /// One-shot automatic room join driven by the session identity
    ///
    /// Admins land in their admin room, owners in their restaurant's
    /// room. Later calls are no-ops; identity changes require a new
    /// channel.
    pub async fn apply_identity(&self, identity: &Identity) -> ClientResult<()> {
        if self.inner.auto_joined.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        match identity.role {
            Role::Admin => self.join_admin(&identity.id).await,
            Role::Owner => {
                if let Some(restaurant_id) = &identity.restaurant_id {
                    self.join_restaurant(restaurant_id).await
                } else {
                    tracing::debug!("Owner identity without restaurant, no room to join");
                    Ok(())
                }
            }
            Role::Customer => Ok(()),
        }
    }

    // ========== Emitters (fire and forget) ==========

    pub async fn emit_create_order(&self, payload: &CreateOrderPayload) -> ClientResult<()> {
        let msg = LiveMessage::new(
            LiveEventType::CreateOrder,
            serde_json::to_vec(payload)?,
        );
        self.inner.client.send(&msg).await
    }

    pub async fn emit_order_update(
        &self,
        order_id: &str,
        status: OrderStatus,
        restaurant_id: &str,
        qr_code_id: Option<&str>,
    ) -> ClientResult<()> {
        let payload = UpdateStatusPayload {
            order_id: order_id.to_string(),
            restaurant_id: restaurant_id.to_string(),
            qr_code_id: qr_code_id.map(|s| s.to_string()),
            status,
            updated_by: Some(RESTAURANT_ACTOR.to_string()),
        };
        let msg = LiveMessage::new(
            LiveEventType::UpdateOrderStatus,
            serde_json::to_vec(&payload)?,
        );
        self.inner.client.send(&msg).await
    }

    // ========== Counters and subscription ==========

    pub fn new_orders_count(&self) -> u32 {
        self.inner.new_orders.load(Ordering::Relaxed)
    }

    pub fn updated_orders_count(&self) -> u32 {
        self.inner.updated_orders.load(Ordering::Relaxed)
    }

    /// Reset the new-orders badge (viewing the orders list)
    pub fn clear_new_orders(&self) {
        self.inner.new_orders.store(0, Ordering::Relaxed);
    }

    /// Reset the updated-orders badge
    pub fn clear_updated_orders(&self) {
        self.inner.updated_orders.store(0, Ordering::Relaxed);
    }

    /// Subscribe to the process-local re-dispatch bus
    pub fn subscribe(&self) -> broadcast::Receiver<LiveMessage> {
        self.inner.redispatch.subscribe()
    }

    /// The underlying client (connection state, raw requests)
    pub fn client(&self) -> &LiveClient {
        &self.inner.client
    }
}

impl ChannelInner {
    /// Apply the notification-worthiness rules to one inbound event
    fn process_inbound(&self, msg: LiveMessage) {
        match msg.event_type {
            LiveEventType::NewOrder => {
                if let Some(payload) = self.parse_order_event(&msg)
                    && payload.order.exists()
                {
                    self.new_orders.fetch_add(1, Ordering::Relaxed);
                    self.play(&NEW_ORDER_TONES);
                }
            }
            LiveEventType::OrderUpdated => {
                if let Some(payload) = self.parse_order_event(&msg)
                    && self.update_is_notification_worthy(&payload)
                {
                    self.updated_orders.fetch_add(1, Ordering::Relaxed);
                    self.play(&ORDER_UPDATED_TONES);
                }
            }
            // 跟踪事件只转发，永远不计数
            LiveEventType::OrderStatusUpdate => {}
            _ => {}
        }

        // Re-dispatch everything so independent UI subtrees can react
        if let Err(e) = self.redispatch.send(msg) {
            tracing::debug!("No re-dispatch subscribers: {}", e);
        }
    }

    fn update_is_notification_worthy(&self, payload: &OrderEventPayload) -> bool {
        if !payload.order.exists() {
            return false;
        }
        if payload.order.status.is_some_and(|s| s.is_terminal()) {
            return false;
        }
        // The restaurant does not get notified about its own changes
        if self.viewer_is_restaurant.load(Ordering::Relaxed)
            && payload.updated_by.as_deref() == Some(RESTAURANT_ACTOR)
        {
            return false;
        }
        true
    }

    fn parse_order_event(&self, msg: &LiveMessage) -> Option<OrderEventPayload> {
        match msg.parse_payload() {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(event_type = %msg.event_type, "Malformed order event: {}", e);
                None
            }
        }
    }

    /// Ring a notification sound; the mute flag is read now, not captured
    fn play(&self, sequence: &ToneSequence) {
        if self.preference.is_muted() {
            return;
        }
        if let Err(e) = self.sounds.play(sequence) {
            tracing::warn!("Notification sound failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::Order;
    use std::sync::Mutex;

    /// Recording sink: remembers every sequence it was asked to play
    #[derive(Default)]
    struct RecordingSounds {
        played: Mutex<Vec<ToneSequence>>,
    }

    impl NotificationSounds for RecordingSounds {
        fn play(&self, sequence: &ToneSequence) -> ClientResult<()> {
            self.played.lock().unwrap().push(*sequence);
            Ok(())
        }
    }

    struct Setup {
        channel: OrderChannel,
        server_tx: broadcast::Sender<LiveMessage>,
        sounds: Arc<RecordingSounds>,
        preference: Arc<SoundPreference>,
        client_rx: broadcast::Receiver<LiveMessage>,
    }

    fn setup(muted: bool) -> Setup {
        let (server_tx, _) = broadcast::channel(64);
        let (client_tx, client_rx) = broadcast::channel(64);

        let client = LiveClient::memory("s1", &server_tx, &client_tx);
        let sounds = Arc::new(RecordingSounds::default());
        let preference = Arc::new(SoundPreference::in_memory(muted));
        let channel = OrderChannel::new(client, sounds.clone(), preference.clone());

        Setup {
            channel,
            server_tx,
            sounds,
            preference,
            client_rx,
        }
    }

    fn order_event(event_type: LiveEventType, order: Order, updated_by: Option<&str>) -> LiveMessage {
        LiveMessage::order_event(
            event_type,
            &OrderEventPayload {
                order,
                updated_by: updated_by.map(|s| s.to_string()),
            },
        )
    }

    fn live_order(status: OrderStatus) -> Order {
        Order {
            id: Some("o1".to_string()),
            status: Some(status),
            ..Order::default()
        }
    }

    /// Push an event through the simulated server and wait for the channel
    /// to re-dispatch it.
    async fn deliver(setup: &Setup, msg: LiveMessage) {
        let mut rx = setup.channel.subscribe();
        setup.server_tx.send(msg).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv())
            .await
            .expect("event not re-dispatched")
            .unwrap();
    }

    #[tokio::test]
    async fn test_new_order_counts_and_rings() {
        let s = setup(false);
        deliver(
            &s,
            order_event(LiveEventType::NewOrder, live_order(OrderStatus::Pending), None),
        )
        .await;

        assert_eq!(s.channel.new_orders_count(), 1);
        assert_eq!(s.sounds.played.lock().unwrap().as_slice(), &[NEW_ORDER_TONES]);

        s.channel.clear_new_orders();
        assert_eq!(s.channel.new_orders_count(), 0);
    }

    #[tokio::test]
    async fn test_idless_new_order_is_silent() {
        let s = setup(false);
        deliver(
            &s,
            order_event(LiveEventType::NewOrder, Order::default(), None),
        )
        .await;

        assert_eq!(s.channel.new_orders_count(), 0);
        assert!(s.sounds.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_update_is_silent() {
        let s = setup(false);
        deliver(
            &s,
            order_event(
                LiveEventType::OrderUpdated,
                live_order(OrderStatus::Completed),
                Some("customer"),
            ),
        )
        .await;

        assert_eq!(s.channel.updated_orders_count(), 0);
    }

    #[tokio::test]
    async fn test_own_updates_not_notified_to_restaurant_viewer() {
        let s = setup(false);
        // simulate a joined restaurant dashboard
        s.channel
            .inner
            .viewer_is_restaurant
            .store(true, Ordering::Relaxed);

        deliver(
            &s,
            order_event(
                LiveEventType::OrderUpdated,
                live_order(OrderStatus::Preparing),
                Some("restaurant"),
            ),
        )
        .await;
        assert_eq!(s.channel.updated_orders_count(), 0);

        // Customer-driven updates still notify
        deliver(
            &s,
            order_event(
                LiveEventType::OrderUpdated,
                live_order(OrderStatus::Preparing),
                Some("customer"),
            ),
        )
        .await;
        assert_eq!(s.channel.updated_orders_count(), 1);
        assert_eq!(
            s.sounds.played.lock().unwrap().as_slice(),
            &[ORDER_UPDATED_TONES]
        );
    }

    #[tokio::test]
    async fn test_status_update_never_counts() {
        let s = setup(false);
        deliver(
            &s,
            order_event(
                LiveEventType::OrderStatusUpdate,
                live_order(OrderStatus::Ready),
                None,
            ),
        )
        .await;

        assert_eq!(s.channel.new_orders_count(), 0);
        assert_eq!(s.channel.updated_orders_count(), 0);
        assert!(s.sounds.played.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_identity_joins_at_most_once() {
        let mut s = setup(false);
        let identity = Identity {
            id: "a1".to_string(),
            role: Role::Admin,
            restaurant_id: None,
        };

        s.channel.apply_identity(&identity).await.unwrap();
        s.channel.apply_identity(&identity).await.unwrap();

        // Exactly one join reaches the upstream channel
        let sent = tokio::time::timeout(std::time::Duration::from_secs(1), s.client_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(sent.event_type, LiveEventType::JoinAdmin);
        assert!(matches!(
            s.client_rx.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_mute_is_read_at_play_time() {
        let s = setup(true);
        deliver(
            &s,
            order_event(LiveEventType::NewOrder, live_order(OrderStatus::Pending), None),
        )
        .await;

        // Counted, but silent
        assert_eq!(s.channel.new_orders_count(), 1);
        assert!(s.sounds.played.lock().unwrap().is_empty());

        // The update path honors the same mute flag
        deliver(
            &s,
            order_event(
                LiveEventType::OrderUpdated,
                live_order(OrderStatus::Preparing),
                Some("customer"),
            ),
        )
        .await;
        assert_eq!(s.channel.updated_orders_count(), 1);
        assert!(s.sounds.played.lock().unwrap().is_empty());

        // Unmute through the shared handle; the next event rings
        s.preference.toggle().unwrap();
        deliver(
            &s,
            order_event(LiveEventType::NewOrder, live_order(OrderStatus::Pending), None),
        )
        .await;
        assert_eq!(s.sounds.played.lock().unwrap().len(), 1);
    }
}
