//! Order event fan-out.

use std::collections::HashMap;
use std::sync::Arc;

use fixer_core::OrderEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Filter for event subscriptions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Only events for this order.
    pub order_id: Option<Uuid>,

    /// Only events of these kinds (see [`OrderEvent::kind`]).
    pub kinds: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a filter for a single order.
    pub fn order(order_id: Uuid) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    /// Create a filter for specific event kinds.
    pub fn kinds(kinds: Vec<String>) -> Self {
        Self {
            kinds: Some(kinds),
            ..Default::default()
        }
    }

    /// Check if an event matches this filter.
    pub fn matches(&self, event: &OrderEvent) -> bool {
        if let Some(order_id) = self.order_id {
            if event.order_id() != order_id {
                return false;
            }
        }

        if let Some(ref kinds) = self.kinds {
            if !kinds.iter().any(|k| k == event.kind()) {
                return false;
            }
        }

        true
    }
}

/// A live subscription to order events.
pub struct EventSubscription {
    /// Unique ID for this subscription.
    pub id: Uuid,

    /// Filter for this subscription.
    pub filter: EventFilter,

    /// Receiver for events.
    pub receiver: broadcast::Receiver<OrderEvent>,
}

/// Broadcast bus for order lifecycle events.
///
/// Delivery is best-effort: publishing never blocks on slow consumers,
/// and a receiver that falls more than the channel capacity behind
/// loses the oldest events.
pub struct OrderEventBus {
    /// Sender for broadcasting events.
    sender: broadcast::Sender<OrderEvent>,

    /// Active subscriptions.
    subscriptions: Arc<RwLock<HashMap<Uuid, EventFilter>>>,
}

impl OrderEventBus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Subscribe to order events with a filter.
    pub async fn subscribe(&self, filter: EventFilter) -> EventSubscription {
        let id = Uuid::new_v4();
        let receiver = self.sender.subscribe();

        let mut subs = self.subscriptions.write().await;
        subs.insert(id, filter.clone());

        EventSubscription { id, filter, receiver }
    }

    /// Unsubscribe from order events.
    pub async fn unsubscribe(&self, id: Uuid) {
        let mut subs = self.subscriptions.write().await;
        subs.remove(&id);
    }

    /// Publish an event.
    pub async fn publish(&self, event: OrderEvent) {
        // Broadcast to all subscribers (they filter locally)
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscriptions.
    pub async fn subscription_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

impl Default for OrderEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixer_core::Eurodollars;

    fn published_event(order_id: Uuid) -> OrderEvent {
        OrderEvent::Published {
            order_id,
            client_id: Uuid::new_v4(),
            payment: Eurodollars::new(100),
        }
    }

    #[test]
    fn test_filter_order() {
        let order_id = Uuid::new_v4();
        let filter = EventFilter::order(order_id);

        assert!(filter.matches(&published_event(order_id)));
        assert!(!filter.matches(&published_event(Uuid::new_v4())));
    }

    #[test]
    fn test_filter_kinds() {
        let filter = EventFilter::kinds(vec!["failed".to_string(), "cancelled".to_string()]);

        let cancelled = OrderEvent::Cancelled {
            order_id: Uuid::new_v4(),
            refunded: true,
        };
        assert!(filter.matches(&cancelled));
        assert!(!filter.matches(&published_event(Uuid::new_v4())));
    }

    #[tokio::test]
    async fn test_bus_delivery() {
        let bus = OrderEventBus::new();
        let order_id = Uuid::new_v4();

        let mut sub = bus.subscribe(EventFilter::order(order_id)).await;
        assert_eq!(bus.subscription_count().await, 1);

        bus.publish(published_event(order_id)).await;

        let received = sub.receiver.recv().await.unwrap();
        assert_eq!(received.order_id(), order_id);
        assert!(sub.filter.matches(&received));

        bus.unsubscribe(sub.id).await;
        assert_eq!(bus.subscription_count().await, 0);
    }
}
