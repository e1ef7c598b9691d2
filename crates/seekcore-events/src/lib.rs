use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Identifies one subscription on an [`EventBus`]. Cheap to clone, so the
/// owner of a subscription can hand it to whoever needs to cancel it.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: u64,
    channel: String,
    closed: Arc<AtomicBool>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl PartialEq for SubscriptionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SubscriptionHandle {}

/// Ordered receiver for one channel.
#[derive(Debug)]
pub struct Subscription<T> {
    handle: SubscriptionHandle,
    receiver: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub fn handle(&self) -> &SubscriptionHandle {
        &self.handle
    }

    /// Next item in publish order. Returns `None` once the subscription has
    /// been cancelled, even if items were still buffered.
    pub async fn recv(&mut self) -> Option<T> {
        if self.handle.is_closed() {
            return None;
        }
        let item = self.receiver.recv().await?;
        if self.handle.is_closed() {
            return None;
        }
        Some(item)
    }

    pub fn try_recv(&mut self) -> Option<T> {
        if self.handle.is_closed() {
            return None;
        }
        self.receiver.try_recv().ok()
    }
}

struct Subscriber<T> {
    handle: SubscriptionHandle,
    sender: mpsc::UnboundedSender<T>,
}

struct Registry<T> {
    next_id: AtomicU64,
    channels: Mutex<HashMap<String, Vec<Subscriber<T>>>>,
}

/// Named-channel pub/sub. Each subscription sees every item published on
/// its channel after it subscribed, exactly once and in publish order.
pub struct EventBus<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EventBus<T> {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Registry {
                next_id: AtomicU64::new(1),
                channels: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn subscribe(&self, channel: &str) -> Subscription<T> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = SubscriptionHandle {
            id: self.registry.next_id.fetch_add(1, Ordering::Relaxed),
            channel: channel.to_string(),
            closed: Arc::new(AtomicBool::new(false)),
        };

        self.registry
            .channels
            .lock()
            .entry(channel.to_string())
            .or_default()
            .push(Subscriber {
                handle: handle.clone(),
                sender,
            });
        tracing::debug!(channel, subscription = handle.id, "subscribed");

        Subscription { handle, receiver }
    }

    /// Removes the subscription. Nothing is yielded by it afterwards.
    /// Unsubscribing twice is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        handle.closed.store(true, Ordering::Release);

        let mut channels = self.registry.channels.lock();
        if let Some(subscribers) = channels.get_mut(&handle.channel) {
            let before = subscribers.len();
            subscribers.retain(|sub| sub.handle.id != handle.id);
            if subscribers.len() != before {
                tracing::debug!(
                    channel = %handle.channel,
                    subscription = handle.id,
                    "unsubscribed"
                );
            }
            if subscribers.is_empty() {
                channels.remove(&handle.channel);
            }
        }
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.registry
            .channels
            .lock()
            .get(channel)
            .map_or(0, Vec::len)
    }
}

impl<T: Clone> EventBus<T> {
    /// Delivers `item` to every live subscription on `channel` and returns
    /// how many received it. Subscriptions whose receiver is gone are pruned.
    pub fn publish(&self, channel: &str, item: T) -> usize {
        let mut channels = self.registry.channels.lock();
        let Some(subscribers) = channels.get_mut(channel) else {
            return 0;
        };

        subscribers.retain(|sub| !sub.handle.is_closed() && !sub.sender.is_closed());
        let mut delivered = 0;
        for sub in subscribers.iter() {
            if sub.sender.send(item.clone()).is_ok() {
                delivered += 1;
            }
        }
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{timeout, Duration};

    use super::*;

    #[tokio::test]
    async fn items_arrive_in_publish_order() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("results");

        for n in 0..5 {
            assert_eq!(bus.publish("results", n), 1);
        }

        for n in 0..5 {
            assert_eq!(sub.recv().await, Some(n));
        }
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = EventBus::new();
        let mut a = bus.subscribe("a");
        let mut b = bus.subscribe("b");

        bus.publish("a", "for-a");
        assert_eq!(a.recv().await, Some("for-a"));
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn every_subscriber_gets_each_item_once() {
        let bus = EventBus::new();
        let mut first = bus.subscribe("results");
        let mut second = bus.subscribe("results");

        assert_eq!(bus.publish("results", 1), 2);
        assert_eq!(first.recv().await, Some(1));
        assert_eq!(second.recv().await, Some(1));
        assert!(first.try_recv().is_none());
    }

    #[tokio::test]
    async fn unsubscribe_drops_buffered_items() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("results");
        bus.publish("results", 1);
        bus.publish("results", 2);

        let handle = sub.handle().clone();
        bus.unsubscribe(&handle);
        bus.unsubscribe(&handle);

        assert_eq!(sub.recv().await, None);
        assert_eq!(bus.publish("results", 3), 0);
        assert_eq!(bus.subscriber_count("results"), 0);
    }

    #[tokio::test]
    async fn unsubscribe_wakes_pending_receiver() {
        let bus: EventBus<u32> = EventBus::new();
        let mut sub = bus.subscribe("results");
        let handle = sub.handle().clone();

        let waiter = tokio::spawn(async move { sub.recv().await });
        tokio::task::yield_now().await;
        bus.unsubscribe(&handle);

        let received = timeout(Duration::from_millis(100), waiter)
            .await
            .expect("timeout")
            .expect("join");
        assert_eq!(received, None);
    }

    #[tokio::test]
    async fn dropped_subscription_is_pruned_on_publish() {
        let bus = EventBus::new();
        let sub = bus.subscribe("results");
        drop(sub);

        assert_eq!(bus.publish("results", 1), 0);
        assert_eq!(bus.subscriber_count("results"), 0);
    }
}
