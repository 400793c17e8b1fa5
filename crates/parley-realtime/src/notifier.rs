use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::debug;

use crate::events::ChatEvent;

/// Capacity per channel; a lagged dashboard re-fetches state instead of
/// replaying missed events
const CHANNEL_CAPACITY: usize = 64;

/// Injected notification capability
///
/// Components receive a `Notifier` at construction time; nothing looks it
/// up from ambient state. Emission never blocks the HTTP response path
/// and never fails: events with no connected subscriber are dropped.
pub trait Notifier: Send + Sync {
    fn broadcast_to_tenant(&self, tenant_id: i32, event: ChatEvent);
    fn notify_visitor(&self, tenant_id: i32, visitor_id: &str, event: ChatEvent);
    fn notify_agent(&self, tenant_id: i32, agent_id: i32, event: ChatEvent);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ChannelKey {
    Tenant(i32),
    Visitor(i32, String),
    Agent(i32, i32),
}

/// Broadcast-channel backed notifier
///
/// Senders are created lazily per channel key and kept for the process
/// lifetime; subscriber handles come from the WebSocket endpoints.
pub struct ChannelNotifier {
    channels: Mutex<HashMap<ChannelKey, broadcast::Sender<ChatEvent>>>,
}

impl Default for ChannelNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn sender_for(&self, key: ChannelKey) -> broadcast::Sender<ChatEvent> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    fn emit(&self, key: ChannelKey, event: ChatEvent) {
        let sender = self.sender_for(key.clone());
        // send fails only when no receiver is subscribed; that is the
        // documented drop case, not an error
        if sender.send(event).is_err() {
            debug!(?key, "no subscribers, event dropped");
        }
    }

    pub fn subscribe_tenant(&self, tenant_id: i32) -> broadcast::Receiver<ChatEvent> {
        self.sender_for(ChannelKey::Tenant(tenant_id)).subscribe()
    }

    pub fn subscribe_visitor(
        &self,
        tenant_id: i32,
        visitor_id: &str,
    ) -> broadcast::Receiver<ChatEvent> {
        self.sender_for(ChannelKey::Visitor(tenant_id, visitor_id.to_string()))
            .subscribe()
    }

    pub fn subscribe_agent(&self, tenant_id: i32, agent_id: i32) -> broadcast::Receiver<ChatEvent> {
        self.sender_for(ChannelKey::Agent(tenant_id, agent_id))
            .subscribe()
    }
}

impl Notifier for ChannelNotifier {
    fn broadcast_to_tenant(&self, tenant_id: i32, event: ChatEvent) {
        self.emit(ChannelKey::Tenant(tenant_id), event);
    }

    fn notify_visitor(&self, tenant_id: i32, visitor_id: &str, event: ChatEvent) {
        self.emit(ChannelKey::Visitor(tenant_id, visitor_id.to_string()), event);
    }

    fn notify_agent(&self, tenant_id: i32, agent_id: i32, event: ChatEvent) {
        self.emit(ChannelKey::Agent(tenant_id, agent_id), event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(tenant_id: i32) -> ChatEvent {
        ChatEvent::ChatEnded {
            visitor_id: "v-1".to_string(),
            tenant_id,
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_tenant_broadcast() {
        let notifier = ChannelNotifier::new();
        let mut rx = notifier.subscribe_tenant(1);

        notifier.broadcast_to_tenant(1, sample_event(1));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, ChatEvent::ChatEnded { tenant_id: 1, .. }));
    }

    #[tokio::test]
    async fn test_emit_without_subscriber_is_dropped() {
        let notifier = ChannelNotifier::new();
        // Must not panic or block
        notifier.broadcast_to_tenant(2, sample_event(2));
        notifier.notify_visitor(2, "v-9", sample_event(2));
        notifier.notify_agent(2, 5, sample_event(2));
    }

    #[tokio::test]
    async fn test_channels_are_isolated() {
        let notifier = ChannelNotifier::new();
        let mut tenant_one = notifier.subscribe_tenant(1);
        let mut tenant_two = notifier.subscribe_tenant(2);

        notifier.broadcast_to_tenant(1, sample_event(1));

        assert!(tenant_one.try_recv().is_ok());
        assert!(tenant_two.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_visitor_channel_scoped_by_id() {
        let notifier = ChannelNotifier::new();
        let mut target = notifier.subscribe_visitor(1, "v-1");
        let mut other = notifier.subscribe_visitor(1, "v-2");

        notifier.notify_visitor(1, "v-1", sample_event(1));

        assert!(target.try_recv().is_ok());
        assert!(other.try_recv().is_err());
    }
}
