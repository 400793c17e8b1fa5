//! Test doubles for the notifier, shared by downstream crate tests

use std::sync::Mutex;

use crate::events::ChatEvent;
use crate::notifier::Notifier;

/// Records every emission for assertions
#[derive(Default)]
pub struct RecordingNotifier {
    pub tenant_events: Mutex<Vec<(i32, ChatEvent)>>,
    pub visitor_events: Mutex<Vec<(i32, String, ChatEvent)>>,
    pub agent_events: Mutex<Vec<(i32, i32, ChatEvent)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tenant_event_count(&self) -> usize {
        self.tenant_events.lock().unwrap().len()
    }
}

impl Notifier for RecordingNotifier {
    fn broadcast_to_tenant(&self, tenant_id: i32, event: ChatEvent) {
        self.tenant_events.lock().unwrap().push((tenant_id, event));
    }

    fn notify_visitor(&self, tenant_id: i32, visitor_id: &str, event: ChatEvent) {
        self.visitor_events
            .lock()
            .unwrap()
            .push((tenant_id, visitor_id.to_string(), event));
    }

    fn notify_agent(&self, tenant_id: i32, agent_id: i32, event: ChatEvent) {
        self.agent_events
            .lock()
            .unwrap()
            .push((tenant_id, agent_id, event));
    }
}
