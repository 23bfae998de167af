//! The event stream the façade (C10) exposes to the engine: order-status
//! transitions from the pipeline (C6) and reconciler (C7), plus recoverable
//! brokerage warnings. Both producers share one pair of broadcast channels
//! so a single subscription observes every order regardless of which
//! component emitted the event.

use tokio::sync::broadcast;

use crate::types::execution::{BrokerageMessage, ExecutionEvent};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Shared fan-out point for execution events and brokerage messages.
/// Cloning is cheap (it clones the underlying `Sender` handles); every
/// clone broadcasts to the same set of subscribers.
#[derive(Clone)]
pub struct EventSinks {
    executions: broadcast::Sender<ExecutionEvent>,
    messages: broadcast::Sender<BrokerageMessage>,
}

impl EventSinks {
    pub fn new() -> Self {
        let (executions, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (messages, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { executions, messages }
    }

    pub fn subscribe_executions(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.executions.subscribe()
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<BrokerageMessage> {
        self.messages.subscribe()
    }

    pub fn emit_execution(&self, event: ExecutionEvent) {
        // no subscribers yet is routine (e.g. during startup), not an error
        let _ = self.executions.send(event);
    }

    pub fn emit_message(&self, message: BrokerageMessage) {
        let _ = self.messages.send(message);
    }
}

impl Default for EventSinks {
    fn default() -> Self {
        Self::new()
    }
}
