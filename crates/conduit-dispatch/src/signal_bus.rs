//! Minimal in-process signal bus (SPEC_FULL.md §A.6): a `SignalSink`
//! implementation backed by `tokio::sync::broadcast`, grounded on the
//! bounded-broadcast-channel shape of `EventBus` in
//! `examples/querymt-querymt/crates/agent/src/event_bus.rs`, reduced to the
//! fire-and-forget `{category, kind, data}` triple this system's
//! `SignalSink` trait specifies (spec.md §6.3) rather than that crate's
//! richer observer-list/session-scoped event model.

use chrono::{DateTime, Utc};
use conduit_core::external::SignalSink;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

const BUS_BUFFER: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub category: String,
    pub kind: String,
    pub data: Value,
    pub emitted_at: DateTime<Utc>,
}

pub struct BroadcastSignalBus {
    sender: broadcast::Sender<Signal>,
}

impl BroadcastSignalBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_BUFFER);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSignalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SignalSink for BroadcastSignalBus {
    /// Best-effort: a lagging/absent receiver never fails the caller
    /// (spec.md §9 "signal bus fire and forget").
    async fn emit(&self, category: &str, kind: &str, data: Value) {
        let signal = Signal { category: category.to_string(), kind: kind.to_string(), data, emitted_at: Utc::now() };
        let _ = self.sender.send(signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_subscriber() {
        let bus = BroadcastSignalBus::new();
        let mut rx = bus.subscribe();
        bus.emit("demo", "fault_injected", serde_json::json!({"correlation_id": "c1"})).await;
        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.category, "demo");
        assert_eq!(signal.kind, "fault_injected");
    }

    #[tokio::test]
    async fn emit_without_subscribers_does_not_error() {
        let bus = BroadcastSignalBus::new();
        bus.emit("demo", "noop", serde_json::json!({})).await;
    }
}
