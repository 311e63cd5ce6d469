//! # Capture Events
//!
//! Lightweight events for live viewers (e.g. a browser gallery over SSE).
//! Delivery is best effort: an event with no listeners is dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Event kinds, serialized as `{"type": "...", "ts": <unix seconds>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CamEvent {
    Hello,
    Captured { ts: i64 },
    Uploaded { id: String, ts: i64 },
}

impl CamEvent {
    pub fn captured_now() -> Self {
        Self::Captured {
            ts: chrono::Utc::now().timestamp(),
        }
    }

    pub fn uploaded_now(id: impl Into<String>) -> Self {
        Self::Uploaded {
            id: id.into(),
            ts: chrono::Utc::now().timestamp(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"hello"}"#.to_string())
    }

    /// One server-sent-events frame: `data: <json>\n\n`.
    pub fn sse_frame(&self) -> String {
        format!("data: {}\n\n", self.to_json())
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, event: CamEvent);
}

/// Fan-out over a tokio broadcast channel.
///
/// Slow subscribers lag and skip events rather than block the camera.
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<CamEvent>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CamEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, event: CamEvent) {
        match self.tx.send(event) {
            Ok(n) => trace!(receivers = n, "event sent"),
            Err(broadcast::error::SendError(event)) => trace!(?event, "event dropped, no listeners"),
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _event: CamEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        assert_eq!(CamEvent::Hello.to_json(), r#"{"type":"hello"}"#);
        assert_eq!(
            CamEvent::Captured { ts: 17 }.to_json(),
            r#"{"type":"captured","ts":17}"#
        );
        let uploaded = CamEvent::Uploaded {
            id: "abc".into(),
            ts: 3,
        };
        let value: serde_json::Value = serde_json::from_str(&uploaded.to_json()).unwrap();
        assert_eq!(value["type"], "uploaded");
        assert_eq!(value["id"], "abc");
    }

    #[test]
    fn sse_frame_format() {
        assert_eq!(CamEvent::Hello.sse_frame(), "data: {\"type\":\"hello\"}\n\n");
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let notifier = BroadcastNotifier::new(4);
        let mut rx = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);
        notifier.notify(CamEvent::Captured { ts: 1 });
        assert_eq!(rx.recv().await.unwrap(), CamEvent::Captured { ts: 1 });
    }

    #[test]
    fn notify_without_listeners_is_silent() {
        BroadcastNotifier::default().notify(CamEvent::Hello);
    }
}
