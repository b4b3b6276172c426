//! Order notifications.
//!
//! Services publish events after their transaction commits. Delivery happens off the
//! request path and a failed delivery never touches the order.

use std::sync::Arc;

use serde::Serialize;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventKind {
    Created,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderEvent {
    pub kind: OrderEventKind,
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
}

pub trait Notifier: Send + Sync {
    /// Fire-and-forget; must not block.
    fn notify(&self, event: OrderEvent);
}

/// Logs events in place of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: OrderEvent) {
        tracing::info!(
            kind = ?event.kind,
            order_id = %event.order_id,
            order_number = %event.order_number,
            "order notification"
        );
    }
}

/// Queues events for a background delivery task.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: UnboundedSender<OrderEvent>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, UnboundedReceiver<OrderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, event: OrderEvent) {
        if self.tx.send(event).is_err() {
            tracing::warn!("notification dispatcher is gone, dropping event");
        }
    }
}

/// Start the delivery task; every queued event is handed to `sink`.
pub fn spawn_dispatcher<N>(sink: N) -> (Arc<dyn Notifier>, JoinHandle<()>)
where
    N: Notifier + 'static,
{
    let (notifier, mut rx) = ChannelNotifier::channel();
    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            sink.notify(event);
        }
        tracing::debug!("notification dispatcher stopped");
    });
    (Arc::new(notifier), handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Arc<Mutex<Vec<OrderEvent>>>);

    impl Notifier for Recorder {
        fn notify(&self, event: OrderEvent) {
            if let Ok(mut events) = self.0.lock() {
                events.push(event);
            }
        }
    }

    fn event(kind: OrderEventKind) -> OrderEvent {
        OrderEvent {
            kind,
            order_id: Uuid::new_v4(),
            order_number: "ORD-20250101-ABC123".into(),
            user_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn dispatcher_forwards_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (notifier, handle) = spawn_dispatcher(Recorder(seen.clone()));

        notifier.notify(event(OrderEventKind::Created));
        notifier.notify(event(OrderEventKind::Cancelled));
        drop(notifier);
        handle.await.unwrap();

        let kinds: Vec<_> = seen.lock().unwrap().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![OrderEventKind::Created, OrderEventKind::Cancelled]);
    }

    #[test]
    fn channel_notifier_survives_closed_receiver() {
        let (notifier, rx) = ChannelNotifier::channel();
        drop(rx);
        notifier.notify(event(OrderEventKind::Shipped));
    }
}
