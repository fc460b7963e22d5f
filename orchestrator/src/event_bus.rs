//! Ordered, per-request event fan-out to live subscribers.
//!
//! Delivery is at-least-once to subscribers that keep up; a subscriber
//! that falls behind its bounded channel is disconnected rather than
//! allowed to stall publication for everyone else, matching the
//! publish side's bounded-time backpressure requirement.

use council_contracts::events::EventEnvelope;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;
const PUBLISH_TIMEOUT: Duration = Duration::from_millis(500);

pub struct EventBus {
    subscribers: DashMap<Uuid, Vec<mpsc::Sender<EventEnvelope>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    pub fn subscribe(&self, request_id: Uuid) -> mpsc::Receiver<EventEnvelope> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers.entry(request_id).or_default().push(tx);
        rx
    }

    /// Delivers `event` to every live subscriber of its `request_id` in
    /// the order this method is called; a subscriber whose channel is
    /// full after [`PUBLISH_TIMEOUT`] is dropped from the fan-out list
    /// rather than blocking this call indefinitely.
    pub async fn publish(&self, event: EventEnvelope) {
        let request_id = event.request_id;
        let Some(mut entry) = self.subscribers.get_mut(&request_id) else {
            return;
        };

        let mut still_alive = Vec::with_capacity(entry.len());
        for sender in entry.drain(..) {
            match tokio::time::timeout(PUBLISH_TIMEOUT, sender.send(event.clone())).await {
                Ok(Ok(())) => still_alive.push(sender),
                Ok(Err(_)) => {} // receiver dropped
                Err(_) => warn!(%request_id, "subscriber too slow, disconnecting"),
            }
        }
        *entry = still_alive;
    }

    pub fn close_request(&self, request_id: Uuid) {
        self.subscribers.remove(&request_id);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use council_contracts::events::StageEvent;
    use council_contracts::ExecutionMode;

    fn event(request_id: Uuid) -> EventEnvelope {
        EventEnvelope::new(
            request_id,
            StageEvent::ProcessingStarted {
                execution_mode: ExecutionMode::Balanced,
            },
        )
    }

    #[tokio::test]
    async fn subscriber_receives_published_events_in_order() {
        let bus = EventBus::new();
        let request_id = Uuid::new_v4();
        let mut rx = bus.subscribe(request_id);

        bus.publish(event(request_id)).await;
        bus.publish(event(request_id)).await;

        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_is_a_no_op() {
        let bus = EventBus::new();
        bus.publish(event(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn dropped_receiver_is_pruned_on_next_publish() {
        let bus = EventBus::new();
        let request_id = Uuid::new_v4();
        let rx = bus.subscribe(request_id);
        drop(rx);

        bus.publish(event(request_id)).await;
        assert!(bus.subscribers.get(&request_id).map(|v| v.is_empty()).unwrap_or(true));
    }
}
