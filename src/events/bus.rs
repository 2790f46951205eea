//! # Event bus for broadcasting lifecycle events.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] used by the
//! replier, the listener actor and its sessions to report what they are doing.
//!
//! ## Architecture
//! ```text
//! Publishers:                        Receivers:
//!   Replier  ───────┐
//!   Listener ───────┼────► Bus ──┬─► subscriber_listener ──► SubscriberSet
//!   Session  ───────┘            └─► Replier::events() (tests, embedding apps)
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks.
//! - **Bounded capacity**: slow receivers get `RecvError::Lagged(n)`.
//! - **No persistence**: events sent with no live receiver are dropped.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for lifecycle events.
///
/// Cheap to clone; every clone publishes into the same ring buffer.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all active receivers; dropped if there are none.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn receivers_only_see_later_events() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ListenerStopped));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::StartIgnored));

        let ev = rx.recv().await.expect("event");
        assert_eq!(ev.kind, EventKind::StartIgnored);
    }
}
