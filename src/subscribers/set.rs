//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each [`Event`] to every subscriber **without
//! awaiting** their processing.
//!
//! ## Rules
//! - `emit(&Event)` returns immediately (`try_send`).
//! - Per-subscriber FIFO; no ordering across subscribers.
//! - Queue full or closed: the event is dropped for that subscriber only (warn).
//! - A panicking subscriber is caught and logged; its worker keeps running.
//!
//! ```text
//!    emit(&Event)
//!        ├────► [queue S1] ─► worker S1 ─► on_event()
//!        ├────► [queue S2] ─► worker S2 ─► on_event()
//!        └────► [queue SN] ─► worker SN ─► on_event()
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{error, warn};

use crate::events::Event;

use super::Subscribe;

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, mut rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));

            let handle = tokio::spawn(async move {
                while let Some(ev) = rx.recv().await {
                    let fut = sub.on_event(ev.as_ref());
                    if let Err(panic) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                        error!(
                            subscriber = sub.name(),
                            panic = %panic_message(panic.as_ref()),
                            "subscriber panicked"
                        );
                    }
                }
            });

            channels.push(SubscriberChannel { name, sender: tx });
            workers.push(handle);
        }

        Self { channels, workers }
    }

    /// Fan-out one event to all subscribers (non-blocking).
    pub fn emit(&self, event: &Event) {
        if self.channels.is_empty() {
            return;
        }
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            match channel.sender.try_send(Arc::clone(&ev)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscriber = channel.name, seq = ev.seq, "event dropped: queue full");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    warn!(subscriber = channel.name, seq = ev.seq, "event dropped: worker closed");
                }
            }
        }
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedSender;

    struct Forward(UnboundedSender<EventKind>);

    #[async_trait]
    impl Subscribe for Forward {
        async fn on_event(&self, ev: &Event) {
            let _ = self.0.send(ev.kind);
        }
    }

    struct Explodes;

    #[async_trait]
    impl Subscribe for Explodes {
        async fn on_event(&self, _ev: &Event) {
            panic!("subscriber bug");
        }
    }

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let set = SubscriberSet::new(vec![Arc::new(Forward(tx1)), Arc::new(Forward(tx2))]);
        assert_eq!(set.len(), 2);

        set.emit(&Event::new(EventKind::ListenerStarting));
        set.emit(&Event::new(EventKind::ListenerReady));
        set.shutdown().await;

        assert_eq!(rx1.recv().await, Some(EventKind::ListenerStarting));
        assert_eq!(rx1.recv().await, Some(EventKind::ListenerReady));
        assert_eq!(rx2.recv().await, Some(EventKind::ListenerStarting));
        assert_eq!(rx2.recv().await, Some(EventKind::ListenerReady));
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_starve_others() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let set = SubscriberSet::new(vec![Arc::new(Explodes), Arc::new(Forward(tx))]);

        set.emit(&Event::new(EventKind::ListenerStopped));
        set.emit(&Event::new(EventKind::RegistryCleared));
        set.shutdown().await;

        assert_eq!(rx.recv().await, Some(EventKind::ListenerStopped));
        assert_eq!(rx.recv().await, Some(EventKind::RegistryCleared));
    }

    #[test]
    fn panic_message_reads_string_payloads() {
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn std::any::Any + Send> = Box::new("static");
        let other: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "unknown panic");
    }
}
