//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom observers into the
//! runtime. Each subscriber is driven by a dedicated worker fed by a bounded
//! queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow; they never block the listener nor other subscribers.
//! - On queue overflow, events for that subscriber are **dropped** (warn).

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event subscribers.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use replyvisor::{Event, EventKind, Subscribe};
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// #[derive(Default)]
/// struct RestartCounter(AtomicU64);
///
/// #[async_trait]
/// impl Subscribe for RestartCounter {
///     async fn on_event(&self, ev: &Event) {
///         if ev.kind == EventKind::RestartScheduled {
///             self.0.fetch_add(1, Ordering::Relaxed);
///         }
///     }
///
///     fn name(&self) -> &'static str {
///         "restart-counter"
///     }
/// }
/// ```
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
