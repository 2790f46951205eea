//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to lifecycle events emitted by the replier and its
//! listener task.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Replier` (start/stop/reset transitions), `ListenerActor`
//!   (sessions, restarts), `session::run_session` (connect/subscribe/dispatch).
//! - **Consumers**: the replier's subscriber listener (fans out to
//!   `SubscriberSet`), and anything holding [`Replier::events`](crate::Replier::events).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind, RestartCause};
