//! # Event subscribers for the replyvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! and the built-in [`LogWriter`] that turns lifecycle events into `tracing` records.
//!
//! ## Architecture
//! ```text
//! Listener/Replier ── publish(Event) ──► Bus ──► subscriber_listener ──► SubscriberSet
//!                                                                   ┌─────────┼─────────┐
//!                                                                   ▼         ▼         ▼
//!                                                               LogWriter  Metrics   Custom
//! ```
//!
//! A replier built without subscribers logs nothing: the sink is optional.

mod log;
mod set;
mod subscribe;

pub use log::LogWriter;
pub(crate) use set::panic_message;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
