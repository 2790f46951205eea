//! # replyvisor
//!
//! **Replyvisor** registers request handlers ("repliers") by subject on a
//! publish/subscribe bus and keeps one supervised background listener serving
//! them.
//!
//! Handlers are declared through a nested-scope [`Resolver`] that composes
//! dotted subjects and resolves queue groups. The listener subscribes to every
//! registration, dispatches each request to its handler, publishes the result
//! to the request's reply address, and restarts itself when handlers fail or
//! new subjects are registered while it runs.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   Resolver::subject("math", ..)      Replier::register(ReplySpec)
//!          │ compose subject, resolve queue │
//!          ▼                                ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Registry (subject → handler, queue)                              │
//! │  - unique subjects, insertion order                               │
//! │  - snapshot for listing                                           │
//! │  - watch generation = resubscription signal                       │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        │ snapshot                                     │ changed()
//!        ▼                                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Replier (lifecycle controller)                                   │
//! │  start / stop / restart / reset / run                             │
//! │  └─► ListenerActor (session loop, backoff)                        │
//! │        └─► session: connect ─► subscribe × N ─► dispatch × M      │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        │ Transport / Connection                       │ publish(Event)
//!        ▼                                              ▼
//!  MemoryTransport | NatsTransport            Bus ─► SubscriberSet ─► LogWriter, ...
//! ```
//!
//! ### Lifecycle
//! ```text
//! start() ──► Running ──► ListenerActor::run()
//!
//! loop {
//!   ├─► publish ListenerStarting{ attempt }
//!   ├─► run_session()
//!   │       ├─ Cancelled       ─► exit
//!   │       ├─ Resubscribe     ─► RestartScheduled(new subscriptions), continue
//!   │       ├─ DispatchFailed  ─► RestartScheduled(failure, backoff), sleep, continue
//!   │       └─ TransportFailed ─► state Stopped, exit (no retry)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                         |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Registration**  | Scoped subjects, queue groups, duplicate detection.          | [`Resolver`], [`ReplySpec`], [`Queue`]     |
//! | **Handlers**      | Async JSON handlers as closures or trait objects.            | [`Handler`], [`HandlerFn`], [`HandlerRef`] |
//! | **Lifecycle**     | Supervised listener with restart, reset and graceful stop.   | [`Replier`], [`ListenerState`]             |
//! | **Transport**     | Bus boundary, in-process broker, NATS adapter.               | [`Transport`], [`MemoryTransport`]         |
//! | **Subscriber API**| Hook into lifecycle events (logging, metrics, custom).       | [`Subscribe`], [`LogWriter`]               |
//! | **Policies**      | Backoff between failure-driven restarts.                     | [`BackoffPolicy`], [`JitterPolicy`]        |
//! | **Errors**        | Typed errors for registration, config, bus and dispatch.     | [`RegistryError`], [`TransportError`]      |
//!
//! ## Optional features
//! - `nats`: exposes `NatsTransport` (backed by `async-nats`) and makes it the default transport.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use serde_json::{Value, json};
//! use replyvisor::{Config, HandlerFn, MemoryTransport, ReplierBuilder, ReplySpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config {
//!         default_queue: Some("workers".into()),
//!         ..Config::default()
//!     };
//!     let replier = ReplierBuilder::new(cfg)
//!         .with_transport(Arc::new(MemoryTransport::new()))
//!         .build()?;
//!
//!     let add = HandlerFn::arc(|data: Value, _subject: String| async move {
//!         let sum: i64 = data
//!             .as_array()
//!             .map(|xs| xs.iter().filter_map(Value::as_i64).sum())
//!             .unwrap_or_default();
//!         anyhow::Ok(json!(sum))
//!     });
//!
//!     replier.resolver().subject("math", |r| {
//!         r.register(ReplySpec::new("add").with_queue("calc").with_handler(add))?;
//!         Ok(())
//!     })?;
//!     assert_eq!(replier.registry().get("math.add").unwrap().queue(), Some("calc"));
//!
//!     replier.start().await;
//!     replier.stop().await;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod policies;
mod replies;
mod subscribers;
pub mod transport;

// ---- Public re-exports ----

pub use crate::core::{Config, DEFAULT_SERVER, ListenerState, Replier, ReplierBuilder};
pub use error::{ConfigError, DispatchError, RegistryError, RuntimeError, TransportError};
pub use events::{Bus, Event, EventKind, RestartCause};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use replies::{
    BoxReplyFuture, Handler, HandlerFn, HandlerRef, Queue, Registry, ReplyRegistration,
    ReplySpec, Resolver, Snapshot,
};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
pub use transport::{Connection, MemoryTransport, Message, MessageStream, Transport};

#[cfg(feature = "nats")]
pub use transport::NatsTransport;
