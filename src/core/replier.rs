//! # Replier: reply registry plus the listener lifecycle controller.
//!
//! The [`Replier`] owns the [`Registry`], the event [`Bus`], the subscriber
//! fan-out and at most one background listener task.
//!
//! ## State machine
//! ```text
//!              start()                      stop() / reset()
//!   Stopped ───────────► Running ─────────────────────────────► Stopped
//!      ▲  start() while Running: StartIgnored        │
//!      │                                             │ transport failure
//!      └─────────────────────────────────────────────┘ (listener exits, no retry)
//!
//!   restart() = stop() + start() under one transition lock
//!   reset()   = clear registry + stop()
//! ```
//!
//! ## High-level architecture
//! ```text
//! Resolver ──register──► Registry ──generation bump──┐
//!                           │ snapshot                ▼
//!                           └──────────────► ListenerActor::run(token)
//!                                                │ run_session()
//!                                                ├─► Transport::connect(servers)
//!                                                ├─► subscribe × N (queue groups)
//!                                                └─► dispatch per message ──► publish(reply)
//!
//! ListenerActor / Replier ── publish(Event) ──► Bus ──► SubscriberSet ──► LogWriter, ...
//! ```
//!
//! ## Rules
//! - Transitions are serialized by one async mutex around the listener handle.
//! - A transition whose future is dropped leaves a consistent state: `stop()` marks
//!   `Stopped` before awaiting, and `start()` only trusts a live listener handle.
//! - `stop()` cancels the listener, waits up to [`Config::grace`], then aborts it.
//! - `start()`, `stop()`, `restart()` and `reset()` never fail; problems are
//!   reported as events and logs.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bytes::Bytes;
//! use serde_json::Value;
//! use replyvisor::{Config, HandlerFn, MemoryTransport, ReplierBuilder, ReplySpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = MemoryTransport::new();
//!     let replier = ReplierBuilder::new(Config::default())
//!         .with_transport(Arc::new(bus.clone()))
//!         .build()?;
//!
//!     let mut events = replier.events();
//!     replier.register(ReplySpec::new("ping").with_handler(HandlerFn::arc(
//!         |_data: Value, _subject: String| async move { anyhow::Ok(Value::from("pong")) },
//!     )))?;
//!     replier.start().await;
//!
//!     // Wait until the listener has subscribed.
//!     while events.recv().await?.kind != replyvisor::EventKind::ListenerReady {}
//!
//!     let reply = bus
//!         .client()
//!         .request("ping", Bytes::new(), Duration::from_secs(1))
//!         .await?;
//!     assert_eq!(reply.payload, Bytes::from_static(b"pong"));
//!
//!     replier.stop().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::config::Config;
use super::listener::{ListenerActor, ListenerExit};
use super::shutdown;
use super::state::{ListenerState, StateCell};
use crate::error::{RegistryError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::replies::{Queue, Registry, ReplyRegistration, ReplySpec, Resolver};
use crate::subscribers::SubscriberSet;
use crate::transport::Transport;

/// Handle to the running listener task.
struct ListenerHandle {
    join: JoinHandle<ListenerExit>,
    token: CancellationToken,
}

impl ListenerHandle {
    /// Not asked to stop and still running.
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.join.is_finished()
    }
}

/// Reply registry and listener lifecycle controller.
///
/// Built with [`ReplierBuilder`](crate::ReplierBuilder).
pub struct Replier {
    cfg: Config,
    default_queue: Queue,
    registry: Arc<Registry>,
    transport: Arc<dyn Transport>,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    state: Arc<StateCell>,
    listener: Mutex<Option<ListenerHandle>>,
}

impl Replier {
    pub(crate) fn new_internal(
        cfg: Config,
        default_queue: Queue,
        transport: Arc<dyn Transport>,
        bus: Bus,
        subs: Arc<SubscriberSet>,
    ) -> Self {
        Self {
            cfg,
            default_queue,
            registry: Arc::new(Registry::new()),
            transport,
            bus,
            subs,
            state: Arc::new(StateCell::new()),
            listener: Mutex::new(None),
        }
    }

    /// Starts the listener; publishes `StartIgnored` if it is already running.
    pub async fn start(&self) {
        let mut slot = self.listener.lock().await;
        self.start_locked(&mut slot).await;
    }

    /// Stops the listener and waits for it (bounded by [`Config::grace`]). Idempotent.
    pub async fn stop(&self) {
        let mut slot = self.listener.lock().await;
        self.stop_locked(&mut slot).await;
    }

    /// Stops the listener, then starts a fresh one from the current registry.
    pub async fn restart(&self) {
        let mut slot = self.listener.lock().await;
        self.stop_locked(&mut slot).await;
        self.start_locked(&mut slot).await;
    }

    /// Removes every registration and stops the listener.
    pub async fn reset(&self) {
        let mut slot = self.listener.lock().await;
        // Cancel first so the clear below is not taken for new subscriptions.
        if let Some(handle) = slot.as_ref() {
            handle.token.cancel();
        }
        self.registry.clear();
        self.bus.publish(Event::new(EventKind::RegistryCleared));
        self.stop_locked(&mut slot).await;
    }

    /// Starts the listener, waits for a termination signal, then stops it.
    ///
    /// Returns an error only if signal handlers cannot be installed; the
    /// listener is stopped in that case too.
    pub async fn run(&self) -> Result<(), RuntimeError> {
        self.start().await;
        let signal = shutdown::wait_for_shutdown_signal().await;
        if signal.is_ok() {
            self.bus.publish(Event::new(EventKind::ShutdownRequested));
        }
        self.stop().await;
        signal.map_err(RuntimeError::from)
    }

    async fn start_locked(&self, slot: &mut Option<ListenerHandle>) {
        let live = slot.as_ref().is_some_and(ListenerHandle::is_live);
        if live && self.state.get() == ListenerState::Running {
            self.bus.publish(Event::new(EventKind::StartIgnored));
            return;
        }
        // Reaps a listener that exited on its own or whose stop was dropped midway.
        self.reap(slot).await;

        let token = CancellationToken::new();
        let actor = ListenerActor {
            cfg: self.cfg.clone(),
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
            bus: self.bus.clone(),
            state: Arc::clone(&self.state),
        };
        self.state.set(ListenerState::Running);
        let join = tokio::spawn(actor.run(token.clone()));
        *slot = Some(ListenerHandle { join, token });
    }

    async fn stop_locked(&self, slot: &mut Option<ListenerHandle>) {
        if let Some(handle) = slot.as_ref() {
            handle.token.cancel();
        }
        // Set before the first await so a dropped stop cannot leave `Running` behind.
        let previous = self.state.set(ListenerState::Stopped);
        self.reap(slot).await;
        if previous == ListenerState::Running {
            self.bus.publish(Event::new(EventKind::ListenerStopped));
        }
    }

    /// Joins the listener in `slot`, if any, and empties the slot.
    ///
    /// The handle stays in the slot while joining, so a dropped caller leaves
    /// it for the next transition to reap.
    async fn reap(&self, slot: &mut Option<ListenerHandle>) {
        if let Some(handle) = slot.as_mut() {
            self.join_with_grace(handle).await;
        }
        *slot = None;
    }

    async fn join_with_grace(&self, handle: &mut ListenerHandle) {
        handle.token.cancel();

        match time::timeout(self.cfg.grace, &mut handle.join).await {
            Ok(Ok(exit)) => debug!(exit = ?exit, "listener exited"),
            Ok(Err(e)) => warn!(error = %e, "listener task ended abnormally"),
            Err(_elapsed) => {
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_delay(self.cfg.grace),
                );
                handle.join.abort();
                if let Err(e) = (&mut handle.join).await {
                    debug!(error = %e, "listener aborted");
                }
            }
        }
    }

    /// Registers a reply handler at the top level (no enclosing scopes).
    ///
    /// A running listener picks the new subject up with one restart.
    pub fn register(&self, spec: ReplySpec) -> Result<Arc<ReplyRegistration>, RegistryError> {
        self.resolver().register(spec)
    }

    /// Scoped registration builder using this replier's queue defaults.
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.registry, self.cfg.default_queue())
            .with_default_queue(self.default_queue.clone())
    }

    /// The reply registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Current listener state.
    pub fn state(&self) -> ListenerState {
        self.state.get()
    }

    /// True while the listener is running.
    pub fn is_running(&self) -> bool {
        self.state() == ListenerState::Running
    }

    /// Receiver observing every state change.
    pub fn watch_state(&self) -> watch::Receiver<ListenerState> {
        self.state.watch()
    }

    /// Receiver for lifecycle events published from now on.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Static configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Number of attached event subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subs.len()
    }
}
