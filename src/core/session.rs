//! # One listener session.
//!
//! A session owns one bus connection from connect to close and serves a fixed
//! registry snapshot. It ends on the first of:
//!
//! ```text
//! token cancelled            ──► Cancelled
//! registry generation bumped ──► Resubscribe
//! dispatch failed / panicked ──► DispatchFailed
//! connect / subscribe failed ──► TransportFailed
//! a subscription ended       ──► TransportFailed
//! ```
//!
//! ## Rules
//! - The change receiver is marked seen **before** the snapshot is taken, so a
//!   registration racing with startup always produces a resubscription.
//! - Every inbound message is dispatched on its own task (per-session `JoinSet`).
//! - In-flight dispatches are aborted when the session ends; the connection is
//!   closed afterwards and close errors are only logged.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{self, BoxStream, SelectAll, StreamExt};
use futures::{future, FutureExt};
use tokio::select;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::dispatch::dispatch;
use super::listener::ListenerActor;
use crate::error::{DispatchError, TransportError};
use crate::events::{Event, EventKind};
use crate::replies::{ReplyRegistration, Snapshot};
use crate::subscribers::panic_message;
use crate::transport::{Connection, Message};

/// Why a session ended.
#[derive(Debug)]
pub(crate) enum SessionExit {
    /// Stop was requested.
    Cancelled,
    /// The registry changed; serve a fresh snapshot.
    Resubscribe,
    /// The bus is unusable.
    TransportFailed(TransportError),
    /// Serving one request failed.
    DispatchFailed {
        /// Resolved subject of the failed request.
        subject: String,
        /// What went wrong.
        error: DispatchError,
    },
}

/// A message for one registration; `None` marks the end of its subscription.
type Tagged = (Arc<ReplyRegistration>, Option<Message>);
type Inbound = SelectAll<BoxStream<'static, Tagged>>;
type Inflight = JoinSet<(String, Result<(), DispatchError>)>;

/// Runs one session for `actor`; `attempt` numbers it for events.
pub(crate) async fn run_session(
    actor: &ListenerActor,
    attempt: u32,
    token: &CancellationToken,
) -> SessionExit {
    let mut changes = actor.registry.changes();
    changes.borrow_and_update();

    let conn = select! {
        biased;
        _ = token.cancelled() => return SessionExit::Cancelled,
        res = actor.transport.connect(&actor.cfg.servers) => match res {
            Ok(conn) => conn,
            Err(e) => return SessionExit::TransportFailed(e),
        },
    };
    actor
        .bus
        .publish(Event::new(EventKind::Connected).with_attempt(attempt));

    let snapshot = actor.registry.list();
    let exit = match subscribe_all(actor, &conn, &snapshot).await {
        Ok(inbound) => {
            actor.bus.publish(
                Event::new(EventKind::ListenerReady)
                    .with_attempt(attempt)
                    .with_subscriptions(snapshot.len()),
            );
            serve(&conn, inbound, &mut changes, token).await
        }
        Err(e) => SessionExit::TransportFailed(e),
    };

    if let Err(e) = conn.close().await {
        debug!(error = %e, "closing bus connection failed");
    }
    exit
}

async fn subscribe_all(
    actor: &ListenerActor,
    conn: &Arc<dyn Connection>,
    snapshot: &Snapshot,
) -> Result<Inbound, TransportError> {
    let mut inbound = SelectAll::new();
    for registration in snapshot {
        let messages = conn
            .subscribe(registration.subject(), registration.queue())
            .await?;
        let tag = Arc::clone(registration);
        inbound.push(
            messages
                .map(Some)
                .chain(stream::once(future::ready(None)))
                .map(move |msg| (Arc::clone(&tag), msg))
                .boxed(),
        );

        actor.bus.publish(
            Event::new(EventKind::Subscribed)
                .with_subject(registration.subject())
                .with_queue(registration.queue()),
        );
    }
    Ok(inbound)
}

async fn serve(
    conn: &Arc<dyn Connection>,
    mut inbound: Inbound,
    changes: &mut watch::Receiver<u64>,
    token: &CancellationToken,
) -> SessionExit {
    let subscribed = !inbound.is_empty();
    let mut inflight = Inflight::new();

    let exit = loop {
        select! {
            biased;

            _ = token.cancelled() => break SessionExit::Cancelled,

            changed = changes.changed() => match changed {
                Ok(()) => break SessionExit::Resubscribe,
                // Registry dropped: nothing left to serve.
                Err(_) => break SessionExit::Cancelled,
            },

            Some(joined) = inflight.join_next(), if !inflight.is_empty() => match joined {
                Ok((_, Ok(()))) => {}
                Ok((subject, Err(error))) => break SessionExit::DispatchFailed { subject, error },
                Err(e) => debug!(error = %e, "dispatch task aborted"),
            },

            next = inbound.next(), if subscribed => match next {
                Some((registration, Some(msg))) => {
                    spawn_dispatch(&mut inflight, Arc::clone(conn), registration, msg);
                }
                Some((registration, None)) => {
                    warn!(subject = %registration.subject(), "subscription ended by the bus");
                    break SessionExit::TransportFailed(TransportError::Subscribe {
                        subject: registration.subject().to_string(),
                        reason: "subscription ended".into(),
                    });
                }
                None => break SessionExit::TransportFailed(TransportError::Closed),
            },
        }
    };

    inflight.shutdown().await;
    exit
}

fn spawn_dispatch(
    inflight: &mut Inflight,
    conn: Arc<dyn Connection>,
    registration: Arc<ReplyRegistration>,
    msg: Message,
) {
    let subject = msg.subject.clone();
    inflight.spawn(async move {
        let res = match AssertUnwindSafe(dispatch(conn, registration, msg))
            .catch_unwind()
            .await
        {
            Ok(res) => res,
            Err(panic) => Err(DispatchError::Panicked {
                message: panic_message(panic.as_ref()),
            }),
        };
        (subject, res)
    });
}
