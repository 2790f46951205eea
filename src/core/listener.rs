//! # ListenerActor: the supervised background listener.
//!
//! Runs listener sessions back to back until stopped or until the bus becomes
//! unusable.
//!
//! ## Event flow
//! ```text
//! ListenerStarting → Connected → Subscribed × N → ListenerReady → [serving]
//!
//! Session ended by:
//!   registry change   → ResubscribeRequested → RestartScheduled(new subscriptions, 0ms) → next session
//!   dispatch failure  → DispatchFailed → RestartScheduled(failure, backoff) → [sleep] → next session
//!   transport failure → TransportFailed → exit (state Stopped, no retry)
//!   cancellation      → exit
//! ```
//!
//! ## Rules
//! - Sessions run **sequentially**; one connection at a time.
//! - Exactly one `RestartScheduled` per restart cycle.
//! - Consecutive dispatch failures drive the backoff exponent; a resubscription resets it.
//! - The state stays `Running` across internal restarts.

use std::sync::Arc;

use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::session::{SessionExit, run_session};
use super::state::{ListenerState, StateCell};
use crate::events::{Bus, Event, EventKind, RestartCause};
use crate::replies::Registry;
use crate::transport::Transport;

/// Why the listener task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListenerExit {
    /// Stopped through its cancellation token.
    Cancelled,
    /// The bus could not be used; the state was set to `Stopped`.
    TransportFailed,
}

/// Keeps the registry's subscriptions alive on one bus connection at a time.
pub(crate) struct ListenerActor {
    pub cfg: Config,
    pub registry: Arc<Registry>,
    pub transport: Arc<dyn Transport>,
    pub bus: Bus,
    pub state: Arc<StateCell>,
}

impl ListenerActor {
    /// Runs sessions until cancelled or until the transport fails.
    pub async fn run(self, token: CancellationToken) -> ListenerExit {
        let mut attempt: u32 = 0;
        let mut failures: u32 = 0;

        loop {
            if token.is_cancelled() {
                return ListenerExit::Cancelled;
            }
            attempt = attempt.saturating_add(1);
            self.bus
                .publish(Event::new(EventKind::ListenerStarting).with_attempt(attempt));

            match run_session(&self, attempt, &token).await {
                SessionExit::Cancelled => return ListenerExit::Cancelled,
                SessionExit::TransportFailed(e) => {
                    self.state.set(ListenerState::Stopped);
                    self.bus.publish(
                        Event::new(EventKind::TransportFailed)
                            .with_attempt(attempt)
                            .with_reason(e.to_string()),
                    );
                    return ListenerExit::TransportFailed;
                }
                SessionExit::Resubscribe => {
                    failures = 0;
                    self.bus.publish(
                        Event::new(EventKind::ResubscribeRequested).with_attempt(attempt),
                    );
                    self.bus.publish(
                        Event::new(EventKind::RestartScheduled)
                            .with_attempt(attempt)
                            .with_cause(RestartCause::NewSubscriptions)
                            .with_delay(time::Duration::ZERO),
                    );
                }
                SessionExit::DispatchFailed { subject, error } => {
                    failures = failures.saturating_add(1);
                    let reason = error.to_string();
                    self.bus.publish(
                        Event::new(EventKind::DispatchFailed)
                            .with_attempt(attempt)
                            .with_subject(subject)
                            .with_reason(reason.as_str()),
                    );

                    let delay = self.cfg.backoff.next(failures);
                    self.bus.publish(
                        Event::new(EventKind::RestartScheduled)
                            .with_attempt(attempt)
                            .with_cause(RestartCause::Failure)
                            .with_delay(delay)
                            .with_reason(reason),
                    );

                    let sleep = time::sleep(delay);
                    tokio::pin!(sleep);
                    select! {
                        _ = &mut sleep => {}
                        _ = token.cancelled() => return ListenerExit::Cancelled,
                    }
                }
            }
        }
    }
}
