//! Listener state cell.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Whether the listener is serving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerState {
    /// No listener task (initial state).
    #[default]
    Stopped,
    /// A listener task owns the bus connection.
    Running,
}

impl ListenerState {
    /// Returns a short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerState::Stopped => "stopped",
            ListenerState::Running => "running",
        }
    }
}

impl fmt::Display for ListenerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Shared, observable [`ListenerState`].
pub(crate) struct StateCell {
    tx: watch::Sender<ListenerState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ListenerState::Stopped);
        Self { tx }
    }

    pub(crate) fn get(&self) -> ListenerState {
        *self.tx.borrow()
    }

    /// Stores `state` and returns the previous one.
    pub(crate) fn set(&self, state: ListenerState) -> ListenerState {
        self.tx.send_replace(state)
    }

    pub(crate) fn watch(&self) -> watch::Receiver<ListenerState> {
        self.tx.subscribe()
    }
}
