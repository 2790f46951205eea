//! Runtime core: configuration, the listener and its lifecycle.
//!
//! The public API from this module is [`Replier`], built with [`ReplierBuilder`]
//! from a [`Config`], and the observable [`ListenerState`].
//!
//! Internal modules:
//! - [`replier`]: lifecycle controller (start/stop/restart/reset/run);
//! - [`listener`]: supervised loop of sessions with restart and backoff;
//! - [`session`]: one connection serving one registry snapshot;
//! - [`dispatch`]: decodes a request, calls its handler, publishes the reply;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod config;
mod dispatch;
mod listener;
mod replier;
mod session;
mod shutdown;
mod state;

pub use builder::ReplierBuilder;
pub use config::{Config, DEFAULT_SERVER};
pub use replier::Replier;
pub use state::ListenerState;
