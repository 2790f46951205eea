//! Restart delay policies.
//!
//! The listener restarts immediately when new subscriptions are registered
//! and waits `backoff.next(failures)` after a dispatch failure.
//!
//! ## Contents
//! - [`BackoffPolicy`] how the delay evolves with consecutive failures
//! - [`JitterPolicy`]  randomization applied on top of the computed delay
//!
//! ## Wiring
//! ```text
//! Config { backoff: BackoffPolicy, .. }
//!      └─► core::listener::ListenerActor uses:
//!           - backoff.next(consecutive_failures) before the next session
//!           - a resubscription resets consecutive_failures to 0
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
