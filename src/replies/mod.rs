//! # Reply handlers, their registry, and the subject/queue resolver.
//!
//! - [`Handler`] - async `(data, subject) -> response` contract
//! - [`HandlerFn`] - closure-backed handler; [`HandlerRef`] shared handle
//! - [`ReplySpec`] - one registration request (subject, queue override, handler)
//! - [`Queue`] - tri-state queue override (inherit / none / named)
//! - [`Registry`] - subject-unique store with change notification
//! - [`Resolver`] - nested-scope builder composing subjects and queues
//!
//! ```text
//! Resolver::subject("math", ..) ─► Resolver::reply(handler)
//!        │ compose "math.add", resolve queue
//!        ▼
//! Registry::insert ──► Snapshot (listener) + generation bump (resubscribe signal)
//! ```

mod handler;
mod registry;
mod resolver;
mod spec;

pub use handler::{BoxReplyFuture, Handler, HandlerFn, HandlerRef};
pub use registry::{Registry, ReplyRegistration, Snapshot};
pub use resolver::Resolver;
pub use spec::{Queue, ReplySpec};
