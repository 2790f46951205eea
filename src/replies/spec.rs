//! # Registration requests.
//!
//! [`ReplySpec`] bundles what a caller asks for: a subject (possibly empty when
//! an enclosing resolver scope already names it), a [`Queue`] override and a
//! handler. Queue resolution happens later, in the [`Resolver`](super::Resolver),
//! strictly at registration time.

use std::fmt;

use super::handler::HandlerRef;

/// Queue-group override at one level of the resolution chain.
///
/// `Inherit` defers to the next level out. `None` is a deliberate "no queue"
/// that also hides every outer default. An empty name means `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Queue {
    /// Not specified at this level.
    #[default]
    Inherit,
    /// Explicitly no queue group.
    None,
    /// Join this queue group.
    Named(String),
}

impl Queue {
    /// Named queue; an empty name yields [`Queue::None`].
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() {
            Queue::None
        } else {
            Queue::Named(name)
        }
    }

    /// True for [`Queue::Inherit`].
    pub fn is_inherit(&self) -> bool {
        matches!(self, Queue::Inherit)
    }
}

impl From<&str> for Queue {
    fn from(name: &str) -> Self {
        Queue::named(name)
    }
}

impl From<String> for Queue {
    fn from(name: String) -> Self {
        Queue::named(name)
    }
}

impl From<Option<&str>> for Queue {
    /// `Some(name)` overrides, `None` is an explicit "no queue".
    fn from(name: Option<&str>) -> Self {
        name.map_or(Queue::None, Queue::named)
    }
}

/// A request to register one reply handler.
///
/// ## Example
/// ```rust
/// use replyvisor::{HandlerFn, Queue, ReplySpec};
/// use serde_json::Value;
///
/// let spec = ReplySpec::new("math.add")
///     .with_queue("calc")
///     .with_handler(HandlerFn::arc(|data: Value, _subject: String| async move {
///         anyhow::Ok(data)
///     }));
///
/// assert_eq!(spec.subject(), "math.add");
/// assert_eq!(spec.queue(), &Queue::Named("calc".into()));
/// assert!(spec.handler().is_some());
/// ```
#[derive(Clone, Default)]
pub struct ReplySpec {
    subject: String,
    queue: Queue,
    handler: Option<HandlerRef>,
}

impl ReplySpec {
    /// Creates a spec for `subject` (any `Display` value) with no handler yet.
    pub fn new(subject: impl fmt::Display) -> Self {
        Self {
            subject: subject.to_string(),
            queue: Queue::Inherit,
            handler: None,
        }
    }

    /// Spec with no subject of its own: the enclosing scopes name it.
    pub fn here() -> Self {
        Self::default()
    }

    /// Returns a new spec with the given queue override.
    pub fn with_queue(mut self, queue: impl Into<Queue>) -> Self {
        self.queue = queue.into();
        self
    }

    /// Returns a new spec with the given handler.
    pub fn with_handler(mut self, handler: HandlerRef) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Subject given by the caller (not yet composed with scopes).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Queue override given by the caller.
    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    /// Handler, if set.
    pub fn handler(&self) -> Option<&HandlerRef> {
        self.handler.as_ref()
    }

    pub(crate) fn into_parts(self) -> (String, Queue, Option<HandlerRef>) {
        (self.subject, self.queue, self.handler)
    }
}

impl fmt::Debug for ReplySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySpec")
            .field("subject", &self.subject)
            .field("queue", &self.queue)
            .field("handler", &self.handler.as_ref().map(|h| h.describe()))
            .finish()
    }
}
