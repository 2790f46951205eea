//! # Subject/queue resolver.
//!
//! Nested-scope builder used to register reply handlers. Each scope pushes a
//! subject segment and an optional queue override; registrations made inside
//! compose their subject from the whole stack and inherit the queue group.
//!
//! ## Queue precedence (highest wins)
//! ```text
//! terminal override ─► innermost scope ─► ... ─► outermost scope
//!                  ─► controller default ─► process default ─► no queue
//! ```
//! [`Queue::Inherit`] defers to the next level; [`Queue::None`] stops the
//! chain with "no queue". Everything is resolved at registration time.
//!
//! ## Example
//! ```rust
//! use replyvisor::{HandlerFn, Registry, ReplySpec, Resolver};
//! use serde_json::Value;
//!
//! let registry = Registry::new();
//! let echo = HandlerFn::arc(|data: Value, _subject: String| async move { anyhow::Ok(data) });
//!
//! let mut resolver = Resolver::new(&registry, Some("fallback"));
//! resolver
//!     .subject("math", |r| {
//!         r.register(ReplySpec::new("add").with_queue("calc").with_handler(echo.clone()))?;
//!         r.register(ReplySpec::new("sub").with_handler(echo.clone()))?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! assert_eq!(registry.get("math.add").unwrap().queue(), Some("calc"));
//! assert_eq!(registry.get("math.sub").unwrap().queue(), Some("fallback"));
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::handler::HandlerRef;
use super::registry::{Registry, ReplyRegistration};
use super::spec::{Queue, ReplySpec};
use crate::error::RegistryError;
use crate::transport::subject::SEPARATOR;

struct Frame {
    segment: String,
    queue: Queue,
}

/// Registration builder bound to a [`Registry`].
pub struct Resolver<'a> {
    registry: &'a Registry,
    process_default: Option<String>,
    controller_default: Queue,
    frames: Vec<Frame>,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver with the process-wide default queue (if any).
    pub fn new(registry: &'a Registry, process_default: Option<&str>) -> Self {
        Self {
            registry,
            process_default: process_default
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            controller_default: Queue::Inherit,
            frames: Vec::new(),
        }
    }

    /// Sets the controller-level default queue, ranked above the process default.
    pub fn with_default_queue(mut self, queue: impl Into<Queue>) -> Self {
        self.controller_default = queue.into();
        self
    }

    /// Runs `body` inside a scope that appends `segment` to the subject.
    ///
    /// The scope is popped when `body` returns, whether it succeeded or not.
    pub fn subject<T>(
        &mut self,
        segment: impl fmt::Display,
        body: impl FnOnce(&mut Self) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        self.subject_with_queue(segment, Queue::Inherit, body)
    }

    /// Like [`subject`](Self::subject), also overriding the queue for the scope.
    pub fn subject_with_queue<T>(
        &mut self,
        segment: impl fmt::Display,
        queue: impl Into<Queue>,
        body: impl FnOnce(&mut Self) -> Result<T, RegistryError>,
    ) -> Result<T, RegistryError> {
        self.frames.push(Frame {
            segment: segment.to_string(),
            queue: queue.into(),
        });
        let out = body(self);
        self.frames.pop();
        out
    }

    /// Registers `handler` on the subject named by the enclosing scopes.
    pub fn reply(&mut self, handler: HandlerRef) -> Result<Arc<ReplyRegistration>, RegistryError> {
        self.register(ReplySpec::here().with_handler(handler))
    }

    /// Like [`reply`](Self::reply) with a terminal queue override.
    pub fn reply_with_queue(
        &mut self,
        queue: impl Into<Queue>,
        handler: HandlerRef,
    ) -> Result<Arc<ReplyRegistration>, RegistryError> {
        self.register(ReplySpec::here().with_queue(queue).with_handler(handler))
    }

    /// Composes subject and queue for `spec` and stores it in the registry.
    pub fn register(&mut self, spec: ReplySpec) -> Result<Arc<ReplyRegistration>, RegistryError> {
        let (own, queue, handler) = spec.into_parts();
        let subject = self.compose(&own);
        if subject.is_empty() {
            return Err(RegistryError::InvalidSubject);
        }
        let handler = handler.ok_or_else(|| RegistryError::InvalidHandler {
            subject: subject.clone(),
        })?;
        let queue = self.resolve(&queue);

        let registration = self
            .registry
            .insert(ReplyRegistration::new(subject, queue, handler))?;
        debug!(
            subject = %registration.subject(),
            queue = ?registration.queue(),
            handler = %registration.handler().describe(),
            "reply handler registered"
        );
        Ok(registration)
    }

    /// Subject the current scope stack names.
    pub fn current_subject(&self) -> String {
        self.compose("")
    }

    /// Queue a registration without its own override would get here.
    pub fn current_queue(&self) -> Option<String> {
        self.resolve(&Queue::Inherit)
    }

    fn compose(&self, own: &str) -> String {
        let mut subject = String::new();
        let parts = self
            .frames
            .iter()
            .map(|f| f.segment.as_str())
            .chain(std::iter::once(own))
            .filter(|s| !s.is_empty());
        for part in parts {
            if !subject.is_empty() {
                subject.push(SEPARATOR);
            }
            subject.push_str(part);
        }
        subject
    }

    fn resolve(&self, terminal: &Queue) -> Option<String> {
        let chain = std::iter::once(terminal)
            .chain(self.frames.iter().rev().map(|f| &f.queue))
            .chain(std::iter::once(&self.controller_default));
        for level in chain {
            match level {
                Queue::Inherit => continue,
                Queue::None => return None,
                Queue::Named(name) => return Some(name.clone()),
            }
        }
        self.process_default.clone()
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("subject", &self.current_subject())
            .field("queue", &self.current_queue())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replies::HandlerFn;
    use serde_json::Value;

    fn echo() -> HandlerRef {
        HandlerFn::arc(|data: Value, _subject: String| async move { anyhow::Ok(data) })
    }

    fn queue_of(registry: &Registry, subject: &str) -> Option<String> {
        registry
            .get(subject)
            .expect("registered")
            .queue()
            .map(str::to_string)
    }

    #[test]
    fn nested_scopes_compose_dotted_subjects() {
        let registry = Registry::new();
        let mut r = Resolver::new(&registry, None);
        r.subject("svc", |r| {
            r.subject("users", |r| {
                r.subject(7, |r| {
                    assert_eq!(r.current_subject(), "svc.users.7");
                    r.reply(echo())?;
                    r.register(ReplySpec::new("get").with_handler(echo()))?;
                    Ok(())
                })
            })
        })
        .expect("register");

        assert_eq!(registry.list().subjects(), vec!["svc.users.7", "svc.users.7.get"]);
        assert_eq!(r.current_subject(), "");
    }

    #[test]
    fn terminal_override_beats_scope_and_defaults() {
        let registry = Registry::new();
        let mut r = Resolver::new(&registry, Some("process")).with_default_queue("controller");
        r.subject_with_queue("a", "outer", |r| {
            r.subject_with_queue("b", "inner", |r| {
                r.register(ReplySpec::new("t").with_queue("terminal").with_handler(echo()))?;
                r.register(ReplySpec::new("i").with_handler(echo()))?;
                Ok(())
            })?;
            r.register(ReplySpec::new("o").with_handler(echo()))?;
            Ok(())
        })
        .expect("register");
        r.register(ReplySpec::new("c").with_handler(echo())).expect("c");

        assert_eq!(queue_of(&registry, "a.b.t").as_deref(), Some("terminal"));
        assert_eq!(queue_of(&registry, "a.b.i").as_deref(), Some("inner"));
        assert_eq!(queue_of(&registry, "a.o").as_deref(), Some("outer"));
        assert_eq!(queue_of(&registry, "c").as_deref(), Some("controller"));
    }

    #[test]
    fn explicit_none_suppresses_outer_defaults() {
        let registry = Registry::new();
        let mut r = Resolver::new(&registry, Some("process")).with_default_queue("controller");
        r.subject_with_queue("fanout", Queue::None, |r| {
            r.reply(echo())?;
            r.subject_with_queue("grouped", "g", |r| r.reply(echo()))?;
            Ok(())
        })
        .expect("register");
        r.register(ReplySpec::new("plain").with_queue(Queue::None).with_handler(echo()))
            .expect("plain");

        assert_eq!(queue_of(&registry, "fanout"), None);
        assert_eq!(queue_of(&registry, "fanout.grouped").as_deref(), Some("g"));
        assert_eq!(queue_of(&registry, "plain"), None);
    }

    #[test]
    fn sibling_scopes_do_not_share_overrides() {
        let registry = Registry::new();
        let mut r = Resolver::new(&registry, None);
        r.subject_with_queue("left", "lq", |r| r.reply(echo()))
            .expect("left");
        r.subject("right", |r| {
            assert_eq!(r.current_queue(), None);
            r.reply(echo())
        })
        .expect("right");

        assert_eq!(queue_of(&registry, "left").as_deref(), Some("lq"));
        assert_eq!(queue_of(&registry, "right"), None);
    }

    #[test]
    fn math_subjects_resolve_against_process_default() {
        let registry = Registry::new();
        let mut r = Resolver::new(&registry, Some("fallback"));
        r.subject("math", |r| {
            r.register(ReplySpec::new("add").with_queue("calc").with_handler(echo()))?;
            r.register(ReplySpec::new("sub").with_handler(echo()))?;
            Ok(())
        })
        .expect("register");

        assert_eq!(queue_of(&registry, "math.add").as_deref(), Some("calc"));
        assert_eq!(queue_of(&registry, "math.sub").as_deref(), Some("fallback"));
    }

    #[test]
    fn scope_is_popped_when_body_fails() {
        let registry = Registry::new();
        let mut r = Resolver::new(&registry, None);
        r.register(ReplySpec::new("dup.x").with_handler(echo()))
            .expect("first");

        let err = r
            .subject_with_queue("dup", "q", |r| {
                r.register(ReplySpec::new("x").with_handler(echo()))
            })
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateSubject { subject: "dup.x".into() });
        assert_eq!(r.current_subject(), "");
        assert_eq!(r.current_queue(), None);
        assert_eq!(queue_of(&registry, "dup.x"), None);
    }

    #[test]
    fn empty_subject_and_missing_handler_are_rejected() {
        let registry = Registry::new();
        let mut r = Resolver::new(&registry, None);

        assert_eq!(r.reply(echo()).unwrap_err(), RegistryError::InvalidSubject);
        assert_eq!(
            r.register(ReplySpec::new("lonely")).unwrap_err(),
            RegistryError::InvalidHandler { subject: "lonely".into() }
        );
        assert!(registry.is_empty());
        assert_eq!(registry.generation(), 0);
    }

    #[test]
    fn empty_process_default_means_no_queue() {
        let registry = Registry::new();
        let mut r = Resolver::new(&registry, Some(""));
        r.register(ReplySpec::new("x").with_handler(echo())).expect("x");
        assert_eq!(queue_of(&registry, "x"), None);
    }
}
