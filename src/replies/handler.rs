//! # Reply handler abstraction and its closure-backed implementation.
//!
//! A [`Handler`] receives the decoded request payload and the resolved subject
//! of the message (never the wildcard pattern it was subscribed with) and
//! produces a JSON value. Strings are replied verbatim, anything else is
//! JSON-encoded.
//!
//! Handlers are invoked concurrently with themselves; shared state belongs
//! behind an `Arc` captured by the closure.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

/// Boxed future returned by [`Handler::call`].
pub type BoxReplyFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'static>>;

/// Shared handle to a handler.
pub type HandlerRef = Arc<dyn Handler>;

/// # Request handler.
///
/// # Example
/// ```
/// use replyvisor::{BoxReplyFuture, Handler};
/// use serde_json::{Value, json};
///
/// struct Echo;
///
/// impl Handler for Echo {
///     fn call(&self, data: Value, subject: String) -> BoxReplyFuture {
///         Box::pin(async move { anyhow::Ok(json!({ "subject": subject, "data": data })) })
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    /// Serves one request.
    fn call(&self, data: Value, subject: String) -> BoxReplyFuture;

    /// Short description for logs.
    fn describe(&self) -> Cow<'_, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }
}

/// Closure-backed handler.
///
/// Wraps `F: Fn(Value, String) -> Fut`, producing a fresh future per request.
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Wraps a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Wraps a closure and returns it as a [`HandlerRef`].
    ///
    /// ```rust
    /// use replyvisor::{HandlerFn, HandlerRef};
    /// use serde_json::Value;
    ///
    /// let add: HandlerRef = HandlerFn::arc(|data: Value, _subject: String| async move {
    ///     let sum: i64 = data
    ///         .as_array()
    ///         .map(|xs| xs.iter().filter_map(Value::as_i64).sum())
    ///         .unwrap_or_default();
    ///     anyhow::Ok(Value::from(sum))
    /// });
    /// # let _ = add;
    /// ```
    pub fn arc<Fut>(f: F) -> HandlerRef
    where
        F: Fn(Value, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Value, String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    fn call(&self, data: Value, subject: String) -> BoxReplyFuture {
        Box::pin((self.f)(data, subject))
    }

    fn describe(&self) -> Cow<'_, str> {
        Cow::Borrowed("closure")
    }
}

impl<F> fmt::Debug for HandlerFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFn").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closure_receives_data_and_subject() {
        let h = HandlerFn::arc(|data: Value, subject: String| async move {
            anyhow::Ok(json!({ "subject": subject, "n": data["n"] }))
        });
        let out = h.call(json!({ "n": 3 }), "calc.square".into()).await.expect("reply");
        assert_eq!(out, json!({ "subject": "calc.square", "n": 3 }));
        assert_eq!(h.describe(), "closure");
    }

    #[tokio::test]
    async fn errors_surface_unchanged() {
        let h = HandlerFn::arc(|_data: Value, _subject: String| async move {
            Err::<Value, _>(anyhow::anyhow!("not today"))
        });
        let err = h.call(Value::Null, "x".into()).await.expect_err("failure");
        assert_eq!(err.to_string(), "not today");
    }
}
