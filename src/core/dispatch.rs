//! # Serve one inbound request.
//!
//! ```text
//! Message ──► decode(payload) ──► handler.call(data, subject) ──► encode(value) ──► publish(reply)
//! ```
//!
//! ## Payload rules
//! - JSON object with a `data` key and an `id` and/or `pattern` key: an envelope,
//!   `data` is the handler input and `id` is logged.
//! - Any other JSON document: the handler input itself.
//! - Anything else: a JSON string of the (lossy UTF-8) bytes.
//!
//! ## Reply rules
//! - No reply address: the result is discarded.
//! - `Value::String`: published verbatim, without JSON quoting.
//! - Anything else: JSON-encoded.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DispatchError;
use crate::replies::ReplyRegistration;
use crate::transport::{Connection, Message};

const ENVELOPE_DATA: &str = "data";
const ENVELOPE_ID: &str = "id";
const ENVELOPE_PATTERN: &str = "pattern";

/// Decoded request payload.
#[derive(Debug, PartialEq)]
pub(crate) struct Request {
    /// Envelope id, if the payload was an envelope carrying one.
    pub id: Option<Value>,
    /// Handler input.
    pub data: Value,
}

pub(crate) fn decode(payload: &[u8]) -> Request {
    match serde_json::from_slice::<Value>(payload) {
        Ok(Value::Object(obj)) if is_envelope(&obj) => unwrap_envelope(obj),
        Ok(data) => Request { id: None, data },
        Err(_) => Request {
            id: None,
            data: Value::String(String::from_utf8_lossy(payload).into_owned()),
        },
    }
}

fn is_envelope(obj: &Map<String, Value>) -> bool {
    obj.contains_key(ENVELOPE_DATA)
        && (obj.contains_key(ENVELOPE_ID) || obj.contains_key(ENVELOPE_PATTERN))
}

fn unwrap_envelope(mut obj: Map<String, Value>) -> Request {
    Request {
        id: obj.remove(ENVELOPE_ID),
        data: obj.remove(ENVELOPE_DATA).unwrap_or(Value::Null),
    }
}

pub(crate) fn encode(subject: &str, value: Value) -> Result<Bytes, DispatchError> {
    match value {
        Value::String(text) => Ok(Bytes::from(text)),
        other => serde_json::to_vec(&other)
            .map(Bytes::from)
            .map_err(|source| DispatchError::Encode {
                subject: subject.to_string(),
                source,
            }),
    }
}

/// Runs the registration's handler on `msg` and publishes the reply, if asked for.
pub(crate) async fn dispatch(
    conn: Arc<dyn Connection>,
    registration: Arc<ReplyRegistration>,
    msg: Message,
) -> Result<(), DispatchError> {
    let Request { id, data } = decode(&msg.payload);
    debug!(
        id = ?id,
        pattern = %registration.subject(),
        subject = %msg.subject,
        data = %data,
        reply = ?msg.reply,
        "dispatching request"
    );

    let value = registration
        .handler()
        .call(data, msg.subject.clone())
        .await
        .map_err(|source| DispatchError::Handler {
            subject: msg.subject.clone(),
            source,
        })?;

    match &msg.reply {
        Some(reply) => {
            let payload = encode(&msg.subject, value)?;
            conn.publish(reply, payload).await?;
            debug!(id = ?id, subject = %msg.subject, reply = %reply, "reply published");
        }
        None => {
            debug!(id = ?id, subject = %msg.subject, "request handled, no reply address");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replies::{HandlerFn, HandlerRef};
    use crate::transport::MemoryTransport;
    use futures::StreamExt;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn envelope_is_unwrapped() {
        let req = decode(br#"{"id":"7","pattern":"math.add","data":[1,2]}"#);
        assert_eq!(req.id, Some(json!("7")));
        assert_eq!(req.data, json!([1, 2]));

        let req = decode(br#"{"pattern":"math.add","data":null}"#);
        assert_eq!(req, Request { id: None, data: Value::Null });
    }

    #[test]
    fn plain_json_is_the_payload() {
        assert_eq!(decode(br#"{"data":1}"#).data, json!({"data": 1}));
        assert_eq!(decode(b"[1,2,3]").data, json!([1, 2, 3]));
        assert_eq!(decode(b"42").data, json!(42));
    }

    #[test]
    fn raw_bytes_become_a_string() {
        assert_eq!(decode(b"hello").data, json!("hello"));
        assert_eq!(decode(b"").data, json!(""));
        assert_eq!(decode(&[0x66, 0xff]).data, json!("f\u{fffd}"));
    }

    #[test]
    fn strings_are_sent_verbatim() {
        assert_eq!(encode("s", json!("pong")).expect("encode"), Bytes::from_static(b"pong"));
        assert_eq!(
            encode("s", json!({"sum": 3})).expect("encode"),
            Bytes::from_static(br#"{"sum":3}"#)
        );
        assert_eq!(encode("s", Value::Null).expect("encode"), Bytes::from_static(b"null"));
    }

    fn registration(subject: &str, handler: HandlerRef) -> Arc<ReplyRegistration> {
        Arc::new(ReplyRegistration::new(subject.into(), None, handler))
    }

    #[tokio::test]
    async fn publishes_result_to_reply_address() {
        let bus = MemoryTransport::new();
        let conn = bus.client();
        let mut inbox = conn.subscribe("inbox.1", None).await.expect("inbox");

        let sum = HandlerFn::arc(|data: Value, subject: String| async move {
            let total: i64 = data
                .as_array()
                .map(|xs| xs.iter().filter_map(Value::as_i64).sum())
                .unwrap_or_default();
            anyhow::Ok(json!({ "subject": subject, "sum": total }))
        });
        let msg = Message {
            subject: "math.add".into(),
            reply: Some("inbox.1".into()),
            payload: Bytes::from_static(br#"{"id":1,"data":[1,2]}"#),
        };

        dispatch(Arc::clone(&conn), registration("math.*", sum), msg)
            .await
            .expect("dispatch");

        let reply = inbox.next().await.expect("reply");
        let body: Value = serde_json::from_slice(&reply.payload).expect("json");
        assert_eq!(body, json!({ "subject": "math.add", "sum": 3 }));
    }

    #[tokio::test]
    async fn result_without_reply_address_is_dropped() {
        let bus = MemoryTransport::new();
        let watcher = bus.client();
        let mut everything = watcher.subscribe(">", None).await.expect("watch");

        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        let handler = HandlerFn::arc(move |_data: Value, _subject: String| {
            let counted = Arc::clone(&counted);
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(json!("ignored"))
            }
        });
        let msg = Message {
            subject: "audit.log".into(),
            reply: None,
            payload: Bytes::from_static(b"entry"),
        };

        dispatch(bus.client(), registration("audit.log", handler), msg)
            .await
            .expect("fire and forget");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        watcher.close().await.expect("close");
        assert!(everything.next().await.is_none());
    }

    #[tokio::test]
    async fn handler_error_carries_subject() {
        let bus = MemoryTransport::new();
        let failing = HandlerFn::arc(|_data: Value, _subject: String| async move {
            Err::<Value, _>(anyhow::anyhow!("division by zero"))
        });
        let msg = Message {
            subject: "math.div".into(),
            reply: None,
            payload: Bytes::from_static(b"[1,0]"),
        };

        let err = dispatch(bus.client(), registration("math.div", failing), msg)
            .await
            .expect_err("handler error");
        assert_eq!(err.as_label(), "dispatch_handler_failed");
        assert!(err.to_string().contains("math.div"));
    }
}
