//! # In-process broker.
//!
//! [`MemoryTransport`] routes messages between connections of the same
//! process with NATS semantics:
//! - wildcard subscriptions (`*`, `>`), see [`subject::matches`](super::subject::matches);
//! - queue groups: each message goes to **one** random member per group,
//!   and to every subscriber outside any group;
//! - request/reply through private `_INBOX.` subjects, failing fast with
//!   `NoResponders` when nothing matches;
//! - publishing to a wildcard subject is refused;
//! - closing (or dropping) a connection ends all of its streams.
//!
//! It backs the crate's tests and is handy for embedding the replier in
//! single-process tools. [`MemoryTransport::set_reachable`] simulates an
//! outage so connect failures can be exercised, and
//! [`MemoryTransport::end_subscriptions`] a server dropping subscriptions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use rand::Rng;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{Connection, Message, MessageStream, Transport, subject};
use crate::error::TransportError;

const INBOX_PREFIX: &str = "_INBOX.";

/// In-process message broker; clones share the same broker.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    broker: Arc<Broker>,
}

#[derive(Default)]
struct Broker {
    routes: Mutex<Vec<Route>>,
    next_id: AtomicU64,
    unreachable: AtomicBool,
    open: AtomicUsize,
}

struct Route {
    id: u64,
    conn: u64,
    pattern: String,
    queue: Option<String>,
    tx: mpsc::UnboundedSender<Message>,
}

impl MemoryTransport {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles whether `connect` succeeds.
    pub fn set_reachable(&self, reachable: bool) {
        self.broker.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Opens a connection regardless of reachability (client side of tests and tools).
    pub fn client(&self) -> Arc<dyn Connection> {
        Arc::new(self.open_connection())
    }

    /// Ends every live subscription on exactly `pattern`; returns how many ended.
    pub fn end_subscriptions(&self, pattern: &str) -> usize {
        let mut routes = self.broker.lock();
        let before = routes.len();
        routes.retain(|r| r.pattern != pattern);
        before - routes.len()
    }

    /// Number of live subscriptions, request inboxes excluded.
    pub fn subscription_count(&self) -> usize {
        self.broker
            .lock()
            .iter()
            .filter(|r| !r.tx.is_closed() && !r.pattern.starts_with(INBOX_PREFIX))
            .count()
    }

    /// Number of open connections.
    pub fn connection_count(&self) -> usize {
        self.broker.open.load(Ordering::SeqCst)
    }

    fn open_connection(&self) -> MemoryConnection {
        self.broker.open.fetch_add(1, Ordering::SeqCst);
        MemoryConnection {
            broker: Arc::clone(&self.broker),
            id: self.broker.next_id(),
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, servers: &[String]) -> Result<Arc<dyn Connection>, TransportError> {
        if servers.is_empty() {
            return Err(TransportError::Connect {
                reason: "no servers given".into(),
            });
        }
        if self.broker.unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable {
                servers: servers.to_vec(),
            });
        }
        Ok(self.client())
    }
}

impl Broker {
    fn lock(&self) -> MutexGuard<'_, Vec<Route>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn add(
        &self,
        conn: u64,
        pattern: &str,
        queue: Option<&str>,
    ) -> (u64, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.next_id();
        self.lock().push(Route {
            id,
            conn,
            pattern: pattern.to_string(),
            queue: queue.map(str::to_string),
            tx,
        });
        (id, rx)
    }

    fn remove(&self, id: u64) {
        self.lock().retain(|r| r.id != id);
    }

    fn drop_connection(&self, conn: u64) {
        self.lock().retain(|r| r.conn != conn);
    }

    /// Routes `msg` and returns the number of receivers it reached.
    fn deliver(&self, msg: &Message) -> usize {
        let mut routes = self.lock();
        routes.retain(|r| !r.tx.is_closed());

        let mut delivered = 0;
        let mut groups: HashMap<&str, Vec<&Route>> = HashMap::new();
        for route in routes
            .iter()
            .filter(|r| subject::matches(&r.pattern, &msg.subject))
        {
            match route.queue.as_deref() {
                Some(queue) => groups.entry(queue).or_default().push(route),
                None => {
                    if route.tx.send(msg.clone()).is_ok() {
                        delivered += 1;
                    }
                }
            }
        }

        let mut rng = rand::rng();
        for members in groups.values() {
            let pick = rng.random_range(0..members.len());
            if let Some(route) = members.get(pick) {
                if route.tx.send(msg.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

struct MemoryConnection {
    broker: Arc<Broker>,
    id: u64,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn shut(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.broker.drop_connection(self.id);
            self.broker.open.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn subscribe(
        &self,
        subject: &str,
        queue: Option<&str>,
    ) -> Result<MessageStream, TransportError> {
        self.ensure_open()?;
        if subject.is_empty() {
            return Err(TransportError::Subscribe {
                subject: subject.to_string(),
                reason: "empty subject".into(),
            });
        }
        let (_, rx) = self.broker.add(self.id, subject, queue);
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.ensure_open()?;
        if subject::is_wildcard(subject) {
            return Err(TransportError::Publish {
                subject: subject.to_string(),
                reason: "wildcard subjects cannot be published to".into(),
            });
        }
        self.broker.deliver(&Message {
            subject: subject.to_string(),
            reply: None,
            payload,
        });
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Message, TransportError> {
        self.ensure_open()?;
        if subject::is_wildcard(subject) {
            return Err(TransportError::Request {
                subject: subject.to_string(),
                reason: "wildcard subjects cannot be requested".into(),
            });
        }
        let inbox = format!("{INBOX_PREFIX}{}.{}", self.id, self.broker.next_id());
        let (route, mut rx) = self.broker.add(self.id, &inbox, None);

        let delivered = self.broker.deliver(&Message {
            subject: subject.to_string(),
            reply: Some(inbox),
            payload,
        });
        if delivered == 0 {
            self.broker.remove(route);
            return Err(TransportError::NoResponders {
                subject: subject.to_string(),
            });
        }

        let outcome = tokio::time::timeout(timeout, rx.recv()).await;
        self.broker.remove(route);
        match outcome {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(TransportError::Closed),
            Err(_elapsed) => Err(TransportError::Timeout {
                subject: subject.to_string(),
            }),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.shut();
        Ok(())
    }
}

impl Drop for MemoryConnection {
    fn drop(&mut self) {
        self.shut();
    }
}
