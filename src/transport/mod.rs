//! # Message bus boundary.
//!
//! The listener only needs four things from a bus: connect to a server list,
//! subscribe to a subject (optionally inside a queue group), publish to an
//! address, and close. [`Transport`] and [`Connection`] capture exactly that;
//! `request` is provided for clients and tests.
//!
//! ## Implementations
//! - [`MemoryTransport`]: in-process broker with NATS subject semantics.
//! - `NatsTransport` (feature `nats`): adapter over `async-nats`.
//!
//! ```text
//! Transport::connect(servers) ──► Arc<dyn Connection>
//!                                   ├─ subscribe(subject, queue) ──► MessageStream
//!                                   ├─ publish(address, payload)
//!                                   ├─ request(subject, payload, timeout) ──► Message
//!                                   └─ close()
//! ```

mod memory;
#[cfg(feature = "nats")]
mod nats;
pub mod subject;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::TransportError;

pub use memory::MemoryTransport;
#[cfg(feature = "nats")]
pub use nats::NatsTransport;

/// One message delivered by a subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Resolved subject the message was published to (never a wildcard).
    pub subject: String,
    /// Reply address, for request/reply messages.
    pub reply: Option<String>,
    /// Raw payload.
    pub payload: Bytes,
}

/// Stream of messages for one subscription; ends when the subscription is closed.
pub type MessageStream = BoxStream<'static, Message>;

/// Factory for bus connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Opens a connection to one of `servers`.
    async fn connect(&self, servers: &[String]) -> Result<Arc<dyn Connection>, TransportError>;
}

/// An open bus connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Subscribes to `subject`, joining `queue` when given.
    async fn subscribe(
        &self,
        subject: &str,
        queue: Option<&str>,
    ) -> Result<MessageStream, TransportError>;

    /// Publishes `payload` to `subject` (a subject or a reply address).
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError>;

    /// Sends a request and waits up to `timeout` for the first reply.
    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Message, TransportError>;

    /// Closes the connection; every stream it produced ends. Idempotent.
    async fn close(&self) -> Result<(), TransportError>;
}
