//! # NATS transport (feature `nats`).
//!
//! Thin adapter from [`async_nats::Client`] to [`Transport`]/[`Connection`].
//! Reconnection inside one connection is left to `async-nats`; the listener
//! only sees a failure when a subscription stream ends.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use super::{Connection, Message, MessageStream, Transport};
use crate::error::TransportError;

/// Connects to a NATS cluster with `async-nats`.
#[derive(Clone, Debug, Default)]
pub struct NatsTransport {
    name: Option<String>,
}

impl NatsTransport {
    /// Creates a transport with default connect options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client name reported to the server.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn connect(&self, servers: &[String]) -> Result<Arc<dyn Connection>, TransportError> {
        let mut options = async_nats::ConnectOptions::new();
        if let Some(name) = &self.name {
            options = options.name(name.as_str());
        }
        let client = options
            .connect(servers.join(","))
            .await
            .map_err(|e| TransportError::Connect {
                reason: e.to_string(),
            })?;
        Ok(Arc::new(NatsConnection {
            client: Mutex::new(Some(client)),
        }))
    }
}

struct NatsConnection {
    client: Mutex<Option<async_nats::Client>>,
}

impl NatsConnection {
    fn client(&self) -> Result<async_nats::Client, TransportError> {
        self.client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::Closed)
    }
}

fn convert(msg: async_nats::Message) -> Message {
    Message {
        subject: msg.subject.to_string(),
        reply: msg.reply.map(|r| r.to_string()),
        payload: msg.payload,
    }
}

#[async_trait]
impl Connection for NatsConnection {
    async fn subscribe(
        &self,
        subject: &str,
        queue: Option<&str>,
    ) -> Result<MessageStream, TransportError> {
        let client = self.client()?;
        let subscriber = match queue {
            Some(queue) => {
                client
                    .queue_subscribe(subject.to_string(), queue.to_string())
                    .await
            }
            None => client.subscribe(subject.to_string()).await,
        }
        .map_err(|e| TransportError::Subscribe {
            subject: subject.to_string(),
            reason: e.to_string(),
        })?;
        Ok(subscriber.map(convert).boxed())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), TransportError> {
        self.client()?
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| TransportError::Publish {
                subject: subject.to_string(),
                reason: e.to_string(),
            })
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Message, TransportError> {
        let client = self.client()?;
        match tokio::time::timeout(timeout, client.request(subject.to_string(), payload)).await {
            Ok(Ok(msg)) => Ok(convert(msg)),
            Ok(Err(e)) if e.kind() == async_nats::RequestErrorKind::NoResponders => {
                Err(TransportError::NoResponders {
                    subject: subject.to_string(),
                })
            }
            Ok(Err(e)) => Err(TransportError::Request {
                subject: subject.to_string(),
                reason: e.to_string(),
            }),
            Err(_elapsed) => Err(TransportError::Timeout {
                subject: subject.to_string(),
            }),
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        let client = self
            .client
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match client {
            Some(client) => client.flush().await.map_err(|e| TransportError::Publish {
                subject: "flush".into(),
                reason: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}
