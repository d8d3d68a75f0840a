use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::{ClientClosed, TransportError};
use crate::runtime::Inbound;

/// Connection state changes and messages delivered by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    ConnectError { reason: String },
    Message { event: String, payload: Value },
}

/// Outbound side of the realtime channel to dispatch.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn subscribe(&self, event: &str) -> Result<(), TransportError>;

    async fn unsubscribe(&self, event: &str) -> Result<(), TransportError>;

    async fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// Emit and wait for the peer's acknowledgement payload.
    async fn emit_with_ack(&self, event: &str, payload: Value) -> Result<Value, TransportError>;
}

/// Where a transport implementation pushes inbound deliveries.
#[derive(Debug, Clone)]
pub struct TransportSink {
    tx: mpsc::Sender<Inbound>,
}

impl TransportSink {
    pub(crate) fn new(tx: mpsc::Sender<Inbound>) -> Self {
        Self { tx }
    }

    pub async fn deliver(&self, event: TransportEvent) -> Result<(), ClientClosed> {
        self.tx
            .send(Inbound::Transport(event))
            .await
            .map_err(|_| ClientClosed)
    }

    pub async fn message(&self, event: &str, payload: Value) -> Result<(), ClientClosed> {
        self.deliver(TransportEvent::Message {
            event: event.to_string(),
            payload,
        })
        .await
    }
}
