use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ride_client::adapters::pricing::{PriceEstimator, QuoteRequest};
use ride_client::error::{PricingError, TransportError};
use ride_client::Transport;
use serde_json::Value;

/// How the loopback answers one `emit_with_ack`.
#[derive(Debug, Clone)]
pub enum Ack {
    Reply(Value),
    /// Answer after `delay`, letting other signals arrive first.
    Delayed(Duration, Value),
    Fail(TransportError),
    /// Never answer, so the caller's ack timeout fires.
    Hang,
}

/// In-process transport that records every emit and answers acks from a
/// per-event script. Unscripted acks answer `null`.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    emitted: Mutex<Vec<(String, Value)>>,
    scripts: Mutex<HashMap<String, VecDeque<Ack>>>,
    subscribed: Mutex<Vec<String>>,
}

impl LoopbackTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, event: &str, ack: Ack) {
        self.scripts
            .lock()
            .unwrap()
            .entry(event.to_string())
            .or_default()
            .push_back(ack);
    }

    pub fn emitted(&self, event: &str) -> Vec<Value> {
        self.emitted
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub fn count(&self, event: &str) -> usize {
        self.emitted(event).len()
    }

    pub fn subscribed(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }

    fn record(&self, event: &str, payload: Value) {
        self.emitted
            .lock()
            .unwrap()
            .push((event.to_string(), payload));
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn subscribe(&self, event: &str) -> Result<(), TransportError> {
        self.subscribed.lock().unwrap().push(event.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, event: &str) -> Result<(), TransportError> {
        self.subscribed.lock().unwrap().retain(|name| name != event);
        Ok(())
    }

    async fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.record(event, payload);
        Ok(())
    }

    async fn emit_with_ack(&self, event: &str, payload: Value) -> Result<Value, TransportError> {
        self.record(event, payload);
        let ack = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(event)
            .and_then(VecDeque::pop_front);
        match ack {
            Some(Ack::Reply(value)) => Ok(value),
            Some(Ack::Delayed(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            Some(Ack::Fail(err)) => Err(err),
            Some(Ack::Hang) => std::future::pending().await,
            None => Ok(Value::Null),
        }
    }
}

/// Quotes a fixed price after a delay.
#[derive(Debug)]
pub struct SlowEstimator {
    pub delay: Duration,
    pub price: f64,
}

#[async_trait]
impl PriceEstimator for SlowEstimator {
    async fn estimate(&self, _request: &QuoteRequest) -> Result<f64, PricingError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.price)
    }
}
