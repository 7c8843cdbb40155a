//! Durable topic-based publish/subscribe.
//!
//! Publishers send JSON envelopes to a topic exchange with a routing key;
//! durable queues bind to exchanges with AMQP-style key patterns and every
//! matching message is delivered to exactly one consumer, at-least-once.
//! Handlers return a typed result: retryable failures are redelivered a
//! bounded number of times, then routed to the queue's `.dlq` side channel
//! for manual inspection. Silent drops are not an option here.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;

use crate::events::Envelope;

pub mod memory;
pub mod rmq;

/// Declarative description of the exchanges, queues and bindings a service
/// needs. Both bus implementations consume the same description.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub exchanges: Vec<String>,
    pub queues: Vec<QueueDef>,
}

#[derive(Debug, Clone)]
pub struct QueueDef {
    pub name: String,
    pub bindings: Vec<Binding>,
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub exchange: String,
    pub pattern: String,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exchange(mut self, name: &str) -> Self {
        self.exchanges.push(name.to_string());
        self
    }

    pub fn queue(mut self, name: &str, bindings: &[(&str, &str)]) -> Self {
        self.queues.push(QueueDef {
            name: name.to_string(),
            bindings: bindings
                .iter()
                .map(|(exchange, pattern)| Binding {
                    exchange: exchange.to_string(),
                    pattern: pattern.to_string(),
                })
                .collect(),
        });
        self
    }
}

/// Name of the dead-letter side channel for a queue.
pub fn dead_letter_queue(queue: &str) -> String {
    format!("{queue}.dlq")
}

/// A message as seen by a consumer.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub queue: String,
    pub routing_key: String,
    pub payload: Bytes,
    /// How many times this message has already failed and been redelivered.
    pub retry_count: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The failure may go away on redelivery (collaborator timeout, store
    /// unavailable).
    #[error("retryable handler failure: {0}")]
    Retry(#[source] anyhow::Error),

    /// The message can never be processed; send it straight to the dead
    /// letter queue.
    #[error("rejected delivery: {0}")]
    Reject(#[source] anyhow::Error),
}

impl HandlerError {
    pub fn retry(err: impl Into<anyhow::Error>) -> Self {
        Self::Retry(err.into())
    }

    pub fn reject(err: impl Into<anyhow::Error>) -> Self {
        Self::Reject(err.into())
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, delivery: &Delivery) -> Result<(), HandlerError>;
}

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, exchange: &str, routing_key: &str, payload: Bytes)
        -> anyhow::Result<()>;
}

/// Serialize and publish an envelope.
pub async fn publish_event<T: Serialize + Sync>(
    bus: &dyn EventBus,
    exchange: &str,
    routing_key: &str,
    envelope: &Envelope<T>,
) -> anyhow::Result<()> {
    bus.publish(exchange, routing_key, envelope.to_bytes()?)
        .await
}

/// AMQP topic matching: `*` matches exactly one dot-separated word, `#`
/// matches zero or more.
pub fn routing_key_matches(pattern: &str, key: &str) -> bool {
    fn matches(pattern: &[&str], key: &[&str]) -> bool {
        match (pattern.first(), key.first()) {
            (None, None) => true,
            (Some(&"#"), _) => {
                matches(&pattern[1..], key) || (!key.is_empty() && matches(pattern, &key[1..]))
            }
            (Some(&"*"), Some(_)) => matches(&pattern[1..], &key[1..]),
            (Some(&word), Some(&key_word)) => word == key_word && matches(&pattern[1..], &key[1..]),
            _ => false,
        }
    }

    matches(
        &pattern.split('.').collect::<Vec<_>>(),
        &key.split('.').collect::<Vec<_>>(),
    )
}
