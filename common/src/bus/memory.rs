//! In-memory bus with the same topology, retry and dead-letter semantics as
//! the RabbitMQ implementation, for tests. Messages published to a queue
//! with a registered handler are delivered inline; everything is recorded so
//! tests can inspect what happened.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bytes::Bytes;

use super::{routing_key_matches, Delivery, EventBus, EventHandler, HandlerError, Topology};

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub exchange: String,
    pub routing_key: String,
    pub payload: Bytes,
}

#[derive(Default)]
struct Inner {
    /// (exchange, pattern, queue)
    bindings: Vec<(String, String, String)>,
    handlers: HashMap<String, Arc<dyn EventHandler>>,
    /// Messages delivered to queues nobody consumes (yet).
    pending: HashMap<String, Vec<Bytes>>,
    dead_letters: HashMap<String, Vec<Bytes>>,
    published: Vec<PublishedMessage>,
}

pub struct MemoryBus {
    max_retries: u32,
    inner: Mutex<Inner>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new(3)
    }
}

impl MemoryBus {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn declare(&self, topology: &Topology) {
        let mut inner = self.lock();
        for queue in &topology.queues {
            inner.pending.entry(queue.name.clone()).or_default();
            for binding in &queue.bindings {
                inner.bindings.push((
                    binding.exchange.clone(),
                    binding.pattern.clone(),
                    queue.name.clone(),
                ));
            }
        }
    }

    /// Register a handler for a queue and drain anything already waiting.
    pub async fn subscribe(&self, queue: &str, handler: Arc<dyn EventHandler>) {
        let backlog = {
            let mut inner = self.lock();
            inner.handlers.insert(queue.to_string(), handler.clone());
            inner.pending.remove(queue).unwrap_or_default()
        };

        for payload in backlog {
            self.deliver(queue, "", payload, &handler).await;
        }
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.lock().published.clone()
    }

    pub fn published_to(&self, exchange: &str, routing_key: &str) -> Vec<Bytes> {
        self.lock()
            .published
            .iter()
            .filter(|m| m.exchange == exchange && m.routing_key == routing_key)
            .map(|m| m.payload.clone())
            .collect()
    }

    pub fn dead_letters(&self, queue: &str) -> Vec<Bytes> {
        self.lock()
            .dead_letters
            .get(queue)
            .cloned()
            .unwrap_or_default()
    }

    pub fn queued(&self, queue: &str) -> Vec<Bytes> {
        self.lock().pending.get(queue).cloned().unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn deliver(
        &self,
        queue: &str,
        routing_key: &str,
        payload: Bytes,
        handler: &Arc<dyn EventHandler>,
    ) {
        for attempt in 0..=self.max_retries {
            let delivery = Delivery {
                queue: queue.to_string(),
                routing_key: routing_key.to_string(),
                payload: payload.clone(),
                retry_count: attempt,
            };

            match handler.handle(&delivery).await {
                Ok(()) => return,
                Err(HandlerError::Retry(_)) if attempt < self.max_retries => continue,
                Err(_) => break,
            }
        }

        self.lock()
            .dead_letters
            .entry(queue.to_string())
            .or_default()
            .push(payload);
    }
}

#[async_trait]
impl EventBus for MemoryBus {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: Bytes,
    ) -> anyhow::Result<()> {
        let targets: Vec<(String, Option<Arc<dyn EventHandler>>)> = {
            let mut inner = self.lock();
            inner.published.push(PublishedMessage {
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                payload: payload.clone(),
            });

            inner
                .bindings
                .iter()
                .filter(|(bound_exchange, pattern, _)| {
                    bound_exchange == exchange && routing_key_matches(pattern, routing_key)
                })
                .map(|(_, _, queue)| (queue.clone(), inner.handlers.get(queue).cloned()))
                .collect()
        };

        for (queue, handler) in targets {
            match handler {
                Some(handler) => self.deliver(&queue, routing_key, payload.clone(), &handler).await,
                None => self
                    .lock()
                    .pending
                    .entry(queue)
                    .or_default()
                    .push(payload.clone()),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    struct Counting {
        calls: AtomicU32,
        fail_times: u32,
        permanent: bool,
    }

    #[async_trait]
    impl EventHandler for Counting {
        async fn handle(&self, _delivery: &Delivery) -> Result<(), HandlerError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.permanent {
                return Err(HandlerError::reject(anyhow::anyhow!("nope")));
            }
            if call < self.fail_times {
                return Err(HandlerError::retry(anyhow::anyhow!("try again")));
            }
            Ok(())
        }
    }

    fn topology() -> Topology {
        Topology::new()
            .exchange("tweet.events")
            .queue("timeline.tweet-created", &[("tweet.events", "tweet.created")])
    }

    #[tokio::test]
    async fn delivers_to_matching_queue() {
        let bus = MemoryBus::new(3);
        bus.declare(&topology());
        let handler = Arc::new(Counting {
            calls: AtomicU32::new(0),
            fail_times: 0,
            permanent: false,
        });
        bus.subscribe("timeline.tweet-created", handler.clone()).await;

        bus.publish("tweet.events", "tweet.created", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        bus.publish("tweet.events", "tweet.liked", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(bus.dead_letters("timeline.tweet-created").is_empty());
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let bus = MemoryBus::new(3);
        bus.declare(&topology());
        let handler = Arc::new(Counting {
            calls: AtomicU32::new(0),
            fail_times: 2,
            permanent: false,
        });
        bus.subscribe("timeline.tweet-created", handler.clone()).await;

        bus.publish("tweet.events", "tweet.created", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert!(bus.dead_letters("timeline.tweet-created").is_empty());
    }

    #[tokio::test]
    async fn exhausted_retries_dead_letter() {
        let bus = MemoryBus::new(2);
        bus.declare(&topology());
        let handler = Arc::new(Counting {
            calls: AtomicU32::new(0),
            fail_times: 100,
            permanent: false,
        });
        bus.subscribe("timeline.tweet-created", handler.clone()).await;

        bus.publish("tweet.events", "tweet.created", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        // initial delivery plus two retries
        assert_eq!(handler.calls.load(Ordering::SeqCst), 3);
        assert_eq!(bus.dead_letters("timeline.tweet-created").len(), 1);
    }

    #[tokio::test]
    async fn rejects_skip_retries() {
        let bus = MemoryBus::new(5);
        bus.declare(&topology());
        let handler = Arc::new(Counting {
            calls: AtomicU32::new(0),
            fail_times: 0,
            permanent: true,
        });
        bus.subscribe("timeline.tweet-created", handler.clone()).await;

        bus.publish("tweet.events", "tweet.created", Bytes::from_static(b"{}"))
            .await
            .unwrap();

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.dead_letters("timeline.tweet-created").len(), 1);
    }

    #[tokio::test]
    async fn subscribe_drains_backlog() {
        let bus = MemoryBus::new(3);
        bus.declare(&topology());

        bus.publish("tweet.events", "tweet.created", Bytes::from_static(b"{}"))
            .await
            .unwrap();
        assert_eq!(bus.queued("timeline.tweet-created").len(), 1);

        let handler = Arc::new(Counting {
            calls: AtomicU32::new(0),
            fail_times: 0,
            permanent: false,
        });
        bus.subscribe("timeline.tweet-created", handler.clone()).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
        assert!(bus.queued("timeline.tweet-created").is_empty());
    }
}
