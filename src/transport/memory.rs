//! In-process topic broker.
//!
//! One [`MemoryBroker`] models one game's topic exchange. Endpoints
//! produced by [`MemoryBroker::endpoint`] share the exchange; publishes
//! fan out to every queue whose pattern matches, including the
//! publisher's own queues. Per-queue ordering is FIFO.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TransportError;

use super::{Delivery, Properties, Subscription, Transport};

const QUEUE_DEPTH: usize = 1024;

struct QueueEntry {
    patterns: Vec<Vec<String>>,
    tx: mpsc::Sender<Delivery>,
}

struct ExchangeInner {
    queues: DashMap<String, QueueEntry>,
    queue_counter: AtomicU64,
}

/// The shared exchange endpoints connect to.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<ExchangeInner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ExchangeInner {
                queues: DashMap::new(),
                queue_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Connects a new endpoint to this exchange.
    #[must_use]
    pub fn endpoint(&self) -> MemoryTransport {
        MemoryTransport {
            inner: Arc::clone(&self.inner),
            closed: Arc::new(AtomicBool::new(false)),
            owned_queues: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

/// One peer's connection to a [`MemoryBroker`].
#[derive(Clone)]
pub struct MemoryTransport {
    inner: Arc<ExchangeInner>,
    closed: Arc<AtomicBool>,
    owned_queues: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    fn declare(&self, prefix: &str, patterns: &[String]) -> Subscription {
        let seq = self.inner.queue_counter.fetch_add(1, Ordering::Relaxed);
        let queue = format!("{prefix}-{seq}-{}", Uuid::new_v4().simple());
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);

        let split = patterns
            .iter()
            .map(|p| p.split('.').map(str::to_string).collect())
            .collect();
        self.inner
            .queues
            .insert(queue.clone(), QueueEntry { patterns: split, tx });
        self.owned_queues
            .lock()
            .expect("queue list lock poisoned")
            .push(queue.clone());

        let inner = Arc::clone(&self.inner);
        let name = queue.clone();
        let closer = Box::new(move || {
            inner.queues.remove(&name);
        });
        Subscription::new(queue, rx, closer)
    }
}

/// AMQP topic-glob matching: `*` is exactly one word, `#` any tail.
fn topic_matches(pattern: &[String], topic: &[&str]) -> bool {
    match pattern.first() {
        None => topic.is_empty(),
        Some(p) if p == "#" => {
            if pattern.len() == 1 {
                return true;
            }
            (0..=topic.len()).any(|i| topic_matches(&pattern[1..], &topic[i..]))
        }
        Some(p) => match topic.first() {
            Some(t) if p == "*" || p == t => topic_matches(&pattern[1..], &topic[1..]),
            _ => false,
        },
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(
        &self,
        topic: &str,
        body: Bytes,
        props: Properties,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;

        let words: Vec<&str> = topic.split('.').collect();
        let mut targets = Vec::new();
        for entry in self.inner.queues.iter() {
            if entry
                .value()
                .patterns
                .iter()
                .any(|p| topic_matches(p, &words))
            {
                targets.push((entry.key().clone(), entry.value().tx.clone()));
            }
        }

        for (queue, tx) in targets {
            let delivery = Delivery {
                routing_key: topic.to_string(),
                body: body.clone(),
                reply_to: props.reply_to.clone(),
                correlation_id: props.correlation_id.clone(),
            };
            if tx.send(delivery).await.is_err() {
                // Consumer went away between lookup and send.
                self.inner.queues.remove(&queue);
            }
        }
        Ok(())
    }

    async fn send_direct(
        &self,
        queue: &str,
        body: Bytes,
        props: Properties,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;

        let tx = match self.inner.queues.get(queue) {
            Some(entry) => entry.value().tx.clone(),
            None => {
                return Err(TransportError::QueueGone {
                    queue: queue.to_string(),
                })
            }
        };

        let delivery = Delivery {
            routing_key: queue.to_string(),
            body,
            reply_to: props.reply_to,
            correlation_id: props.correlation_id,
        };
        tx.send(delivery)
            .await
            .map_err(|_| TransportError::QueueGone {
                queue: queue.to_string(),
            })
    }

    async fn bind(&self, patterns: &[String]) -> Result<Subscription, TransportError> {
        self.ensure_open()?;
        Ok(self.declare("q", patterns))
    }

    async fn reply_queue(&self) -> Result<Subscription, TransportError> {
        self.ensure_open()?;
        Ok(self.declare("reply", &[]))
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let owned = std::mem::take(
            &mut *self
                .owned_queues
                .lock()
                .expect("queue list lock poisoned"),
        );
        for queue in owned {
            self.inner.queues.remove(&queue);
        }
    }
}
