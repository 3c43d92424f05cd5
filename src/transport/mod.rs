//! Thin seam over a topic pub/sub broker.
//!
//! The core only assumes publish-to-topic, bind-and-consume by glob
//! pattern, and private request/reply over an ephemeral queue. Any topic
//! broker satisfying [`Transport`] works; [`memory::MemoryBroker`] is the
//! in-process implementation used by tests and local play.

pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::TransportError;

pub use memory::{MemoryBroker, MemoryTransport};

/// Publish metadata; set on requests that expect replies.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    pub reply_to: Option<String>,
    pub correlation_id: Option<String>,
}

impl Properties {
    /// Properties for a request expecting replies on `reply_to`.
    #[must_use]
    pub fn request(reply_to: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            reply_to: Some(reply_to.into()),
            correlation_id: Some(correlation_id.into()),
        }
    }

    /// Properties for a reply correlated to a request.
    #[must_use]
    pub fn reply(correlation_id: impl Into<String>) -> Self {
        Self {
            reply_to: None,
            correlation_id: Some(correlation_id.into()),
        }
    }
}

/// One consumed message.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub routing_key: String,
    pub body: Bytes,
    pub reply_to: Option<String>,
    pub correlation_id: Option<String>,
}

/// A consuming binding: an auto-delete queue plus the patterns routing
/// into it. Dropping the subscription tears the queue down.
pub struct Subscription {
    queue: String,
    receiver: mpsc::Receiver<Delivery>,
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        queue: String,
        receiver: mpsc::Receiver<Delivery>,
        closer: Box<dyn FnOnce() + Send>,
    ) -> Self {
        Self {
            queue,
            receiver,
            closer: Some(closer),
        }
    }

    /// Name of the backing queue; requests advertise it as `reply_to`.
    #[must_use]
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Next delivery in per-queue arrival order; `None` once closed.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.receiver.recv().await
    }

    /// Releases the queue. Idempotent; also runs on drop.
    pub fn close(&mut self) {
        if let Some(closer) = self.closer.take() {
            closer();
        }
        self.receiver.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// The broker operations the coordination core relies on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publishes to the game's topic exchange.
    async fn publish(
        &self,
        topic: &str,
        body: Bytes,
        props: Properties,
    ) -> Result<(), TransportError>;

    /// Publishes straight to a named queue (the reply path).
    async fn send_direct(
        &self,
        queue: &str,
        body: Bytes,
        props: Properties,
    ) -> Result<(), TransportError>;

    /// Declares an auto-delete queue bound to the given topic patterns
    /// (`*` matches one word, `#` matches any tail) and starts consuming.
    async fn bind(&self, patterns: &[String]) -> Result<Subscription, TransportError>;

    /// Declares an exclusive ephemeral queue for request replies.
    async fn reply_queue(&self) -> Result<Subscription, TransportError>;

    /// Tears the connection down; later publishes fail with
    /// [`TransportError::Closed`].
    async fn shutdown(&self);
}
