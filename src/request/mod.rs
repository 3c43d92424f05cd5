//! Request/response primitive.
//!
//! A [`Requester`] owns an ephemeral reply queue, a unique correlation id
//! and a deadline. It publishes one request and yields the replies that
//! match the correlation id until the deadline passes or it is cancelled.

pub mod vote;

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::TransportError;
use crate::transport::{Delivery, Properties, Subscription, Transport};

pub use vote::{Vote, VoteVerdict};

/// Builds [`Requester`]s and owns the process-scoped correlation counter.
pub struct RequestProvider {
    tag: String,
    counter: AtomicU64,
}

impl RequestProvider {
    /// `tag` disambiguates correlation ids across processes; the peer
    /// passes its clientID.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            counter: AtomicU64::new(0),
        }
    }

    fn next_correlation_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.tag)
    }

    /// Declares a reply queue, publishes one request on `topic` and
    /// returns the requester consuming correlated replies for at most
    /// `lifetime`.
    pub async fn request(
        &self,
        transport: &dyn Transport,
        topic: &str,
        body: Bytes,
        lifetime: Duration,
    ) -> Result<Requester, TransportError> {
        let reply_sub = transport.reply_queue().await?;
        let correlation_id = self.next_correlation_id();

        transport
            .publish(
                topic,
                body,
                Properties::request(reply_sub.queue(), correlation_id.clone()),
            )
            .await?;

        Ok(Requester {
            correlation_id,
            reply_sub,
            deadline: Instant::now() + lifetime,
        })
    }
}

/// One in-flight request.
pub struct Requester {
    correlation_id: String,
    reply_sub: Subscription,
    deadline: Instant,
}

impl Requester {
    #[must_use]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Next reply matching this request's correlation id. `None` once the
    /// deadline passes, the queue closes, or [`Requester::cancel`] ran.
    /// Stray deliveries with a foreign correlation id are dropped.
    pub async fn next_reply(&mut self) -> Option<Delivery> {
        loop {
            tokio::select! {
                () = tokio::time::sleep_until(self.deadline) => return None,
                delivery = self.reply_sub.recv() => {
                    let delivery = delivery?;
                    match delivery.correlation_id.as_deref() {
                        Some(id) if id == self.correlation_id => return Some(delivery),
                        other => {
                            tracing::trace!(
                                expected = %self.correlation_id,
                                got = ?other,
                                "dropping uncorrelated reply"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Cancels the timer and releases the reply queue.
    pub fn cancel(&mut self) {
        self.reply_sub.close();
    }
}
