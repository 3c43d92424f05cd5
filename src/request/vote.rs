//! Quorum vote, layered on the request/response primitive.
//!
//! Replies are parsed into accept/reject. The vote resolves as accepted
//! once the required quorum of accepts is in, or when the deadline passes
//! without any reject (the zero-reply case is how the first player gets
//! admitted). The first reject resolves it as rejected immediately.

use crate::transport::Delivery;

use super::Requester;

/// Final outcome of a vote round.
#[derive(Debug)]
pub enum VoteVerdict<T> {
    /// Quorum of accepts reached, or deadline hit without a reject.
    Accepted { accepts: Vec<T> },
    /// Some peer voted no; accepts collected before it are kept for
    /// diagnostics.
    Rejected { by: T, accepts: Vec<T> },
}

impl<T> VoteVerdict<T> {
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// One vote round over an in-flight request.
pub struct Vote {
    requester: Requester,
    quorum: usize,
}

impl Vote {
    /// `quorum` is the number of accepts that resolves the vote early.
    #[must_use]
    pub fn new(requester: Requester, quorum: usize) -> Self {
        Self { requester, quorum }
    }

    /// Drives the vote to its verdict. `parse` maps a reply to
    /// `(accepted, payload)`; unparseable replies are dropped and the
    /// vote keeps collecting.
    pub async fn run<T, F>(mut self, parse: F) -> VoteVerdict<T>
    where
        F: Fn(&Delivery) -> Option<(bool, T)>,
    {
        let mut accepts = Vec::new();

        loop {
            let Some(delivery) = self.requester.next_reply().await else {
                // Deadline or cancellation with no reject seen.
                self.requester.cancel();
                return VoteVerdict::Accepted { accepts };
            };

            let Some((accepted, payload)) = parse(&delivery) else {
                tracing::debug!(
                    correlation_id = %self.requester.correlation_id(),
                    "dropping unparseable vote reply"
                );
                continue;
            };

            if !accepted {
                self.requester.cancel();
                return VoteVerdict::Rejected {
                    by: payload,
                    accepts,
                };
            }

            accepts.push(payload);
            if accepts.len() >= self.quorum {
                self.requester.cancel();
                return VoteVerdict::Accepted { accepts };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestProvider;
    use crate::transport::{MemoryBroker, Properties, Transport};
    use bytes::Bytes;
    use std::time::Duration;

    async fn start_vote(broker: &MemoryBroker, quorum: usize, lifetime: Duration) -> Vote {
        let requester_side = broker.endpoint();
        let provider = RequestProvider::new("voter");
        let req = provider
            .request(
                &requester_side,
                "ask",
                Bytes::from_static(b"{}"),
                lifetime,
            )
            .await
            .unwrap();
        Vote::new(req, quorum)
    }

    fn parse(delivery: &Delivery) -> Option<(bool, String)> {
        let text = std::str::from_utf8(&delivery.body).ok()?;
        let (verdict, who) = text.split_once(':')?;
        Some((verdict == "yes", who.to_string()))
    }

    async fn reply(broker: &MemoryBroker, inbound: &Delivery, body: &str) {
        broker
            .endpoint()
            .send_direct(
                inbound.reply_to.as_deref().unwrap(),
                Bytes::from(body.to_string()),
                Properties::reply(inbound.correlation_id.clone().unwrap()),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn quorum_of_accepts_resolves_early() {
        let broker = MemoryBroker::new();
        let responder = broker.endpoint();
        let mut inbox = responder.bind(&["ask".to_string()]).await.unwrap();

        let vote = start_vote(&broker, 2, Duration::from_secs(5)).await;
        let driver = tokio::spawn(vote.run(parse));

        let inbound = inbox.recv().await.unwrap();
        reply(&broker, &inbound, "yes:a").await;
        reply(&broker, &inbound, "yes:b").await;

        match driver.await.unwrap() {
            VoteVerdict::Accepted { accepts } => assert_eq!(accepts, vec!["a", "b"]),
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn first_reject_short_circuits() {
        let broker = MemoryBroker::new();
        let responder = broker.endpoint();
        let mut inbox = responder.bind(&["ask".to_string()]).await.unwrap();

        let vote = start_vote(&broker, 3, Duration::from_secs(5)).await;
        let driver = tokio::spawn(vote.run(parse));

        let inbound = inbox.recv().await.unwrap();
        reply(&broker, &inbound, "yes:a").await;
        reply(&broker, &inbound, "no:b").await;

        match driver.await.unwrap() {
            VoteVerdict::Rejected { by, accepts } => {
                assert_eq!(by, "b");
                assert_eq!(accepts, vec!["a"]);
            }
            other => panic!("expected reject, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_without_replies_is_accepted() {
        let broker = MemoryBroker::new();
        let vote = start_vote(&broker, 3, Duration::from_millis(50)).await;
        match vote.run(parse).await {
            VoteVerdict::Accepted { accepts } => assert!(accepts.is_empty()),
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_with_partial_accepts_is_accepted() {
        let broker = MemoryBroker::new();
        let responder = broker.endpoint();
        let mut inbox = responder.bind(&["ask".to_string()]).await.unwrap();

        let vote = start_vote(&broker, 3, Duration::from_millis(150)).await;
        let driver = tokio::spawn(vote.run(parse));

        let inbound = inbox.recv().await.unwrap();
        reply(&broker, &inbound, "yes:a").await;

        match driver.await.unwrap() {
            VoteVerdict::Accepted { accepts } => assert_eq!(accepts, vec!["a"]),
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unparseable_replies_do_not_count() {
        let broker = MemoryBroker::new();
        let responder = broker.endpoint();
        let mut inbox = responder.bind(&["ask".to_string()]).await.unwrap();

        let vote = start_vote(&broker, 1, Duration::from_millis(150)).await;
        let driver = tokio::spawn(vote.run(parse));

        let inbound = inbox.recv().await.unwrap();
        reply(&broker, &inbound, "garbage").await;
        reply(&broker, &inbound, "yes:a").await;

        match driver.await.unwrap() {
            VoteVerdict::Accepted { accepts } => assert_eq!(accepts, vec!["a"]),
            other => panic!("expected accept, got {other:?}"),
        }
    }
}
