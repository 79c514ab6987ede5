//! Inbound connection approval.
//!
//! Every accepted transport connection is put to a [`ConnectionPolicy`]
//! before the handshake runs. A rejected connection is closed without
//! revealing this node's identity.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::peer::DeviceAddress;

/// An inbound connection waiting for a decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundRequest {
    pub address: DeviceAddress,
    pub requested_at: DateTime<Utc>,
}

impl InboundRequest {
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            requested_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait ConnectionPolicy: Send + Sync {
    /// `true` lets the handshake proceed.
    async fn approve(&self, request: &InboundRequest) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAll;

#[async_trait]
impl ConnectionPolicy for AcceptAll {
    async fn approve(&self, _request: &InboundRequest) -> bool {
        true
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RejectAll;

#[async_trait]
impl ConnectionPolicy for RejectAll {
    async fn approve(&self, _request: &InboundRequest) -> bool {
        false
    }
}

/// Decides with a synchronous closure.
pub struct CallbackPolicy {
    decide: Box<dyn Fn(&InboundRequest) -> bool + Send + Sync>,
}

impl CallbackPolicy {
    pub fn new(decide: impl Fn(&InboundRequest) -> bool + Send + Sync + 'static) -> Self {
        Self {
            decide: Box::new(decide),
        }
    }
}

#[async_trait]
impl ConnectionPolicy for CallbackPolicy {
    async fn approve(&self, request: &InboundRequest) -> bool {
        (self.decide)(request)
    }
}

impl std::fmt::Debug for CallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CallbackPolicy")
    }
}

/// A request handed to the application by [`ManualApproval`].
///
/// Dropping it unanswered rejects the connection.
#[derive(Debug)]
pub struct PendingApproval {
    pub request: InboundRequest,
    responder: oneshot::Sender<bool>,
}

impl PendingApproval {
    pub fn accept(self) {
        let _ = self.responder.send(true);
    }

    pub fn reject(self) {
        let _ = self.responder.send(false);
    }

    pub fn respond(self, approved: bool) {
        let _ = self.responder.send(approved);
    }
}

/// Forwards each request to the application and waits for its answer.
/// Requests left unanswered past the timeout are rejected.
#[derive(Debug)]
pub struct ManualApproval {
    requests: mpsc::Sender<PendingApproval>,
    timeout: Duration,
}

impl ManualApproval {
    /// The policy and the stream of requests the application must answer.
    pub fn new(timeout: Duration) -> (Self, mpsc::Receiver<PendingApproval>) {
        let (requests, rx) = mpsc::channel(32);
        (Self { requests, timeout }, rx)
    }
}

#[async_trait]
impl ConnectionPolicy for ManualApproval {
    async fn approve(&self, request: &InboundRequest) -> bool {
        let (responder, answer) = oneshot::channel();
        let pending = PendingApproval {
            request: request.clone(),
            responder,
        };
        if self.requests.send(pending).await.is_err() {
            warn!(address = %request.address, "nobody is answering approval requests");
            return false;
        }
        match tokio::time::timeout(self.timeout, answer).await {
            Ok(Ok(approved)) => approved,
            Ok(Err(_)) => false,
            Err(_) => {
                debug!(address = %request.address, "approval timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(address: &str) -> InboundRequest {
        InboundRequest::new(DeviceAddress::new(address))
    }

    #[tokio::test]
    async fn fixed_policies() {
        assert!(AcceptAll.approve(&request("mem://x")).await);
        assert!(!RejectAll.approve(&request("mem://x")).await);
    }

    #[tokio::test]
    async fn callback_sees_the_address() {
        let policy = CallbackPolicy::new(|req| req.address.as_str().ends_with("friend"));
        assert!(policy.approve(&request("mem://friend")).await);
        assert!(!policy.approve(&request("mem://stranger")).await);
    }

    // -----------------------------------------------------------------------
    // Manual approval
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn manual_accept_and_reject() {
        let (policy, mut pending) = ManualApproval::new(Duration::from_secs(1));
        let answerer = tokio::spawn(async move {
            let first = pending.recv().await.unwrap();
            assert_eq!(first.request.address.as_str(), "mem://one");
            first.accept();
            let second = pending.recv().await.unwrap();
            second.reject();
        });
        assert!(policy.approve(&request("mem://one")).await);
        assert!(!policy.approve(&request("mem://two")).await);
        answerer.await.unwrap();
    }

    #[tokio::test]
    async fn manual_times_out_to_reject() {
        let (policy, mut pending) = ManualApproval::new(Duration::from_millis(30));
        let holder = tokio::spawn(async move {
            // Hold the request without answering.
            let req = pending.recv().await;
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(req);
        });
        assert!(!policy.approve(&request("mem://slow")).await);
        holder.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_request_rejects() {
        let (policy, mut pending) = ManualApproval::new(Duration::from_secs(5));
        tokio::spawn(async move {
            drop(pending.recv().await);
        });
        assert!(!policy.approve(&request("mem://dropped")).await);
    }

    #[tokio::test]
    async fn no_listener_rejects() {
        let (policy, pending) = ManualApproval::new(Duration::from_secs(5));
        drop(pending);
        assert!(!policy.approve(&request("mem://orphan")).await);
    }
}
