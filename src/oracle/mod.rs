//! Entropy oracle abstraction for multiplier draws.
//!
//! The registry talks to an [`EntropyOracle`] synchronously: it quotes a fee
//! and hands out a sequence number. Fulfillment happens later and elsewhere:
//! a [`Dispatcher`] drains outstanding requests into an [`EntropyBackend`],
//! and whatever random bytes come back are delivered through a
//! [`FulfillmentSink`] (in the service, the registry's callback entry point).

use crate::domain::{Amount, SequenceNumber};
use crate::ledger::lock;
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{debug, warn};

pub mod http;
pub mod local;

pub use http::HttpEntropy;
pub use local::LocalEntropy;

/// Oracle interface consumed by the registry.
pub trait EntropyOracle: Send + Sync {
    /// Fee that must accompany a request right now.
    fn current_fee(&self) -> Amount;

    /// Pay `fee_paid` and reserve a sequence number. The request is not
    /// dispatched until [`submit`](Self::submit) is called.
    fn reserve(&self, fee_paid: Amount) -> Result<SequenceNumber, OracleError>;

    /// Release a reserved request for dispatch. Unknown numbers are ignored.
    fn submit(&self, sequence_number: SequenceNumber);

    /// Drop a reserved request and refund its fee.
    fn cancel(&self, sequence_number: SequenceNumber);
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("insufficient fee: required {required}, paid {paid}")]
    InsufficientFee { required: Amount, paid: Amount },
    #[error("network error: {0}")]
    Network(String),
    #[error("http error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("oracle rejected request: {0}")]
    Rejected(String),
}

/// Random bytes delivered for a sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fulfillment {
    pub sequence_number: SequenceNumber,
    pub random_bytes: [u8; 32],
}

/// Where fulfillment of a dispatched request comes from.
#[async_trait]
pub trait EntropyBackend: Send + Sync + fmt::Debug {
    /// Forward one request. Backends that answer inline return the fulfillment;
    /// remote backends return `None` and deliver through the callback endpoint.
    async fn dispatch(
        &self,
        sequence_number: SequenceNumber,
    ) -> Result<Option<Fulfillment>, OracleError>;
}

/// Receiver of fulfillments.
#[async_trait]
pub trait FulfillmentSink: Send + Sync {
    async fn deliver(&self, fulfillment: Fulfillment);
}

/// In-process oracle front: fee quote, sequence numbers, outstanding queue.
#[derive(Debug)]
pub struct QueuedEntropy {
    fee: Mutex<Amount>,
    next_sequence: AtomicU64,
    reserved: Mutex<HashMap<SequenceNumber, Amount>>,
    outstanding: Mutex<VecDeque<SequenceNumber>>,
    notify: Notify,
    collected: Mutex<Amount>,
}

impl QueuedEntropy {
    pub fn new(fee: Amount) -> Self {
        Self {
            fee: Mutex::new(fee),
            next_sequence: AtomicU64::new(1),
            reserved: Mutex::new(HashMap::new()),
            outstanding: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            collected: Mutex::new(Amount::ZERO),
        }
    }

    pub fn set_fee(&self, fee: Amount) {
        *lock(&self.fee) = fee;
    }

    /// Total fees paid into the oracle.
    pub fn collected_fees(&self) -> Amount {
        *lock(&self.collected)
    }

    /// Take every outstanding request, oldest first.
    pub fn drain(&self) -> Vec<SequenceNumber> {
        lock(&self.outstanding).drain(..).collect()
    }

    pub fn outstanding_len(&self) -> usize {
        lock(&self.outstanding).len()
    }

    /// Requests reserved but neither submitted nor cancelled.
    pub fn reserved_len(&self) -> usize {
        lock(&self.reserved).len()
    }

    /// Reserve and submit in one step.
    pub fn request(&self, fee_paid: Amount) -> Result<SequenceNumber, OracleError> {
        let sequence_number = self.reserve(fee_paid)?;
        self.submit(sequence_number);
        Ok(sequence_number)
    }

    /// Wait until a new request is queued.
    pub async fn notified(&self) {
        self.notify.notified().await
    }
}

impl EntropyOracle for QueuedEntropy {
    fn current_fee(&self) -> Amount {
        *lock(&self.fee)
    }

    fn reserve(&self, fee_paid: Amount) -> Result<SequenceNumber, OracleError> {
        let required = self.current_fee();
        if fee_paid < required {
            return Err(OracleError::InsufficientFee {
                required,
                paid: fee_paid,
            });
        }
        let sequence_number = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        lock(&self.reserved).insert(sequence_number, fee_paid);
        Ok(sequence_number)
    }

    fn submit(&self, sequence_number: SequenceNumber) {
        let Some(fee_paid) = lock(&self.reserved).remove(&sequence_number) else {
            return;
        };
        {
            let mut collected = lock(&self.collected);
            *collected = collected.saturating_add(fee_paid);
        }
        lock(&self.outstanding).push_back(sequence_number);
        self.notify.notify_one();
    }

    fn cancel(&self, sequence_number: SequenceNumber) {
        lock(&self.reserved).remove(&sequence_number);
    }
}

/// Moves queued requests to a backend and routes inline fulfillments to a sink.
pub struct Dispatcher {
    queue: Arc<QueuedEntropy>,
    backend: Arc<dyn EntropyBackend>,
    sink: Arc<dyn FulfillmentSink>,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<QueuedEntropy>,
        backend: Arc<dyn EntropyBackend>,
        sink: Arc<dyn FulfillmentSink>,
    ) -> Self {
        Self {
            queue,
            backend,
            sink,
            concurrency: 8,
        }
    }

    /// Dispatch everything currently queued and wait for it to settle.
    pub async fn dispatch_pending(&self) -> usize {
        let batch = self.queue.drain();
        let count = batch.len();

        futures::stream::iter(batch)
            .map(|sequence_number| {
                let backend = self.backend.clone();
                let sink = self.sink.clone();
                async move {
                    match backend.dispatch(sequence_number).await {
                        Ok(Some(fulfillment)) => sink.deliver(fulfillment).await,
                        Ok(None) => debug!(sequence_number, "Entropy request forwarded"),
                        Err(e) => {
                            warn!(sequence_number, error = %e, "Entropy dispatch failed")
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<()>>()
            .await;

        count
    }

    /// Run until the task is dropped.
    pub async fn run(self) {
        loop {
            // notify_one leaves a permit when nobody waits, so a request queued
            // during dispatch is not missed.
            if self.dispatch_pending().await == 0 {
                self.queue.notified().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_requires_fee() {
        let oracle = QueuedEntropy::new(Amount::from(10u64));
        let err = oracle.request(Amount::from(9u64)).unwrap_err();
        assert_eq!(
            err,
            OracleError::InsufficientFee {
                required: Amount::from(10u64),
                paid: Amount::from(9u64),
            }
        );
        assert_eq!(oracle.outstanding_len(), 0);
    }

    #[test]
    fn test_sequence_numbers_increase_and_queue() {
        let oracle = QueuedEntropy::new(Amount::ZERO);
        let a = oracle.request(Amount::ZERO).unwrap();
        let b = oracle.request(Amount::from(3u64)).unwrap();
        assert_eq!(b, a + 1);
        assert_eq!(oracle.drain(), vec![a, b]);
        assert!(oracle.drain().is_empty());
        assert_eq!(oracle.collected_fees(), Amount::from(3u64));
    }

    #[test]
    fn test_reserved_request_is_not_dispatchable_until_submitted() {
        let oracle = QueuedEntropy::new(Amount::from(5u64));
        let kept = oracle.reserve(Amount::from(5u64)).unwrap();
        let dropped = oracle.reserve(Amount::from(7u64)).unwrap();
        assert_eq!(oracle.outstanding_len(), 0);
        assert_eq!(oracle.reserved_len(), 2);
        assert_eq!(oracle.collected_fees(), Amount::ZERO);

        oracle.cancel(dropped);
        oracle.submit(kept);
        // Submitting a cancelled request does nothing.
        oracle.submit(dropped);

        assert_eq!(oracle.reserved_len(), 0);
        assert_eq!(oracle.drain(), vec![kept]);
        assert_eq!(oracle.collected_fees(), Amount::from(5u64));
    }

    #[derive(Debug)]
    struct EchoBackend;

    #[async_trait]
    impl EntropyBackend for EchoBackend {
        async fn dispatch(
            &self,
            sequence_number: SequenceNumber,
        ) -> Result<Option<Fulfillment>, OracleError> {
            let mut random_bytes = [0u8; 32];
            random_bytes[31] = sequence_number as u8;
            Ok(Some(Fulfillment {
                sequence_number,
                random_bytes,
            }))
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        received: Mutex<Vec<Fulfillment>>,
    }

    #[async_trait]
    impl FulfillmentSink for CollectingSink {
        async fn deliver(&self, fulfillment: Fulfillment) {
            self.received.lock().unwrap().push(fulfillment);
        }
    }

    #[tokio::test]
    async fn test_dispatcher_delivers_inline_fulfillments() {
        let queue = Arc::new(QueuedEntropy::new(Amount::ZERO));
        let sink = Arc::new(CollectingSink::default());
        let dispatcher = Dispatcher::new(queue.clone(), Arc::new(EchoBackend), sink.clone());

        queue.request(Amount::ZERO).unwrap();
        queue.request(Amount::ZERO).unwrap();
        assert_eq!(dispatcher.dispatch_pending().await, 2);

        let mut received: Vec<_> = sink
            .received
            .lock()
            .unwrap()
            .iter()
            .map(|f| f.sequence_number)
            .collect();
        received.sort();
        assert_eq!(received, vec![1, 2]);
    }
}
