//! In-process entropy backend for development and tests.

use super::{EntropyBackend, Fulfillment, OracleError};
use crate::domain::SequenceNumber;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

/// Answers every request itself after a fixed delay.
///
/// Random bytes are `sha256(secret || sequence_number)` with a secret drawn
/// once per process, so draws can't be predicted from the sequence number alone.
#[derive(Clone)]
pub struct LocalEntropy {
    secret: [u8; 16],
    delay: Duration,
}

impl LocalEntropy {
    pub fn new(delay: Duration) -> Self {
        Self {
            secret: *Uuid::new_v4().as_bytes(),
            delay,
        }
    }

    /// Fixed secret, for reproducible draws.
    pub fn with_secret(secret: [u8; 16], delay: Duration) -> Self {
        Self { secret, delay }
    }

    pub fn random_bytes(&self, sequence_number: SequenceNumber) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.secret);
        hasher.update(sequence_number.to_be_bytes());
        hasher.finalize().into()
    }
}

impl std::fmt::Debug for LocalEntropy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEntropy")
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EntropyBackend for LocalEntropy {
    async fn dispatch(
        &self,
        sequence_number: SequenceNumber,
    ) -> Result<Option<Fulfillment>, OracleError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(Some(Fulfillment {
            sequence_number,
            random_bytes: self.random_bytes(sequence_number),
        }))
    }
}
