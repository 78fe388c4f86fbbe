//! Outstanding oracle requests and reconciliation of their callbacks.
//!
//! A request records which slot and epoch it was made for. When the callback
//! arrives the entry is removed no matter what, and the draw is applied only
//! if the slot is still held in that same epoch. A late draw never re-prices a
//! hold that has already ended.

use crate::domain::{Amount, SequenceNumber, Slot, Timestamp};
use crate::engine::constants::DEFAULT_MULTIPLIER;
use crate::oracle::{EntropyOracle, OracleError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub slot_index: u32,
    pub epoch_id: u64,
}

/// What a callback did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FulfillmentOutcome {
    Applied {
        slot_index: u32,
        epoch_id: u64,
        multiplier: Amount,
    },
    /// No pending entry for the sequence number.
    Orphaned,
    /// The slot changed hands since the request.
    Stale {
        slot_index: u32,
        requested_epoch: u64,
        current_epoch: u64,
    },
    /// The slot has no holder.
    Vacant { slot_index: u32 },
}

impl FulfillmentOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, FulfillmentOutcome::Applied { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FulfillmentOutcome::Applied { .. } => "applied",
            FulfillmentOutcome::Orphaned => "orphaned",
            FulfillmentOutcome::Stale { .. } => "stale",
            FulfillmentOutcome::Vacant { .. } => "vacant",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct RandomnessCoordinator {
    pending: HashMap<SequenceNumber, PendingRequest>,
}

impl RandomnessCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve an oracle request and remember which slot epoch the draw is for.
    /// The caller submits or cancels the reservation with the oracle.
    pub fn request(
        &mut self,
        oracle: &dyn EntropyOracle,
        slot_index: u32,
        epoch_id: u64,
        attached_fee: Amount,
    ) -> Result<SequenceNumber, OracleError> {
        let required = oracle.current_fee();
        if attached_fee < required {
            return Err(OracleError::InsufficientFee {
                required,
                paid: attached_fee,
            });
        }
        let sequence_number = oracle.reserve(required)?;
        self.pending.insert(
            sequence_number,
            PendingRequest {
                slot_index,
                epoch_id,
            },
        );
        Ok(sequence_number)
    }

    /// Drop a request whose enclosing operation was abandoned.
    pub fn cancel(&mut self, sequence_number: SequenceNumber) {
        self.pending.remove(&sequence_number);
    }

    pub fn pending(&self, sequence_number: SequenceNumber) -> Option<&PendingRequest> {
        self.pending.get(&sequence_number)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Reconcile a callback against current slot state. Never fails.
    pub fn resolve(
        &mut self,
        sequence_number: SequenceNumber,
        random_bytes: &[u8],
        slots: &mut HashMap<u32, Slot>,
        table: &[Amount],
        now: Timestamp,
    ) -> FulfillmentOutcome {
        let Some(request) = self.pending.remove(&sequence_number) else {
            return FulfillmentOutcome::Orphaned;
        };

        let Some(slot) = slots.get_mut(&request.slot_index) else {
            return FulfillmentOutcome::Vacant {
                slot_index: request.slot_index,
            };
        };
        if slot.epoch_id != request.epoch_id {
            return FulfillmentOutcome::Stale {
                slot_index: request.slot_index,
                requested_epoch: request.epoch_id,
                current_epoch: slot.epoch_id,
            };
        }
        if slot.is_vacant() {
            return FulfillmentOutcome::Vacant {
                slot_index: request.slot_index,
            };
        }

        let multiplier = select_multiplier(table, random_bytes);
        slot.multiplier = multiplier;
        slot.last_multiplier_time = now;

        FulfillmentOutcome::Applied {
            slot_index: request.slot_index,
            epoch_id: request.epoch_id,
            multiplier,
        }
    }
}

/// `table[random mod len]`, or 1x for an empty table.
pub fn select_multiplier(table: &[Amount], random_bytes: &[u8]) -> Amount {
    if table.is_empty() {
        return DEFAULT_MULTIPLIER;
    }
    let random = Amount::from_be_bytes(random_bytes);
    let len = Amount::from(table.len() as u64);
    match random.checked_rem(len) {
        Ok(index) => table[index.inner().low_u64() as usize],
        Err(_) => DEFAULT_MULTIPLIER,
    }
}
