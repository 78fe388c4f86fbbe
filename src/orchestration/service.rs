//! Shared entry point around the registry: locking, time, and journaling.

use crate::domain::{Address, Amount, SequenceNumber, Slot, Timestamp};
use crate::engine::{
    AdminConfig, AdminError, AdminReceipt, EmissionSchedule, FulfillmentReceipt, ReentrancyGuard,
    SlotError, SlotRegistry, TakeoverReceipt, TakeoverRequest,
};
use crate::ledger::lock;
use crate::oracle::{Fulfillment, FulfillmentSink};
use crate::orchestration::journal::Journal;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::error;

/// Source of the current time for every registry operation.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(at: Timestamp) -> Self {
        Self {
            secs: AtomicU64::new(at.as_secs()),
        }
    }

    pub fn set(&self, at: Timestamp) {
        self.secs.store(at.as_secs(), Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.secs.load(Ordering::SeqCst))
    }
}

/// Point-in-time view of a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotView {
    pub index: u32,
    pub slot: Slot,
    pub price: Amount,
    pub refresh_fee: Amount,
}

/// Copy of the admin configuration plus the emission schedule.
#[derive(Debug, Clone)]
pub struct ConfigView {
    pub config: AdminConfig,
    pub schedule: EmissionSchedule,
    pub total_minted: Amount,
    pub pending_requests: usize,
}

/// Registry behind a mutex, with the journal applied after each commit.
///
/// Registry calls never await, so the lock is never held across a
/// suspension point. Journal failures are logged and do not undo the
/// in-memory commit.
pub struct SlotService {
    registry: Mutex<SlotRegistry>,
    clock: Arc<dyn Clock>,
    journal: Option<Journal>,
}

impl SlotService {
    pub fn new(registry: SlotRegistry, clock: Arc<dyn Clock>, journal: Option<Journal>) -> Self {
        Self {
            registry: Mutex::new(registry),
            clock,
            journal,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    /// Commit a takeover in memory without journaling.
    ///
    /// Fails with [`SlotError::Reentrancy`] when called from inside another
    /// takeover on the same thread, e.g. by a collaborator during a transfer.
    pub fn execute_takeover(&self, request: TakeoverRequest) -> Result<TakeoverReceipt, SlotError> {
        let _guard = ReentrancyGuard::enter().ok_or(SlotError::Reentrancy)?;
        let now = self.now();
        lock(&self.registry).takeover(request, now)
    }

    pub async fn takeover(&self, request: TakeoverRequest) -> Result<TakeoverReceipt, SlotError> {
        let receipt = self.execute_takeover(request)?;
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_takeover(&receipt, self.now()).await {
                error!(slot = receipt.slot_index, error = %e, "Failed to journal takeover");
            }
        }
        Ok(receipt)
    }

    /// Apply an oracle delivery. Never fails.
    pub async fn fulfill(
        &self,
        sequence_number: SequenceNumber,
        random_bytes: &[u8],
    ) -> FulfillmentReceipt {
        let now = self.now();
        let receipt = lock(&self.registry).on_fulfilled(sequence_number, random_bytes, now);
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_fulfillment(&receipt, now).await {
                error!(sequence_number, error = %e, "Failed to journal fulfillment");
            }
        }
        receipt
    }

    // =========================================================================
    // Views
    // =========================================================================

    pub fn slot(&self, index: u32) -> Result<SlotView, SlotError> {
        let now = self.now();
        let registry = lock(&self.registry);
        Ok(SlotView {
            index,
            slot: registry.slot(index),
            price: registry.price(index, now)?,
            refresh_fee: registry.refresh_fee(index, now),
        })
    }

    pub fn price(&self, index: u32) -> Result<Amount, SlotError> {
        let now = self.now();
        Ok(lock(&self.registry).price(index, now)?)
    }

    pub fn refresh_fee(&self, index: u32) -> Amount {
        let now = self.now();
        lock(&self.registry).refresh_fee(index, now)
    }

    pub fn ups(&self) -> Amount {
        let now = self.now();
        lock(&self.registry).ups(now)
    }

    pub fn multipliers(&self) -> Vec<Amount> {
        lock(&self.registry).multipliers().to_vec()
    }

    pub fn config(&self) -> ConfigView {
        let registry = lock(&self.registry);
        ConfigView {
            config: registry.config().clone(),
            schedule: *registry.schedule(),
            total_minted: registry.total_minted(),
            pending_requests: registry.pending_requests(),
        }
    }

    // =========================================================================
    // Owner setters
    // =========================================================================

    pub async fn set_capacity(&self, caller: Address, capacity: u32) -> Result<AdminReceipt, AdminError> {
        let receipt = lock(&self.registry).set_capacity(caller, capacity)?;
        self.journal_admin(&receipt).await;
        Ok(receipt)
    }

    pub async fn set_multipliers(
        &self,
        caller: Address,
        multipliers: Vec<Amount>,
    ) -> Result<AdminReceipt, AdminError> {
        let receipt = lock(&self.registry).set_multipliers(caller, multipliers)?;
        self.journal_admin(&receipt).await;
        Ok(receipt)
    }

    pub async fn set_treasury(&self, caller: Address, treasury: Address) -> Result<AdminReceipt, AdminError> {
        let receipt = lock(&self.registry).set_treasury(caller, treasury)?;
        self.journal_admin(&receipt).await;
        Ok(receipt)
    }

    pub async fn set_team(&self, caller: Address, team: Address) -> Result<AdminReceipt, AdminError> {
        let receipt = lock(&self.registry).set_team(caller, team)?;
        self.journal_admin(&receipt).await;
        Ok(receipt)
    }

    pub async fn set_faction(
        &self,
        caller: Address,
        faction: Address,
        whitelisted: bool,
    ) -> Result<AdminReceipt, AdminError> {
        let receipt = lock(&self.registry).set_faction(caller, faction, whitelisted)?;
        self.journal_admin(&receipt).await;
        Ok(receipt)
    }

    async fn journal_admin(&self, receipt: &AdminReceipt) {
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_admin(receipt, self.now()).await {
                error!(event = receipt.event.kind(), error = %e, "Failed to journal config change");
            }
        }
    }
}

#[async_trait]
impl FulfillmentSink for SlotService {
    async fn deliver(&self, fulfillment: Fulfillment) {
        self.fulfill(fulfillment.sequence_number, &fulfillment.random_bytes)
            .await;
    }
}
