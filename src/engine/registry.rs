//! Slot registry: the takeover state machine and the randomness callback.
//!
//! A slot starts Vacant (no miner) and becomes Held on its first takeover;
//! after that every successful takeover is Held -> Held with the epoch
//! advanced by one. The previous holder is paid their accrued reward at the
//! moment they are displaced, never while they still hold the slot.

use crate::domain::{Address, Amount, Event, MathError, SequenceNumber, Slot, Timestamp};
use crate::engine::admin::{AdminConfig, AdminError};
use crate::engine::constants::{
    ABS_MAX_INIT_PRICE, DEFAULT_MULTIPLIER, EPOCH_PERIOD, MIN_INIT_PRICE, MULTIPLIER_DURATION,
    PRICE_MULTIPLIER,
};
use crate::engine::emission::{self, EmissionSchedule};
use crate::engine::fees::{FeeRates, FeeSplit};
use crate::engine::pricing;
use crate::engine::randomness::{FulfillmentOutcome, RandomnessCoordinator};
use crate::ledger::{LedgerError, PaymentAsset, PaymentHold, RewardToken};
use crate::oracle::{EntropyOracle, OracleError};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("miner must not be the zero address")]
    ZeroMiner,
    #[error("deadline {deadline} has passed (now {now})")]
    DeadlinePassed { deadline: Timestamp, now: Timestamp },
    #[error("slot index {index} out of bounds (capacity {capacity})")]
    IndexOutOfBounds { index: u32, capacity: u32 },
    #[error("faction {0} is not whitelisted")]
    FactionNotWhitelisted(Address),
    #[error("epoch mismatch: slot is at epoch {current}, request was for {expected}")]
    EpochMismatch { expected: u64, current: u64 },
    #[error("price {price} exceeds max price {max_price}")]
    MaxPriceExceeded { price: Amount, max_price: Amount },
    #[error("insufficient entropy fee: required {required}, attached {attached}")]
    InsufficientFee { required: Amount, attached: Amount },
    #[error("takeover is already executing")]
    Reentrancy,
    #[error("payment failed: {0}")]
    Payment(LedgerError),
    #[error("mint failed: {0}")]
    Mint(LedgerError),
    #[error("oracle request failed: {0}")]
    Oracle(OracleError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl From<OracleError> for SlotError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::InsufficientFee { required, paid } => SlotError::InsufficientFee {
                required,
                attached: paid,
            },
            other => SlotError::Oracle(other),
        }
    }
}

/// Input of one takeover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeoverRequest {
    /// Who pays.
    pub caller: Address,
    /// Who will hold the slot.
    pub miner: Address,
    pub faction: Option<Address>,
    pub index: u32,
    /// Epoch the caller observed; must match the slot's current epoch.
    pub epoch_id: u64,
    pub deadline: Timestamp,
    pub max_price: Amount,
    pub uri: String,
    /// Native value forwarded to the oracle if a refresh is due.
    pub attached_fee: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TakeoverReceipt {
    pub price: Amount,
    pub slot_index: u32,
    /// Slot state after the takeover.
    pub slot: Slot,
    pub previous_miner: Option<Address>,
    /// Reward minted to the previous miner.
    pub minted: Amount,
    /// Oracle request made for the new holder, if a refresh was due.
    pub sequence_number: Option<SequenceNumber>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FulfillmentReceipt {
    pub sequence_number: SequenceNumber,
    pub outcome: FulfillmentOutcome,
    /// Slot state after an applied draw.
    pub slot: Option<Slot>,
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminReceipt {
    pub event: Event,
}

pub struct SlotRegistry {
    address: Address,
    config: AdminConfig,
    schedule: EmissionSchedule,
    fee_rates: FeeRates,
    slots: HashMap<u32, Slot>,
    randomness: RandomnessCoordinator,
    asset: Arc<dyn PaymentAsset>,
    reward: Arc<dyn RewardToken>,
    oracle: Arc<dyn EntropyOracle>,
    total_minted: Amount,
}

impl SlotRegistry {
    /// `address` is the registry's own identity, used as the minting caller.
    pub fn new(
        address: Address,
        config: AdminConfig,
        schedule: EmissionSchedule,
        asset: Arc<dyn PaymentAsset>,
        reward: Arc<dyn RewardToken>,
        oracle: Arc<dyn EntropyOracle>,
    ) -> Self {
        Self {
            address,
            config,
            schedule,
            fee_rates: FeeRates::default(),
            slots: HashMap::new(),
            randomness: RandomnessCoordinator::new(),
            asset,
            reward,
            oracle,
            total_minted: Amount::ZERO,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn config(&self) -> &AdminConfig {
        &self.config
    }

    pub fn schedule(&self) -> &EmissionSchedule {
        &self.schedule
    }

    /// Cumulative reward minted over all completed holds.
    pub fn total_minted(&self) -> Amount {
        self.total_minted
    }

    pub fn pending_requests(&self) -> usize {
        self.randomness.pending_count()
    }

    // =========================================================================
    // Views
    // =========================================================================

    /// Slot record; never-referenced slots read as all-zero.
    pub fn slot(&self, index: u32) -> Slot {
        self.slots.get(&index).cloned().unwrap_or_default()
    }

    /// Current auction price of a slot.
    pub fn price(&self, index: u32, now: Timestamp) -> Result<Amount, MathError> {
        let slot = self.slots.get(&index);
        match slot {
            Some(slot) => pricing::price(slot.init_price, now.since(slot.start_time), EPOCH_PERIOD),
            None => Ok(Amount::ZERO),
        }
    }

    /// Global emission rate.
    pub fn ups(&self, now: Timestamp) -> Amount {
        self.schedule.global_ups(now)
    }

    pub fn multipliers(&self) -> &[Amount] {
        self.config.multipliers()
    }

    /// Oracle fee a takeover of `index` at `now` must attach; zero if no refresh is due.
    pub fn refresh_fee(&self, index: u32, now: Timestamp) -> Amount {
        if refresh_due(&self.slot(index), now) {
            self.oracle.current_fee()
        } else {
            Amount::ZERO
        }
    }

    // =========================================================================
    // Takeover
    // =========================================================================

    /// Pay the current price and take over a slot.
    ///
    /// Checks run before any effect and effects are staged until all of them
    /// succeed, so a failure leaves the registry, the ledgers and the oracle
    /// exactly as they were.
    pub fn takeover(
        &mut self,
        request: TakeoverRequest,
        now: Timestamp,
    ) -> Result<TakeoverReceipt, SlotError> {
        let index = request.index;

        if request.miner.is_zero() {
            return Err(SlotError::ZeroMiner);
        }
        if now > request.deadline {
            return Err(SlotError::DeadlinePassed {
                deadline: request.deadline,
                now,
            });
        }
        let capacity = self.config.capacity();
        if index >= capacity {
            return Err(SlotError::IndexOutOfBounds { index, capacity });
        }
        let faction = request.faction.and_then(Address::non_zero);
        if let Some(faction) = faction {
            if !self.config.is_faction(&faction) {
                return Err(SlotError::FactionNotWhitelisted(faction));
            }
        }

        let slot = self.slot(index);
        if request.epoch_id != slot.epoch_id {
            return Err(SlotError::EpochMismatch {
                expected: request.epoch_id,
                current: slot.epoch_id,
            });
        }

        let held_for = now.since(slot.start_time);
        let price = pricing::price(slot.init_price, held_for, EPOCH_PERIOD)?;
        if price > request.max_price {
            return Err(SlotError::MaxPriceExceeded {
                price,
                max_price: request.max_price,
            });
        }

        let team = self.config.team();
        let treasury = self.config.treasury();
        let transfers = if price.is_zero() {
            Vec::new()
        } else {
            FeeSplit::compute(price, team, faction, &self.fee_rates)?.transfers(
                treasury,
                team,
                faction,
                slot.miner,
            )
        };

        let next_init_price =
            pricing::next_init_price(price, PRICE_MULTIPLIER, MIN_INIT_PRICE, ABS_MAX_INIT_PRICE)?;

        let previous_miner = slot.miner.non_zero();
        let minted = match previous_miner {
            Some(_) => emission::accrued(held_for, slot.ups, slot.multiplier)?,
            None => Amount::ZERO,
        };
        let total_minted = self.total_minted.checked_add(minted)?;

        let epoch_id = slot.epoch_id.checked_add(1).ok_or(MathError::Overflow)?;
        let ups = self.schedule.slot_ups(now, capacity)?;
        let refresh = refresh_due(&slot, now);

        // Preflight collaborators.
        if refresh {
            let required = self.oracle.current_fee();
            if request.attached_fee < required {
                return Err(SlotError::InsufficientFee {
                    required,
                    attached: request.attached_fee,
                });
            }
        }
        if !price.is_zero() {
            self.asset
                .can_pay(request.caller, price)
                .map_err(SlotError::Payment)?;
        }
        if !minted.is_zero() && self.reward.minter() != self.address {
            return Err(SlotError::Mint(LedgerError::NotMinter {
                caller: self.address,
            }));
        }

        // Effects. Each fallible step is staged so a later failure can undo
        // it; nothing becomes visible until every step has succeeded.
        let hold = if transfers.is_empty() {
            None
        } else {
            let batch: Vec<(Address, Amount)> =
                transfers.iter().map(|(_, to, amount)| (*to, *amount)).collect();
            Some(
                self.asset
                    .hold(request.caller, &batch)
                    .map_err(SlotError::Payment)?,
            )
        };

        let sequence_number = if refresh {
            match self.randomness.request(
                self.oracle.as_ref(),
                index,
                epoch_id,
                request.attached_fee,
            ) {
                Ok(sequence_number) => Some(sequence_number),
                Err(e) => {
                    self.abandon(hold, None);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        if let Some(previous) = previous_miner.filter(|_| !minted.is_zero()) {
            if let Err(e) = self.reward.mint(self.address, previous, minted) {
                self.abandon(hold, sequence_number);
                return Err(SlotError::Mint(e));
            }
        }

        // Commit.
        if let Some(hold) = hold {
            self.asset.settle(hold);
        }
        if let Some(sequence_number) = sequence_number {
            self.oracle.submit(sequence_number);
        }

        let updated = Slot {
            epoch_id,
            init_price: next_init_price,
            start_time: now,
            ups,
            // A vacant slot has no draw to carry over.
            multiplier: if refresh || previous_miner.is_none() {
                DEFAULT_MULTIPLIER
            } else {
                slot.multiplier
            },
            last_multiplier_time: slot.last_multiplier_time,
            miner: request.miner,
            uri: request.uri.clone(),
        };
        self.slots.insert(index, updated.clone());
        self.total_minted = total_minted;

        let mut events: Vec<Event> = transfers
            .iter()
            .map(|(recipient, to, amount)| Event::Fee {
                slot_index: index,
                epoch_id,
                recipient: *recipient,
                to: *to,
                amount: *amount,
            })
            .collect();
        if let Some(previous) = previous_miner.filter(|_| !minted.is_zero()) {
            events.push(Event::Minted {
                slot_index: index,
                epoch_id: slot.epoch_id,
                miner: previous,
                amount: minted,
            });
        }
        events.push(Event::Takeover {
            slot_index: index,
            epoch_id,
            caller: request.caller,
            miner: request.miner,
            faction,
            price,
            uri: request.uri,
        });
        if let Some(sequence_number) = sequence_number {
            events.push(Event::MultiplierRequested {
                slot_index: index,
                epoch_id,
                sequence_number,
            });
        }

        info!(
            slot = index,
            epoch = epoch_id,
            miner = %updated.miner,
            price = %price,
            minted = %minted,
            refresh,
            "Slot taken over"
        );

        Ok(TakeoverReceipt {
            price,
            slot_index: index,
            slot: updated,
            previous_miner,
            minted,
            sequence_number,
            events,
        })
    }

    /// Undo the staged effects of a takeover that failed part way.
    fn abandon(&mut self, hold: Option<PaymentHold>, sequence_number: Option<SequenceNumber>) {
        if let Some(sequence_number) = sequence_number {
            self.randomness.cancel(sequence_number);
            self.oracle.cancel(sequence_number);
        }
        if let Some(hold) = hold {
            self.asset.release(hold);
        }
    }

    // =========================================================================
    // Randomness callback
    // =========================================================================

    /// Oracle callback. Stale and unknown deliveries are dropped silently.
    pub fn on_fulfilled(
        &mut self,
        sequence_number: SequenceNumber,
        random_bytes: &[u8],
        now: Timestamp,
    ) -> FulfillmentReceipt {
        let outcome = self.randomness.resolve(
            sequence_number,
            random_bytes,
            &mut self.slots,
            self.config.multipliers(),
            now,
        );

        match outcome {
            FulfillmentOutcome::Applied {
                slot_index,
                epoch_id,
                multiplier,
            } => {
                info!(
                    slot = slot_index,
                    epoch = epoch_id,
                    multiplier = %multiplier,
                    sequence_number,
                    "Multiplier set"
                );
                FulfillmentReceipt {
                    sequence_number,
                    outcome,
                    slot: self.slots.get(&slot_index).cloned(),
                    events: vec![Event::MultiplierSet {
                        slot_index,
                        epoch_id,
                        multiplier,
                    }],
                }
            }
            ignored => {
                debug!(sequence_number, outcome = ?ignored, "Ignoring entropy callback");
                FulfillmentReceipt {
                    sequence_number,
                    outcome,
                    slot: None,
                    events: Vec::new(),
                }
            }
        }
    }

    // =========================================================================
    // Owner setters
    // =========================================================================

    pub fn set_capacity(&mut self, caller: Address, capacity: u32) -> Result<AdminReceipt, AdminError> {
        self.admin(|config| config.set_capacity(caller, capacity))
    }

    pub fn set_multipliers(
        &mut self,
        caller: Address,
        multipliers: Vec<Amount>,
    ) -> Result<AdminReceipt, AdminError> {
        self.admin(|config| config.set_multipliers(caller, multipliers))
    }

    pub fn set_treasury(&mut self, caller: Address, treasury: Address) -> Result<AdminReceipt, AdminError> {
        self.admin(|config| config.set_treasury(caller, treasury))
    }

    pub fn set_team(&mut self, caller: Address, team: Address) -> Result<AdminReceipt, AdminError> {
        self.admin(|config| config.set_team(caller, team))
    }

    pub fn set_faction(
        &mut self,
        caller: Address,
        faction: Address,
        whitelisted: bool,
    ) -> Result<AdminReceipt, AdminError> {
        self.admin(|config| config.set_faction(caller, faction, whitelisted))
    }

    fn admin<F>(&mut self, apply: F) -> Result<AdminReceipt, AdminError>
    where
        F: FnOnce(&mut AdminConfig) -> Result<Event, AdminError>,
    {
        let event = apply(&mut self.config)?;
        info!(event = event.kind(), "Configuration updated");
        Ok(AdminReceipt { event })
    }
}

/// A refresh is due once the last fulfilled draw is older than `MULTIPLIER_DURATION`.
fn refresh_due(slot: &Slot, now: Timestamp) -> bool {
    now.since(slot.last_multiplier_time) > MULTIPLIER_DURATION
}
