//! Slot record and its lifecycle state.

use crate::domain::{Address, Amount, Timestamp};
use serde::{Deserialize, Serialize};

/// One auctioned slot. Created all-zero on first reference, never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    /// Replay-protection counter, +1 per successful takeover.
    pub epoch_id: u64,
    /// Auction starting price for the current round.
    pub init_price: Amount,
    /// Round start.
    pub start_time: Timestamp,
    /// Emission rate locked in at acquisition (already divided by capacity).
    pub ups: Amount,
    /// Reward multiplier locked in for the current holder.
    pub multiplier: Amount,
    /// Last randomness fulfillment, zero if never fulfilled.
    pub last_multiplier_time: Timestamp,
    /// Current holder, zero if never held.
    pub miner: Address,
    /// Opaque metadata.
    pub uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotState {
    Vacant,
    Held,
}

impl Slot {
    pub fn state(&self) -> SlotState {
        if self.miner.is_zero() {
            SlotState::Vacant
        } else {
            SlotState::Held
        }
    }

    pub fn is_vacant(&self) -> bool {
        self.state() == SlotState::Vacant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_slot_is_vacant() {
        let slot = Slot::default();
        assert_eq!(slot.state(), SlotState::Vacant);
        assert_eq!(slot.epoch_id, 0);
        assert!(slot.init_price.is_zero());
    }

    #[test]
    fn test_slot_with_miner_is_held() {
        let slot = Slot {
            miner: Address::from_low_u64(1),
            ..Default::default()
        };
        assert_eq!(slot.state(), SlotState::Held);
        assert!(!slot.is_vacant());
    }
}
