//! Events emitted by committed operations.

use crate::domain::{Address, Amount, SequenceNumber};
use serde::{Deserialize, Serialize};

/// Recipient class of a fee transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeRecipient {
    Treasury,
    Team,
    Faction,
    Holder,
}

impl std::fmt::Display for FeeRecipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeeRecipient::Treasury => write!(f, "treasury"),
            FeeRecipient::Team => write!(f, "team"),
            FeeRecipient::Faction => write!(f, "faction"),
            FeeRecipient::Holder => write!(f, "holder"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Event {
    Takeover {
        slot_index: u32,
        epoch_id: u64,
        caller: Address,
        miner: Address,
        faction: Option<Address>,
        price: Amount,
        uri: String,
    },
    Fee {
        slot_index: u32,
        epoch_id: u64,
        recipient: FeeRecipient,
        to: Address,
        amount: Amount,
    },
    Minted {
        slot_index: u32,
        epoch_id: u64,
        miner: Address,
        amount: Amount,
    },
    MultiplierRequested {
        slot_index: u32,
        epoch_id: u64,
        sequence_number: SequenceNumber,
    },
    MultiplierSet {
        slot_index: u32,
        epoch_id: u64,
        multiplier: Amount,
    },
    CapacitySet {
        capacity: u32,
    },
    TreasurySet {
        treasury: Address,
    },
    TeamSet {
        team: Option<Address>,
    },
    FactionSet {
        faction: Address,
        whitelisted: bool,
    },
    MultipliersSet {
        multipliers: Vec<Amount>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Takeover { .. } => "takeover",
            Event::Fee { .. } => "fee",
            Event::Minted { .. } => "minted",
            Event::MultiplierRequested { .. } => "multiplierRequested",
            Event::MultiplierSet { .. } => "multiplierSet",
            Event::CapacitySet { .. } => "capacitySet",
            Event::TreasurySet { .. } => "treasurySet",
            Event::TeamSet { .. } => "teamSet",
            Event::FactionSet { .. } => "factionSet",
            Event::MultipliersSet { .. } => "multipliersSet",
        }
    }

    /// Slot the event belongs to, `None` for configuration events.
    pub fn slot_index(&self) -> Option<u32> {
        match self {
            Event::Takeover { slot_index, .. }
            | Event::Fee { slot_index, .. }
            | Event::Minted { slot_index, .. }
            | Event::MultiplierRequested { slot_index, .. }
            | Event::MultiplierSet { slot_index, .. } => Some(*slot_index),
            _ => None,
        }
    }
}
