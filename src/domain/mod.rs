//! Domain types for the slot auction.
//!
//! This module provides:
//! - Fixed-point `Amount` with checked arithmetic
//! - Domain primitives: Address, Timestamp, SequenceNumber
//! - The `Slot` record and committed `Event`s

pub mod amount;
pub mod event;
pub mod primitives;
pub mod slot;

pub use amount::{Amount, AmountParseError, MathError, DECIMALS};
pub use event::{Event, FeeRecipient};
pub use primitives::{Address, AddressParseError, SequenceNumber, Timestamp};
pub use slot::{Slot, SlotState};
