//! Pure auction and emission logic plus the slot state machine built on it.

pub mod admin;
pub mod constants;
pub mod emission;
pub mod fees;
pub mod guard;
pub mod pricing;
pub mod randomness;
pub mod registry;

pub use admin::{AdminConfig, AdminError};
pub use emission::EmissionSchedule;
pub use fees::{FeeRates, FeeSplit};
pub use guard::ReentrancyGuard;
pub use randomness::{FulfillmentOutcome, PendingRequest, RandomnessCoordinator};
pub use registry::{
    AdminReceipt, FulfillmentReceipt, SlotError, SlotRegistry, TakeoverReceipt, TakeoverRequest,
};
