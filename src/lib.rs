pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod oracle;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Address, Amount, Event, Slot, Timestamp};
pub use engine::{SlotError, SlotRegistry, TakeoverReceipt, TakeoverRequest};
pub use error::AppError;
pub use orchestration::{Node, SlotService};
