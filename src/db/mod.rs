//! SQLite journal of committed registry state.
//!
//! This module provides:
//! - Database initialization, pragmas and schema
//! - Repository methods for slots, pending oracle requests and events

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{Repository, StoredEvent};
