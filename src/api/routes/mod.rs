//! API Route Handlers
//!
//! Each submodule handles a specific group of endpoints.

pub mod buckets;
pub mod health;
pub mod import;
pub mod inventory;
pub mod reports;
pub mod tables;
pub mod vault;
