//! Auctioneer Backend Library
//!
//! Exposes core modules for use by binaries and tests.
//! Note: The API and auth layers depend on wiring in main.rs.
//! Only standalone modules are exported here.

pub mod engine;
pub mod models;
pub mod store;
