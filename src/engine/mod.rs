//! Auction Engine Module
//!
//! The core of the service:
//! 1. A pure countdown clock derived from absolute timestamps
//! 2. Bid validation (monotonic increments, budget, advisory reserve)
//! 3. The lot state machine with anti-snipe extension and settlement
//! 4. The team ledger applied atomically at settlement

pub mod clock;
pub mod error;
pub mod ledger;
pub mod machine;
pub mod validator;

pub use error::EngineError;
pub use machine::{AuctionEngine, EngineConfig, SettleOutcome, SettleResult};
pub use validator::{BidRejection, ReserveWarning};
