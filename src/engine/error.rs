//! Engine error types.

use thiserror::Error;

use crate::engine::validator::BidRejection;

/// Errors surfaced by auction engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Operation is illegal in the current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The bid validator refused the bid.
    #[error("bid rejected: {0}")]
    BidRejected(#[from] BidRejection),

    /// Legal bid that dips under the advisory reserve; retry with
    /// acknowledgement to place it anyway.
    #[error("bid would leave {left_after} points, below the {reserve_needed} point reserve")]
    ReserveConfirmationRequired { left_after: i64, reserve_needed: i64 },

    /// The bid lost the race against settlement of the lot.
    #[error("lot is already closed")]
    LotClosed,

    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// Underlying persistence error; the transaction rolled back and no
    /// partial state was applied.
    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),
}
