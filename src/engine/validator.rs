//! Bid Validation
//! Mission: Enforce the monotonic-increment and budget rules for a
//! proposed bid, as a pure function of the current lot and team.

use serde::Serialize;
use thiserror::Error;

use crate::models::{LotState, Player, Team};

/// Why a proposed bid cannot be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BidRejection {
    #[error("no player is currently on the block")]
    NoActiveLot,

    #[error("team is already the leading bidder")]
    SelfBid,

    #[error("bid must be at least {minimum}")]
    BelowMinimum { minimum: i64 },

    #[error("insufficient budget: {remaining} points remaining")]
    InsufficientBudget { remaining: i64 },
}

/// Advisory warning attached to an otherwise-legal bid that would leave the
/// team under its reserve for remaining squad slots. Never blocks on its
/// own; callers decide whether to ask for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReserveWarning {
    pub left_after: i64,
    pub reserve_needed: i64,
}

/// Validate a proposed bid against the live lot.
///
/// Rules run in order: lot occupancy, self-bid, minimum increment, budget.
/// The minimum next bid is one point above the current bid (the lot's
/// current bid is seeded with the player's base price at start). Any amount
/// at or above the minimum is legal, not just the canonical minimum itself.
pub fn validate(
    lot: &LotState,
    player: &Player,
    team: &Team,
    proposed: i64,
    reserve_per_player: i64,
) -> Result<Option<ReserveWarning>, BidRejection> {
    if lot.current_player_id.is_none() {
        return Err(BidRejection::NoActiveLot);
    }

    if lot.current_bidder_team_id.as_deref() == Some(team.id.as_str()) {
        return Err(BidRejection::SelfBid);
    }

    let minimum = minimum_next_bid(lot, player);
    if proposed < minimum {
        return Err(BidRejection::BelowMinimum { minimum });
    }

    if proposed > team.budget_remaining {
        return Err(BidRejection::InsufficientBudget {
            remaining: team.budget_remaining,
        });
    }

    let reserve_needed = team.players_needed * reserve_per_player;
    let left_after = team.budget_remaining - proposed;
    if left_after < reserve_needed {
        return Ok(Some(ReserveWarning {
            left_after,
            reserve_needed,
        }));
    }

    Ok(None)
}

/// The lowest acceptable next bid for the lot.
pub fn minimum_next_bid(lot: &LotState, player: &Player) -> i64 {
    lot.current_bid.unwrap_or(player.base_price) + 1
}
