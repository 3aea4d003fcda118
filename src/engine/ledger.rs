//! Team Ledger
//! Mission: Apply the economic effect of a settled sale to a team record.

use crate::models::Team;

/// Debit a winning team and consume one required squad slot.
///
/// The validator guarantees the amount fits the remaining budget before a
/// bid is ever accepted, so an overdraft here is a logic error upstream:
/// this asserts rather than clamping.
pub fn apply_sale(team: &mut Team, amount: i64) {
    assert!(
        amount <= team.budget_remaining,
        "sale of {} exceeds remaining budget {} for team {}",
        amount,
        team.budget_remaining,
        team.id
    );
    assert!(
        team.players_needed > 0,
        "team {} has no remaining squad slots",
        team.id
    );

    team.budget_remaining -= amount;
    team.players_needed -= 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn team(budget_remaining: i64, players_needed: i64) -> Team {
        Team {
            id: "t1".to_string(),
            auction_id: "a1".to_string(),
            name: "Team 1".to_string(),
            password_hash: "hash".to_string(),
            budget_total: 100,
            budget_remaining,
            players_needed,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_sale_debits_exactly_and_decrements_once() {
        let mut t = team(100, 4);
        apply_sale(&mut t, 37);
        assert_eq!(t.budget_remaining, 63);
        assert_eq!(t.players_needed, 3);
    }

    #[test]
    fn test_sale_may_consume_entire_budget() {
        let mut t = team(42, 1);
        apply_sale(&mut t, 42);
        assert_eq!(t.budget_remaining, 0);
        assert_eq!(t.players_needed, 0);
    }

    #[test]
    #[should_panic(expected = "exceeds remaining budget")]
    fn test_overdraft_panics() {
        let mut t = team(10, 2);
        apply_sale(&mut t, 11);
    }

    #[test]
    #[should_panic(expected = "no remaining squad slots")]
    fn test_sale_without_slots_panics() {
        let mut t = team(100, 0);
        apply_sale(&mut t, 5);
    }
}
