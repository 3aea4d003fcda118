//! Lot Countdown Clock
//! Mission: Derive remaining time from absolute timestamps, never from
//! accumulated deltas, so arbitrary polling rates cannot drift.

use chrono::{DateTime, Utc};

use crate::models::LotState;

/// Whole seconds left on the lot's countdown at `now`.
///
/// While paused this returns the frozen remaining stored at pause time.
/// An idle lot always reads zero.
pub fn remaining(lot: &LotState, now: DateTime<Utc>) -> i64 {
    if lot.current_player_id.is_none() {
        return 0;
    }
    if lot.timer_paused {
        return lot.paused_remaining_secs.unwrap_or(0).max(0);
    }
    match lot.timer_ends_at {
        Some(ends_at) => (ends_at - now).num_seconds().max(0),
        None => 0,
    }
}

/// Anti-snipe trigger: a bid landing in the final `window_secs` of a live
/// countdown extends the deadline. Never fires on an already-expired lot.
pub fn should_extend(remaining_secs: i64, window_secs: i64) -> bool {
    remaining_secs > 0 && remaining_secs <= window_secs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn lot_with_deadline(ends_in_secs: i64, now: DateTime<Utc>) -> LotState {
        let mut lot = LotState::idle("a1".to_string());
        lot.current_player_id = Some("p1".to_string());
        lot.current_bid = Some(5);
        lot.timer_started_at = Some(now);
        lot.timer_ends_at = Some(now + Duration::seconds(ends_in_secs));
        lot
    }

    #[test]
    fn test_remaining_counts_down_from_absolute_deadline() {
        let now = Utc::now();
        let lot = lot_with_deadline(60, now);

        assert_eq!(remaining(&lot, now), 60);
        assert_eq!(remaining(&lot, now + Duration::seconds(42)), 18);
        assert_eq!(remaining(&lot, now + Duration::seconds(60)), 0);
    }

    #[test]
    fn test_remaining_clamps_at_zero_after_expiry() {
        let now = Utc::now();
        let lot = lot_with_deadline(10, now);
        assert_eq!(remaining(&lot, now + Duration::seconds(300)), 0);
    }

    #[test]
    fn test_remaining_is_poll_rate_independent() {
        let now = Utc::now();
        let lot = lot_with_deadline(30, now);

        // Sampling many times at one instant never changes the answer.
        let at = now + Duration::seconds(7);
        for _ in 0..100 {
            assert_eq!(remaining(&lot, at), 23);
        }
    }

    #[test]
    fn test_paused_lot_reads_frozen_remaining() {
        let now = Utc::now();
        let mut lot = lot_with_deadline(30, now);
        lot.timer_paused = true;
        lot.paused_remaining_secs = Some(12);

        // Wall clock keeps moving; the reading does not.
        assert_eq!(remaining(&lot, now), 12);
        assert_eq!(remaining(&lot, now + Duration::seconds(500)), 12);
    }

    #[test]
    fn test_idle_lot_reads_zero() {
        let lot = LotState::idle("a1".to_string());
        assert_eq!(remaining(&lot, Utc::now()), 0);
    }

    #[test]
    fn test_should_extend_window() {
        assert!(should_extend(1, 5));
        assert!(should_extend(5, 5));
        assert!(!should_extend(6, 5));
        assert!(!should_extend(0, 5));
        assert!(!should_extend(-1, 5));
    }
}
