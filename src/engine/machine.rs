//! Auction State Machine
//! Mission: Drive each auction's lot lifecycle (idle → on_block →
//! sold|passed → idle) under a per-auction writer lock, so bids, pauses
//! and settlement never interleave.

use chrono::{Duration, Utc};
use parking_lot::Mutex as ParkingMutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    engine::{clock, error::EngineError, ledger, validator, validator::BidRejection},
    models::{
        AuctionEvent, AuctionStatus, Bid, Config, EventType, LotState, Player, PlayerStatus, Team,
        WsServerEvent,
    },
    store::AuctionDb,
};

/// Tunables for the lot lifecycle.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub lot_duration_secs: i64,
    pub snipe_window_secs: i64,
    pub snipe_extension_secs: i64,
    pub reserve_per_player: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lot_duration_secs: 60,
            snipe_window_secs: 5,
            snipe_extension_secs: 15,
            reserve_per_player: 5,
        }
    }
}

impl EngineConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            lot_duration_secs: cfg.lot_duration_secs,
            snipe_window_secs: cfg.snipe_window_secs,
            snipe_extension_secs: cfg.snipe_extension_secs,
            reserve_per_player: cfg.reserve_per_player,
        }
    }
}

/// How a lot concludes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettleOutcome {
    Sold,
    Pass,
}

/// Result of a settlement. `settled` is false on the idempotent no-op path
/// (the lot was already idle).
#[derive(Debug, Clone, Serialize)]
pub struct SettleResult {
    pub lot: LotState,
    pub player: Option<Player>,
    pub team: Option<Team>,
    pub settled: bool,
}

/// The auction engine: one logical writer per auction.
///
/// Every mutating operation takes that auction's lock across
/// read → validate → write; the write itself is a single store
/// transaction, so failures roll back with no partial state.
pub struct AuctionEngine {
    db: Arc<AuctionDb>,
    cfg: EngineConfig,
    push: broadcast::Sender<WsServerEvent>,
    locks: ParkingMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AuctionEngine {
    pub fn new(db: Arc<AuctionDb>, cfg: EngineConfig, push: broadcast::Sender<WsServerEvent>) -> Self {
        Self {
            db,
            cfg,
            push,
            locks: ParkingMutex::new(HashMap::new()),
        }
    }

    /// The writer lock for one auction. parking_lot guards only the map
    /// lookup; the returned tokio mutex is held across the operation.
    fn lock_for(&self, auction_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks
            .entry(auction_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn load_lot(&self, auction_id: &str) -> Result<LotState, EngineError> {
        self.db
            .get_lot(auction_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("auction", auction_id.to_string()))
    }

    /// Push `{event, snapshot}` to subscribers after a committed mutation.
    /// Delivery is at-least-once; consumers dedup by event id.
    async fn publish(&self, auction_id: &str, events: &[AuctionEvent]) {
        match self.db.snapshot(auction_id).await {
            Ok(Some(snapshot)) => {
                for event in events {
                    let _ = self.push.send(WsServerEvent::AuctionUpdate {
                        auction_id: auction_id.to_string(),
                        event: event.clone(),
                        snapshot: snapshot.clone(),
                    });
                }
            }
            Ok(None) => {}
            Err(e) => warn!("snapshot for push failed: {}", e),
        }
    }

    /// Put a player on the block and start the countdown.
    pub async fn start_lot(
        &self,
        auction_id: &str,
        player_id: &str,
    ) -> Result<LotState, EngineError> {
        let lock = self.lock_for(auction_id);
        let _guard = lock.lock().await;

        let auction = self
            .db
            .get_auction(auction_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("auction", auction_id.to_string()))?;
        let mut lot = self.load_lot(auction_id).await?;
        if lot.current_player_id.is_some() {
            return Err(EngineError::InvalidState(
                "a player is already on the block".to_string(),
            ));
        }

        let player = self
            .db
            .get_player(player_id)
            .await?
            .filter(|p| p.auction_id == auction_id)
            .ok_or_else(|| EngineError::NotFound("player", player_id.to_string()))?;
        if !matches!(player.status, PlayerStatus::Unsold | PlayerStatus::Passed) {
            return Err(EngineError::InvalidState(format!(
                "player {} cannot go on the block from status {}",
                player.name,
                player.status.as_str()
            )));
        }

        let now = Utc::now();
        lot.current_player_id = Some(player.id.clone());
        lot.current_bid = Some(player.base_price);
        lot.current_bidder_team_id = None;
        lot.timer_started_at = Some(now);
        lot.timer_ends_at = Some(now + Duration::seconds(self.cfg.lot_duration_secs));
        lot.timer_paused = false;
        lot.paused_remaining_secs = None;

        let event = AuctionEvent::new(
            auction_id,
            EventType::AuctionStarted,
            format!("Auction started for {}", player.name),
            json!({ "player_id": player.id, "player_name": player.name }),
        );

        let activate = auction.status == AuctionStatus::Setup;
        self.db
            .apply_start_lot(&lot, &player.id, activate, &event)
            .await?;

        info!(
            "🔨 {}: {} on the block (base price {})",
            auction.name, player.name, player.base_price
        );
        self.publish(auction_id, &[event]).await;
        Ok(lot)
    }

    /// Accept a bid for the live lot. `amount` of None submits the
    /// canonical minimum next bid. A legal bid that dips under the advisory
    /// reserve is refused with `ReserveConfirmationRequired` until the
    /// caller resubmits with `acknowledge_reserve`.
    pub async fn place_bid(
        &self,
        auction_id: &str,
        team_id: &str,
        amount: Option<i64>,
        acknowledge_reserve: bool,
    ) -> Result<LotState, EngineError> {
        let lock = self.lock_for(auction_id);
        let _guard = lock.lock().await;

        let mut lot = self.load_lot(auction_id).await?;
        let player_id = lot
            .current_player_id
            .clone()
            .ok_or(EngineError::BidRejected(BidRejection::NoActiveLot))?;
        let player = self
            .db
            .get_player(&player_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("player", player_id.clone()))?;
        let team = self
            .db
            .get_team(team_id)
            .await?
            .filter(|t| t.auction_id == auction_id)
            .ok_or_else(|| EngineError::NotFound("team", team_id.to_string()))?;

        let now = Utc::now();
        let remaining = clock::remaining(&lot, now);
        if remaining == 0 && !lot.timer_paused {
            // Lost the race against expiry; settlement owns this lot now.
            return Err(EngineError::LotClosed);
        }

        let proposed = amount.unwrap_or_else(|| validator::minimum_next_bid(&lot, &player));
        let warning =
            validator::validate(&lot, &player, &team, proposed, self.cfg.reserve_per_player)?;
        if let Some(w) = warning {
            if !acknowledge_reserve {
                return Err(EngineError::ReserveConfirmationRequired {
                    left_after: w.left_after,
                    reserve_needed: w.reserve_needed,
                });
            }
        }

        let bid = Bid {
            id: Uuid::new_v4().to_string(),
            auction_id: auction_id.to_string(),
            player_id: player.id.clone(),
            team_id: team.id.clone(),
            amount: proposed,
            created_at: now,
        };

        lot.current_bid = Some(proposed);
        lot.current_bidder_team_id = Some(team.id.clone());

        let mut events = Vec::with_capacity(2);
        if clock::should_extend(remaining, self.cfg.snipe_window_secs) {
            if lot.timer_paused {
                // No live deadline while paused; bump the frozen remaining
                // instead, resume recomputes the deadline from it.
                lot.paused_remaining_secs = Some(self.cfg.snipe_extension_secs);
            } else {
                lot.timer_ends_at = Some(now + Duration::seconds(self.cfg.snipe_extension_secs));
            }
            events.push(AuctionEvent::new(
                auction_id,
                EventType::TimerReset,
                format!(
                    "Timer reset to {} seconds after {} bid in final {} seconds",
                    self.cfg.snipe_extension_secs, team.name, self.cfg.snipe_window_secs
                ),
                json!({ "team_id": team.id, "team_name": team.name }),
            ));
        }
        events.push(AuctionEvent::new(
            auction_id,
            EventType::Bid,
            format!("{} bid {} points for {}", team.name, proposed, player.name),
            json!({
                "team_id": team.id,
                "team_name": team.name,
                "player_id": player.id,
                "player_name": player.name,
                "amount": proposed,
            }),
        ));

        self.db.apply_bid(&bid, &lot, &events).await?;

        info!(
            "💰 {} bid {} for {} ({}s left)",
            team.name, proposed, player.name, remaining
        );
        self.publish(auction_id, &events).await;
        Ok(lot)
    }

    /// Freeze the countdown.
    pub async fn pause(&self, auction_id: &str) -> Result<LotState, EngineError> {
        let lock = self.lock_for(auction_id);
        let _guard = lock.lock().await;

        let mut lot = self.load_lot(auction_id).await?;
        if lot.current_player_id.is_none() {
            return Err(EngineError::InvalidState(
                "no player on the block".to_string(),
            ));
        }
        if lot.timer_paused {
            return Err(EngineError::InvalidState("auction already paused".to_string()));
        }

        let now = Utc::now();
        lot.paused_remaining_secs = Some(clock::remaining(&lot, now));
        lot.timer_paused = true;

        let event = AuctionEvent::new(
            auction_id,
            EventType::AuctionPaused,
            "Auction paused".to_string(),
            json!({}),
        );
        self.db
            .apply_timer_change(&lot, AuctionStatus::Paused, &event)
            .await?;

        info!("⏸️  Auction {} paused ({}s frozen)", auction_id, lot.paused_remaining_secs.unwrap_or(0));
        self.publish(auction_id, &[event]).await;
        Ok(lot)
    }

    /// Restart the countdown from the frozen remaining.
    pub async fn resume(&self, auction_id: &str) -> Result<LotState, EngineError> {
        let lock = self.lock_for(auction_id);
        let _guard = lock.lock().await;

        let mut lot = self.load_lot(auction_id).await?;
        if lot.current_player_id.is_none() {
            return Err(EngineError::InvalidState(
                "no player on the block".to_string(),
            ));
        }
        if !lot.timer_paused {
            return Err(EngineError::InvalidState("auction is not paused".to_string()));
        }

        let now = Utc::now();
        let frozen = lot.paused_remaining_secs.unwrap_or(0).max(0);
        lot.timer_ends_at = Some(now + Duration::seconds(frozen));
        lot.timer_paused = false;
        lot.paused_remaining_secs = None;

        let event = AuctionEvent::new(
            auction_id,
            EventType::AuctionResumed,
            "Auction resumed".to_string(),
            json!({}),
        );
        self.db
            .apply_timer_change(&lot, AuctionStatus::Active, &event)
            .await?;

        info!("▶️  Auction {} resumed ({}s left)", auction_id, frozen);
        self.publish(auction_id, &[event]).await;
        Ok(lot)
    }

    /// Conclude the lot: award it to the leading bidder or return the
    /// player to the pool. Settling an idle lot is an idempotent no-op.
    pub async fn settle(
        &self,
        auction_id: &str,
        outcome: SettleOutcome,
    ) -> Result<SettleResult, EngineError> {
        let lock = self.lock_for(auction_id);
        let _guard = lock.lock().await;
        self.do_settle(auction_id, outcome).await
    }

    /// Automatic settlement driven by the poller. Re-checks expiry under
    /// the writer lock: a bid that committed first extended the deadline
    /// and the lot is live again. Returns whether a settlement happened.
    pub async fn settle_expired(&self, auction_id: &str) -> Result<bool, EngineError> {
        let lock = self.lock_for(auction_id);
        let _guard = lock.lock().await;

        let lot = self.load_lot(auction_id).await?;
        if lot.current_player_id.is_none() {
            return Ok(false);
        }
        if lot.timer_paused || clock::remaining(&lot, Utc::now()) > 0 {
            return Ok(false);
        }

        let outcome = if lot.current_bidder_team_id.is_some() {
            SettleOutcome::Sold
        } else {
            SettleOutcome::Pass
        };
        let result = self.do_settle(auction_id, outcome).await?;
        Ok(result.settled)
    }

    /// Caller must hold the auction's writer lock.
    async fn do_settle(
        &self,
        auction_id: &str,
        outcome: SettleOutcome,
    ) -> Result<SettleResult, EngineError> {
        let auction = self
            .db
            .get_auction(auction_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("auction", auction_id.to_string()))?;
        let mut lot = self.load_lot(auction_id).await?;
        let Some(player_id) = lot.current_player_id.clone() else {
            // Already idle: duplicate expiry trigger or a double-submit.
            return Ok(SettleResult {
                lot,
                player: None,
                team: None,
                settled: false,
            });
        };
        let mut player = self
            .db
            .get_player(&player_id)
            .await?
            .ok_or_else(|| EngineError::NotFound("player", player_id.clone()))?;

        let (team, event) = match outcome {
            SettleOutcome::Sold => {
                let team_id = lot.current_bidder_team_id.clone().ok_or_else(|| {
                    EngineError::InvalidState("no bids placed; use pass instead".to_string())
                })?;
                let amount = lot
                    .current_bid
                    .ok_or_else(|| EngineError::InvalidState("lot has no current bid".to_string()))?;
                let mut team = self
                    .db
                    .get_team(&team_id)
                    .await?
                    .ok_or_else(|| EngineError::NotFound("team", team_id.clone()))?;

                ledger::apply_sale(&mut team, amount);
                player.status = PlayerStatus::Sold;
                player.team_id = Some(team.id.clone());
                player.final_price = Some(amount);

                let event = AuctionEvent::new(
                    auction_id,
                    EventType::Sold,
                    format!("{} sold to {} for {} points", player.name, team.name, amount),
                    json!({
                        "player_id": player.id,
                        "player_name": player.name,
                        "team_id": team.id,
                        "team_name": team.name,
                        "price": amount,
                    }),
                );
                (Some(team), event)
            }
            SettleOutcome::Pass => {
                player.status = PlayerStatus::Passed;
                player.team_id = None;
                player.final_price = None;

                let event = AuctionEvent::new(
                    auction_id,
                    EventType::Passed,
                    format!("{} passed (no bids)", player.name),
                    json!({ "player_id": player.id, "player_name": player.name }),
                );
                (None, event)
            }
        };

        lot.current_player_id = None;
        lot.current_bid = None;
        lot.current_bidder_team_id = None;
        lot.timer_started_at = None;
        lot.timer_ends_at = None;
        lot.timer_paused = false;
        lot.paused_remaining_secs = None;

        // A settle that ends a paused lot also ends the mirrored pause.
        let restore_active = auction.status == AuctionStatus::Paused;
        self.db
            .apply_settlement(&lot, &player, team.as_ref(), &event, restore_active)
            .await?;

        match &team {
            Some(t) => info!(
                "✅ {} sold to {} for {} points",
                player.name,
                t.name,
                player.final_price.unwrap_or(0)
            ),
            None => info!("❌ {} passed", player.name),
        }
        self.publish(auction_id, &[event]).await;

        Ok(SettleResult {
            lot,
            player: Some(player),
            team,
            settled: true,
        })
    }
}
