//! Auction Storage
//! Mission: Persist auctions, teams, players, lot state, bids and the event
//! log in SQLite, with one transaction per engine mutation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::models::{
    Auction, AuctionEvent, AuctionSnapshot, AuctionStatus, Bid, EventType, LotState, Player,
    PlayerSkill, PlayerStatus, Team,
};

/// SQLite-backed auction store.
///
/// The connection lives behind one async mutex; every write path below runs
/// as a single transaction so a failure leaves no partial state.
#[derive(Clone)]
pub struct AuctionDb {
    conn: Arc<Mutex<Connection>>,
}

impl AuctionDb {
    pub fn new(db_path: &str) -> rusqlite::Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.pragma_update(None, "synchronous", "NORMAL").ok();
        conn.pragma_update(None, "foreign_keys", "ON").ok();

        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auctions (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS teams (
                id TEXT PRIMARY KEY,
                auction_id TEXT NOT NULL REFERENCES auctions(id),
                name TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                budget_total INTEGER NOT NULL,
                budget_remaining INTEGER NOT NULL,
                players_needed INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                CHECK (budget_remaining >= 0 AND budget_remaining <= budget_total),
                CHECK (players_needed >= 0)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS players (
                id TEXT PRIMARY KEY,
                auction_id TEXT NOT NULL REFERENCES auctions(id),
                name TEXT NOT NULL,
                base_price INTEGER NOT NULL CHECK (base_price >= 1),
                skill TEXT NOT NULL,
                status TEXT NOT NULL,
                team_id TEXT,
                final_price INTEGER,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_players_auction ON players(auction_id)",
            [],
        )?;

        // One row per auction; the single-writer boundary for the live lot.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS lot_state (
                auction_id TEXT PRIMARY KEY REFERENCES auctions(id),
                current_player_id TEXT,
                current_bid INTEGER,
                current_bidder_team_id TEXT,
                timer_started_at TEXT,
                timer_ends_at TEXT,
                timer_paused INTEGER NOT NULL DEFAULT 0,
                paused_remaining_secs INTEGER,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS bids (
                id TEXT PRIMARY KEY,
                auction_id TEXT NOT NULL REFERENCES auctions(id),
                player_id TEXT NOT NULL,
                team_id TEXT NOT NULL,
                amount INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_bids_auction_created ON bids(auction_id, created_at DESC)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS auction_events (
                id TEXT PRIMARY KEY,
                auction_id TEXT NOT NULL REFERENCES auctions(id),
                event_type TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_events_auction_created ON auction_events(auction_id, created_at DESC)",
            [],
        )?;

        Ok(())
    }

    // ===== Reads =====

    pub async fn get_auction(&self, id: &str) -> rusqlite::Result<Option<Auction>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, status, created_at, updated_at FROM auctions WHERE id = ?1",
        )?;
        optional(stmt.query_row(params![id], map_auction))
    }

    pub async fn get_team(&self, id: &str) -> rusqlite::Result<Option<Team>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, name, password_hash, budget_total, budget_remaining, players_needed, created_at
             FROM teams WHERE id = ?1",
        )?;
        optional(stmt.query_row(params![id], map_team))
    }

    pub async fn get_player(&self, id: &str) -> rusqlite::Result<Option<Player>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, name, base_price, skill, status, team_id, final_price, created_at
             FROM players WHERE id = ?1",
        )?;
        optional(stmt.query_row(params![id], map_player))
    }

    pub async fn get_lot(&self, auction_id: &str) -> rusqlite::Result<Option<LotState>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT auction_id, current_player_id, current_bid, current_bidder_team_id,
                    timer_started_at, timer_ends_at, timer_paused, paused_remaining_secs, updated_at
             FROM lot_state WHERE auction_id = ?1",
        )?;
        optional(stmt.query_row(params![auction_id], map_lot))
    }

    pub async fn list_teams(&self, auction_id: &str) -> rusqlite::Result<Vec<Team>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, name, password_hash, budget_total, budget_remaining, players_needed, created_at
             FROM teams WHERE auction_id = ?1 ORDER BY name ASC",
        )?;
        let rows = stmt.query_map(params![auction_id], map_team)?;
        rows.collect()
    }

    pub async fn list_players(&self, auction_id: &str) -> rusqlite::Result<Vec<Player>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, name, base_price, skill, status, team_id, final_price, created_at
             FROM players WHERE auction_id = ?1 ORDER BY created_at ASC, name ASC",
        )?;
        let rows = stmt.query_map(params![auction_id], map_player)?;
        rows.collect()
    }

    pub async fn list_recent_bids(
        &self,
        auction_id: &str,
        limit: usize,
    ) -> rusqlite::Result<Vec<Bid>> {
        let limit = limit.clamp(1, 500) as i64;
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, player_id, team_id, amount, created_at
             FROM bids WHERE auction_id = ?1 ORDER BY created_at DESC, amount DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![auction_id, limit], map_bid)?;
        rows.collect()
    }

    pub async fn list_events(
        &self,
        auction_id: &str,
        limit: usize,
    ) -> rusqlite::Result<Vec<AuctionEvent>> {
        let limit = limit.clamp(1, 500) as i64;
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, event_type, message, metadata, created_at
             FROM auction_events WHERE auction_id = ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![auction_id, limit], map_event)?;
        rows.collect()
    }

    /// Auction ids that currently have a player on the block. Input for the
    /// settlement poller.
    pub async fn list_occupied_lots(&self) -> rusqlite::Result<Vec<LotState>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT auction_id, current_player_id, current_bid, current_bidder_team_id,
                    timer_started_at, timer_ends_at, timer_paused, paused_remaining_secs, updated_at
             FROM lot_state WHERE current_player_id IS NOT NULL",
        )?;
        let rows = stmt.query_map([], map_lot)?;
        rows.collect()
    }

    /// Full dashboard snapshot in one lock acquisition.
    pub async fn snapshot(&self, auction_id: &str) -> rusqlite::Result<Option<AuctionSnapshot>> {
        let conn = self.conn.lock().await;

        let mut stmt = conn.prepare_cached(
            "SELECT id, name, status, created_at, updated_at FROM auctions WHERE id = ?1",
        )?;
        let auction = match optional(stmt.query_row(params![auction_id], map_auction))? {
            Some(a) => a,
            None => return Ok(None),
        };

        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, name, password_hash, budget_total, budget_remaining, players_needed, created_at
             FROM teams WHERE auction_id = ?1 ORDER BY name ASC",
        )?;
        let teams = stmt
            .query_map(params![auction_id], map_team)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, name, base_price, skill, status, team_id, final_price, created_at
             FROM players WHERE auction_id = ?1 ORDER BY created_at ASC, name ASC",
        )?;
        let players = stmt
            .query_map(params![auction_id], map_player)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut stmt = conn.prepare_cached(
            "SELECT auction_id, current_player_id, current_bid, current_bidder_team_id,
                    timer_started_at, timer_ends_at, timer_paused, paused_remaining_secs, updated_at
             FROM lot_state WHERE auction_id = ?1",
        )?;
        let lot = optional(stmt.query_row(params![auction_id], map_lot))?
            .unwrap_or_else(|| LotState::idle(auction_id.to_string()));

        let mut stmt = conn.prepare_cached(
            "SELECT id, auction_id, player_id, team_id, amount, created_at
             FROM bids WHERE auction_id = ?1 ORDER BY created_at DESC, amount DESC LIMIT 10",
        )?;
        let recent_bids = stmt
            .query_map(params![auction_id], map_bid)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(AuctionSnapshot {
            auction,
            teams,
            players,
            lot,
            recent_bids,
        }))
    }

    // ===== Setup writes =====

    /// Insert an auction with its teams and an idle lot row.
    pub async fn create_auction(&self, auction: &Auction, teams: &[Team]) -> rusqlite::Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO auctions (id, name, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                auction.id,
                auction.name,
                auction.status.as_str(),
                ts(auction.created_at),
                ts(auction.updated_at),
            ],
        )?;

        for team in teams {
            tx.execute(
                "INSERT INTO teams (id, auction_id, name, password_hash, budget_total, budget_remaining, players_needed, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    team.id,
                    team.auction_id,
                    team.name,
                    team.password_hash,
                    team.budget_total,
                    team.budget_remaining,
                    team.players_needed,
                    ts(team.created_at),
                ],
            )?;
        }

        let lot = LotState::idle(auction.id.clone());
        tx.execute(
            "INSERT INTO lot_state (auction_id, current_player_id, current_bid, current_bidder_team_id,
                                    timer_started_at, timer_ends_at, timer_paused, paused_remaining_secs, updated_at)
             VALUES (?1, NULL, NULL, NULL, NULL, NULL, 0, NULL, ?2)",
            params![lot.auction_id, ts(lot.updated_at)],
        )?;

        tx.commit()
    }

    pub async fn insert_players(&self, players: &[Player]) -> rusqlite::Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        for p in players {
            tx.execute(
                "INSERT INTO players (id, auction_id, name, base_price, skill, status, team_id, final_price, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    p.id,
                    p.auction_id,
                    p.name,
                    p.base_price,
                    p.skill.as_str(),
                    p.status.as_str(),
                    p.team_id,
                    p.final_price,
                    ts(p.created_at),
                ],
            )?;
        }
        tx.commit()
    }

    /// Delete a player that has not yet been offered. Returns false if the
    /// player is missing or no longer unsold.
    pub async fn delete_unsold_player(&self, player_id: &str) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn.execute(
            "DELETE FROM players WHERE id = ?1 AND status = 'unsold'",
            params![player_id],
        )?;
        Ok(affected > 0)
    }

    pub async fn set_auction_status(
        &self,
        auction_id: &str,
        status: AuctionStatus,
    ) -> rusqlite::Result<bool> {
        let conn = self.conn.lock().await;
        let affected = conn.execute(
            "UPDATE auctions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), ts(Utc::now()), auction_id],
        )?;
        Ok(affected > 0)
    }

    // ===== Engine transactions =====
    // Each applies one lifecycle transition plus its log entry atomically.

    pub async fn apply_start_lot(
        &self,
        lot: &LotState,
        player_id: &str,
        activate_auction: bool,
        event: &AuctionEvent,
    ) -> rusqlite::Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE players SET status = 'on_block' WHERE id = ?1",
            params![player_id],
        )?;
        update_lot(&tx, lot)?;
        if activate_auction {
            tx.execute(
                "UPDATE auctions SET status = 'active', updated_at = ?1 WHERE id = ?2",
                params![ts(Utc::now()), lot.auction_id],
            )?;
        }
        insert_event(&tx, event)?;

        tx.commit()
    }

    pub async fn apply_bid(
        &self,
        bid: &Bid,
        lot: &LotState,
        events: &[AuctionEvent],
    ) -> rusqlite::Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO bids (id, auction_id, player_id, team_id, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                bid.id,
                bid.auction_id,
                bid.player_id,
                bid.team_id,
                bid.amount,
                ts(bid.created_at),
            ],
        )?;
        update_lot(&tx, lot)?;
        for event in events {
            insert_event(&tx, event)?;
        }

        tx.commit()
    }

    /// Pause or resume: lot timer fields plus the mirrored auction status.
    pub async fn apply_timer_change(
        &self,
        lot: &LotState,
        auction_status: AuctionStatus,
        event: &AuctionEvent,
    ) -> rusqlite::Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        update_lot(&tx, lot)?;
        tx.execute(
            "UPDATE auctions SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![auction_status.as_str(), ts(Utc::now()), lot.auction_id],
        )?;
        insert_event(&tx, event)?;

        tx.commit()
    }

    /// Settlement: player outcome, optional team debit, lot reset and the
    /// event, all or nothing. `restore_active` clears a mirrored paused
    /// status when the lot being settled was paused.
    pub async fn apply_settlement(
        &self,
        lot: &LotState,
        player: &Player,
        team: Option<&Team>,
        event: &AuctionEvent,
        restore_active: bool,
    ) -> rusqlite::Result<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE players SET status = ?1, team_id = ?2, final_price = ?3 WHERE id = ?4",
            params![
                player.status.as_str(),
                player.team_id,
                player.final_price,
                player.id,
            ],
        )?;
        if let Some(team) = team {
            tx.execute(
                "UPDATE teams SET budget_remaining = ?1, players_needed = ?2 WHERE id = ?3",
                params![team.budget_remaining, team.players_needed, team.id],
            )?;
        }
        update_lot(&tx, lot)?;
        if restore_active {
            tx.execute(
                "UPDATE auctions SET status = 'active', updated_at = ?1 WHERE id = ?2",
                params![ts(Utc::now()), lot.auction_id],
            )?;
        }
        insert_event(&tx, event)?;

        tx.commit()
    }
}

fn update_lot(tx: &Transaction<'_>, lot: &LotState) -> rusqlite::Result<()> {
    tx.execute(
        "UPDATE lot_state SET
            current_player_id = ?1,
            current_bid = ?2,
            current_bidder_team_id = ?3,
            timer_started_at = ?4,
            timer_ends_at = ?5,
            timer_paused = ?6,
            paused_remaining_secs = ?7,
            updated_at = ?8
         WHERE auction_id = ?9",
        params![
            lot.current_player_id,
            lot.current_bid,
            lot.current_bidder_team_id,
            lot.timer_started_at.map(ts),
            lot.timer_ends_at.map(ts),
            lot.timer_paused as i64,
            lot.paused_remaining_secs,
            ts(Utc::now()),
            lot.auction_id,
        ],
    )?;
    Ok(())
}

fn insert_event(tx: &Transaction<'_>, event: &AuctionEvent) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO auction_events (id, auction_id, event_type, message, metadata, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id,
            event.auction_id,
            event.event_type.as_str(),
            event.message,
            event.metadata.to_string(),
            ts(event.created_at),
        ],
    )?;
    Ok(())
}

// ===== Row mapping =====

fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn parse_ts(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_ts_opt(idx: usize, s: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match s {
        Some(s) => parse_ts(idx, s).map(Some),
        None => Ok(None),
    }
}

fn optional<T>(result: rusqlite::Result<T>) -> rusqlite::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn map_auction(row: &Row<'_>) -> rusqlite::Result<Auction> {
    let status: String = row.get(2)?;
    Ok(Auction {
        id: row.get(0)?,
        name: row.get(1)?,
        status: AuctionStatus::from_str(&status).unwrap_or(AuctionStatus::Setup),
        created_at: parse_ts(3, row.get(3)?)?,
        updated_at: parse_ts(4, row.get(4)?)?,
    })
}

fn map_team(row: &Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        auction_id: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        budget_total: row.get(4)?,
        budget_remaining: row.get(5)?,
        players_needed: row.get(6)?,
        created_at: parse_ts(7, row.get(7)?)?,
    })
}

fn map_player(row: &Row<'_>) -> rusqlite::Result<Player> {
    let skill: String = row.get(4)?;
    let status: String = row.get(5)?;
    Ok(Player {
        id: row.get(0)?,
        auction_id: row.get(1)?,
        name: row.get(2)?,
        base_price: row.get(3)?,
        skill: PlayerSkill::from_str(&skill).unwrap_or(PlayerSkill::AllRounder),
        status: PlayerStatus::from_str(&status).unwrap_or(PlayerStatus::Unsold),
        team_id: row.get(6)?,
        final_price: row.get(7)?,
        created_at: parse_ts(8, row.get(8)?)?,
    })
}

fn map_lot(row: &Row<'_>) -> rusqlite::Result<LotState> {
    let paused: i64 = row.get(6)?;
    Ok(LotState {
        auction_id: row.get(0)?,
        current_player_id: row.get(1)?,
        current_bid: row.get(2)?,
        current_bidder_team_id: row.get(3)?,
        timer_started_at: parse_ts_opt(4, row.get(4)?)?,
        timer_ends_at: parse_ts_opt(5, row.get(5)?)?,
        timer_paused: paused != 0,
        paused_remaining_secs: row.get(7)?,
        updated_at: parse_ts(8, row.get(8)?)?,
    })
}

fn map_bid(row: &Row<'_>) -> rusqlite::Result<Bid> {
    Ok(Bid {
        id: row.get(0)?,
        auction_id: row.get(1)?,
        player_id: row.get(2)?,
        team_id: row.get(3)?,
        amount: row.get(4)?,
        created_at: parse_ts(5, row.get(5)?)?,
    })
}

fn map_event(row: &Row<'_>) -> rusqlite::Result<AuctionEvent> {
    let event_type: String = row.get(2)?;
    let metadata: String = row.get(4)?;
    Ok(AuctionEvent {
        id: row.get(0)?,
        auction_id: row.get(1)?,
        event_type: EventType::from_str(&event_type).unwrap_or(EventType::Bid),
        message: row.get(3)?,
        metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        created_at: parse_ts(5, row.get(5)?)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use uuid::Uuid;

    fn create_test_db() -> (AuctionDb, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db = AuctionDb::new(temp_file.path().to_str().unwrap()).unwrap();
        (db, temp_file)
    }

    fn test_auction() -> Auction {
        Auction::new("Test Draft".to_string())
    }

    fn test_team(auction_id: &str, name: &str) -> Team {
        Team {
            id: Uuid::new_v4().to_string(),
            auction_id: auction_id.to_string(),
            name: name.to_string(),
            password_hash: "hash".to_string(),
            budget_total: 100,
            budget_remaining: 100,
            players_needed: 4,
            created_at: Utc::now(),
        }
    }

    fn test_player(auction_id: &str, name: &str, base_price: i64) -> Player {
        Player {
            id: Uuid::new_v4().to_string(),
            auction_id: auction_id.to_string(),
            name: name.to_string(),
            base_price,
            skill: PlayerSkill::Batsman,
            status: PlayerStatus::Unsold,
            team_id: None,
            final_price: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_auction_seeds_idle_lot() {
        let (db, _temp) = create_test_db();
        let auction = test_auction();
        let teams = vec![test_team(&auction.id, "Team A"), test_team(&auction.id, "Team B")];

        db.create_auction(&auction, &teams).await.unwrap();

        let loaded = db.get_auction(&auction.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Test Draft");
        assert_eq!(loaded.status, AuctionStatus::Setup);

        let lot = db.get_lot(&auction.id).await.unwrap().unwrap();
        assert!(lot.current_player_id.is_none());
        assert!(!lot.timer_paused);

        assert_eq!(db.list_teams(&auction.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_insert_and_delete_players() {
        let (db, _temp) = create_test_db();
        let auction = test_auction();
        db.create_auction(&auction, &[]).await.unwrap();

        let p1 = test_player(&auction.id, "Alice", 5);
        let p2 = test_player(&auction.id, "Bob", 10);
        db.insert_players(&[p1.clone(), p2.clone()]).await.unwrap();
        assert_eq!(db.list_players(&auction.id).await.unwrap().len(), 2);

        assert!(db.delete_unsold_player(&p1.id).await.unwrap());
        assert_eq!(db.list_players(&auction.id).await.unwrap().len(), 1);

        // Deleting again is a no-op.
        assert!(!db.delete_unsold_player(&p1.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_refuses_non_unsold_player() {
        let (db, _temp) = create_test_db();
        let auction = test_auction();
        db.create_auction(&auction, &[]).await.unwrap();

        let mut p = test_player(&auction.id, "Carol", 5);
        p.status = PlayerStatus::Sold;
        db.insert_players(&[p.clone()]).await.unwrap();

        assert!(!db.delete_unsold_player(&p.id).await.unwrap());
        assert_eq!(db.list_players(&auction.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_bid_writes_bid_lot_and_events_together() {
        let (db, _temp) = create_test_db();
        let auction = test_auction();
        let team = test_team(&auction.id, "Team A");
        db.create_auction(&auction, &[team.clone()]).await.unwrap();
        let player = test_player(&auction.id, "Dan", 5);
        db.insert_players(&[player.clone()]).await.unwrap();

        let mut lot = db.get_lot(&auction.id).await.unwrap().unwrap();
        lot.current_player_id = Some(player.id.clone());
        lot.current_bid = Some(6);
        lot.current_bidder_team_id = Some(team.id.clone());

        let bid = Bid {
            id: Uuid::new_v4().to_string(),
            auction_id: auction.id.clone(),
            player_id: player.id.clone(),
            team_id: team.id.clone(),
            amount: 6,
            created_at: Utc::now(),
        };
        let event = AuctionEvent::new(
            &auction.id,
            EventType::Bid,
            "Team A bid 6 points for Dan".to_string(),
            serde_json::json!({ "amount": 6 }),
        );

        db.apply_bid(&bid, &lot, &[event]).await.unwrap();

        let lot = db.get_lot(&auction.id).await.unwrap().unwrap();
        assert_eq!(lot.current_bid, Some(6));
        assert_eq!(lot.current_bidder_team_id.as_deref(), Some(team.id.as_str()));

        let bids = db.list_recent_bids(&auction.id, 10).await.unwrap();
        assert_eq!(bids.len(), 1);
        assert_eq!(bids[0].amount, 6);

        let events = db.list_events(&auction.id, 10).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Bid);
    }

    #[tokio::test]
    async fn test_snapshot_missing_auction_is_none() {
        let (db, _temp) = create_test_db();
        assert!(db.snapshot("no-such-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_contents() {
        let (db, _temp) = create_test_db();
        let auction = test_auction();
        let team = test_team(&auction.id, "Team A");
        db.create_auction(&auction, &[team]).await.unwrap();
        db.insert_players(&[test_player(&auction.id, "Eve", 5)])
            .await
            .unwrap();

        let snap = db.snapshot(&auction.id).await.unwrap().unwrap();
        assert_eq!(snap.auction.id, auction.id);
        assert_eq!(snap.teams.len(), 1);
        assert_eq!(snap.players.len(), 1);
        assert!(snap.lot.current_player_id.is_none());
        assert!(snap.recent_bids.is_empty());
    }
}
