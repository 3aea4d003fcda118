use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Auction lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Setup,
    Active,
    Paused,
    Completed,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AuctionStatus::Setup => "setup",
            AuctionStatus::Active => "active",
            AuctionStatus::Paused => "paused",
            AuctionStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "setup" => Some(AuctionStatus::Setup),
            "active" => Some(AuctionStatus::Active),
            "paused" => Some(AuctionStatus::Paused),
            "completed" => Some(AuctionStatus::Completed),
            _ => None,
        }
    }
}

/// Player lifecycle status. Exactly one holds at any time; a player enters
/// on_block only from unsold or passed, and leaves only to sold or passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerStatus {
    Unsold,
    OnBlock,
    Sold,
    Passed,
}

impl PlayerStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PlayerStatus::Unsold => "unsold",
            PlayerStatus::OnBlock => "on_block",
            PlayerStatus::Sold => "sold",
            PlayerStatus::Passed => "passed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unsold" => Some(PlayerStatus::Unsold),
            "on_block" => Some(PlayerStatus::OnBlock),
            "sold" => Some(PlayerStatus::Sold),
            "passed" => Some(PlayerStatus::Passed),
            _ => None,
        }
    }
}

/// Player skill category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerSkill {
    Batsman,
    Bowler,
    #[serde(rename = "All-Rounder")]
    AllRounder,
    #[serde(rename = "Wicket-Keeper")]
    WicketKeeper,
}

impl PlayerSkill {
    pub fn as_str(&self) -> &str {
        match self {
            PlayerSkill::Batsman => "Batsman",
            PlayerSkill::Bowler => "Bowler",
            PlayerSkill::AllRounder => "All-Rounder",
            PlayerSkill::WicketKeeper => "Wicket-Keeper",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "Batsman" => Some(PlayerSkill::Batsman),
            "Bowler" => Some(PlayerSkill::Bowler),
            "All-Rounder" => Some(PlayerSkill::AllRounder),
            "Wicket-Keeper" => Some(PlayerSkill::WicketKeeper),
            _ => None,
        }
    }
}

/// Auction log event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Bid,
    Sold,
    Passed,
    TimerReset,
    AuctionStarted,
    AuctionPaused,
    AuctionResumed,
}

impl EventType {
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Bid => "bid",
            EventType::Sold => "sold",
            EventType::Passed => "passed",
            EventType::TimerReset => "timer_reset",
            EventType::AuctionStarted => "auction_started",
            EventType::AuctionPaused => "auction_paused",
            EventType::AuctionResumed => "auction_resumed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bid" => Some(EventType::Bid),
            "sold" => Some(EventType::Sold),
            "passed" => Some(EventType::Passed),
            "timer_reset" => Some(EventType::TimerReset),
            "auction_started" => Some(EventType::AuctionStarted),
            "auction_paused" => Some(EventType::AuctionPaused),
            "auction_resumed" => Some(EventType::AuctionResumed),
            _ => None,
        }
    }
}

/// An auction (one drafting session)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: String,
    pub name: String,
    pub status: AuctionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Auction {
    pub fn new(name: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            status: AuctionStatus::Setup,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A competing team with a fixed budget and a required squad size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub auction_id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub budget_total: i64,
    pub budget_remaining: i64,
    pub players_needed: i64,
    pub created_at: DateTime<Utc>,
}

/// A player that can be drafted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub auction_id: String,
    pub name: String,
    pub base_price: i64,
    pub skill: PlayerSkill,
    pub status: PlayerStatus,
    pub team_id: Option<String>,
    pub final_price: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Singleton lot state per auction: the player currently on the block,
/// the leading bid and the countdown timer.
///
/// current_player_id is non-null iff the timer fields are meaningful;
/// current_bidder_team_id is non-null only once a bid has been accepted.
/// paused_remaining_secs is the frozen countdown, non-null iff paused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotState {
    pub auction_id: String,
    pub current_player_id: Option<String>,
    pub current_bid: Option<i64>,
    pub current_bidder_team_id: Option<String>,
    pub timer_started_at: Option<DateTime<Utc>>,
    pub timer_ends_at: Option<DateTime<Utc>>,
    pub timer_paused: bool,
    pub paused_remaining_secs: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl LotState {
    /// Idle lot for a freshly created auction.
    pub fn idle(auction_id: String) -> Self {
        Self {
            auction_id,
            current_player_id: None,
            current_bid: None,
            current_bidder_team_id: None,
            timer_started_at: None,
            timer_ends_at: None,
            timer_paused: false,
            paused_remaining_secs: None,
            updated_at: Utc::now(),
        }
    }
}

/// An accepted bid. Append-only history; never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: String,
    pub auction_id: String,
    pub player_id: String,
    pub team_id: String,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// An append-only auction log entry, written in the same transaction as
/// the mutation it records. The id doubles as the dedup key for
/// at-least-once push delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionEvent {
    pub id: String,
    pub auction_id: String,
    pub event_type: EventType,
    pub message: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuctionEvent {
    pub fn new(
        auction_id: &str,
        event_type: EventType,
        message: String,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            auction_id: auction_id.to_string(),
            event_type,
            message,
            metadata,
            created_at: Utc::now(),
        }
    }
}

/// Read-only snapshot of one auction for dashboards
#[derive(Debug, Clone, Serialize)]
pub struct AuctionSnapshot {
    pub auction: Auction,
    pub teams: Vec<Team>,
    pub players: Vec<Player>,
    pub lot: LotState,
    pub recent_bids: Vec<Bid>,
}

/// Events pushed to WebSocket clients after every successful mutation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsServerEvent {
    AuctionUpdate {
        auction_id: String,
        event: AuctionEvent,
        snapshot: AuctionSnapshot,
    },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub port: u16,
    pub jwt_secret: String,
    pub admin_password: String,
    pub lot_duration_secs: i64,
    pub snipe_window_secs: i64,
    pub snipe_extension_secs: i64,
    pub reserve_per_player: i64,
    pub settle_poll_ms: u64,
    pub default_budget: i64,
    pub default_squad_size: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path =
            std::env::var("DATABASE_PATH").unwrap_or_else(|_| "./auctioneer.db".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .unwrap_or(3000);

        let jwt_secret = std::env::var("JWT_SECRET")
            .unwrap_or_else(|_| "dev-secret-change-in-production-minimum-32-characters".to_string());

        let admin_password =
            std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());

        let lot_duration_secs = std::env::var("LOT_DURATION_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(60);

        let snipe_window_secs = std::env::var("SNIPE_WINDOW_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(5);

        let snipe_extension_secs = std::env::var("SNIPE_EXTENSION_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(15);

        let reserve_per_player = std::env::var("RESERVE_PER_PLAYER")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v >= 0)
            .unwrap_or(5);

        let settle_poll_ms = std::env::var("SETTLE_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(200);

        let default_budget = std::env::var("DEFAULT_BUDGET")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(100);

        let default_squad_size = std::env::var("DEFAULT_SQUAD_SIZE")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(4);

        Ok(Self {
            database_path,
            port,
            jwt_secret,
            admin_password,
            lot_duration_secs,
            snipe_window_secs,
            snipe_extension_secs,
            reserve_per_player,
            settle_poll_ms,
            default_budget,
            default_squad_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips() {
        for s in ["setup", "active", "paused", "completed"] {
            assert_eq!(AuctionStatus::from_str(s).unwrap().as_str(), s);
        }
        for s in ["unsold", "on_block", "sold", "passed"] {
            assert_eq!(PlayerStatus::from_str(s).unwrap().as_str(), s);
        }
        assert!(AuctionStatus::from_str("bogus").is_none());
        assert!(PlayerStatus::from_str("bogus").is_none());
    }

    #[test]
    fn test_skill_round_trips() {
        for s in ["Batsman", "Bowler", "All-Rounder", "Wicket-Keeper"] {
            assert_eq!(PlayerSkill::from_str(s).unwrap().as_str(), s);
        }
        assert!(PlayerSkill::from_str("Coach").is_none());
    }

    #[test]
    fn test_team_password_hash_not_serialized() {
        let team = Team {
            id: "t1".to_string(),
            auction_id: "a1".to_string(),
            name: "Team 1".to_string(),
            password_hash: "secret-hash".to_string(),
            budget_total: 100,
            budget_remaining: 100,
            players_needed: 4,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&team).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(!json.contains("password_hash"));
    }

    #[test]
    fn test_idle_lot() {
        let lot = LotState::idle("a1".to_string());
        assert!(lot.current_player_id.is_none());
        assert!(lot.current_bid.is_none());
        assert!(lot.current_bidder_team_id.is_none());
        assert!(!lot.timer_paused);
        assert!(lot.paused_remaining_secs.is_none());
    }
}
