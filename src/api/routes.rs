//! API Routes
//! Mission: Expose every engine operation, the dashboard snapshot and the
//! realtime push channel over HTTP/WebSocket.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use bcrypt::{hash, DEFAULT_COST};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
    auth::models::{Claims, Role},
    engine::{AuctionEngine, EngineError, SettleOutcome, SettleResult},
    models::{
        Auction, AuctionEvent, AuctionSnapshot, AuctionStatus, Config, LotState, Player,
        PlayerSkill, PlayerStatus, Team, WsServerEvent,
    },
    store::AuctionDb,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<AuctionDb>,
    pub engine: Arc<AuctionEngine>,
    pub push: broadcast::Sender<WsServerEvent>,
    pub config: Config,
}

/// Create the API router (auth middleware and CORS are layered in main).
pub fn create_router(state: AppState) -> axum::Router {
    use axum::routing::{delete, post};

    axum::Router::new()
        .route("/api/auctions", post(create_auction))
        .route("/api/auctions/:id/players", post(add_player))
        .route("/api/auctions/:id/players/bulk", post(bulk_add_players))
        .route("/api/players/:id", delete(delete_player))
        .route("/api/auctions/:id/lot/start", post(start_lot))
        .route("/api/auctions/:id/bid", post(place_bid))
        .route("/api/auctions/:id/pause", post(pause_auction))
        .route("/api/auctions/:id/resume", post(resume_auction))
        .route("/api/auctions/:id/settle", post(settle_lot))
        .route("/api/auctions/:id/complete", post(complete_auction))
        .with_state(state)
}

/// Public read-only routes: snapshot, event log, WebSocket, health.
pub fn create_public_router(state: AppState) -> axum::Router {
    use axum::routing::get;

    axum::Router::new()
        .route("/health", get(health_check))
        .route("/api/auctions/:id/state", get(get_state))
        .route("/api/auctions/:id/events", get(get_events))
        .route("/ws", get(websocket_handler))
        .with_state(state)
}

// ===== Route Handlers =====

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Create an auction with its competing teams.
async fn create_auction(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateAuctionRequest>,
) -> Result<Json<AuctionSnapshot>, ApiError> {
    require_admin(&claims)?;

    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("auction name required".to_string()));
    }
    if req.teams.is_empty() {
        return Err(ApiError::BadRequest("at least one team required".to_string()));
    }

    let auction = Auction::new(req.name.trim().to_string());
    let mut teams = Vec::with_capacity(req.teams.len());
    for t in &req.teams {
        if t.name.trim().is_empty() || t.password.is_empty() {
            return Err(ApiError::BadRequest(
                "every team needs a name and a password".to_string(),
            ));
        }
        let budget = t.budget_total.unwrap_or(state.config.default_budget);
        let needed = t.players_needed.unwrap_or(state.config.default_squad_size);
        if budget <= 0 || needed <= 0 {
            return Err(ApiError::BadRequest(
                "budget and squad size must be positive".to_string(),
            ));
        }
        let password_hash = hash(&t.password, DEFAULT_COST)
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hash failed: {e}")))?;
        teams.push(Team {
            id: Uuid::new_v4().to_string(),
            auction_id: auction.id.clone(),
            name: t.name.trim().to_string(),
            password_hash,
            budget_total: budget,
            budget_remaining: budget,
            players_needed: needed,
            created_at: Utc::now(),
        });
    }

    state.db.create_auction(&auction, &teams).await?;
    tracing::info!("🏟️  Auction created: {} ({} teams)", auction.name, teams.len());

    let snapshot = state
        .db
        .snapshot(&auction.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Auction {} not found", auction.id)))?;
    Ok(Json(snapshot))
}

/// Add one player to the auction pool.
async fn add_player(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewPlayerRequest>,
) -> Result<Json<Player>, ApiError> {
    require_admin(&claims)?;
    let players = insert_players(&state, &auction_id, std::slice::from_ref(&req)).await?;
    Ok(Json(players.into_iter().next().expect("one player inserted")))
}

/// Add a batch of players in one transaction.
async fn bulk_add_players(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BulkAddPlayersRequest>,
) -> Result<Json<BulkAddResponse>, ApiError> {
    require_admin(&claims)?;
    if req.players.is_empty() {
        return Err(ApiError::BadRequest("no players given".to_string()));
    }
    let players = insert_players(&state, &auction_id, &req.players).await?;
    Ok(Json(BulkAddResponse {
        count: players.len(),
    }))
}

async fn insert_players(
    state: &AppState,
    auction_id: &str,
    reqs: &[NewPlayerRequest],
) -> Result<Vec<Player>, ApiError> {
    state
        .db
        .get_auction(auction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Auction {auction_id} not found")))?;

    let mut players = Vec::with_capacity(reqs.len());
    for r in reqs {
        if r.name.trim().is_empty() {
            return Err(ApiError::BadRequest("player name required".to_string()));
        }
        let base_price = r.base_price.unwrap_or(5);
        if base_price < 1 {
            return Err(ApiError::BadRequest(
                "base price must be at least 1".to_string(),
            ));
        }
        players.push(Player {
            id: Uuid::new_v4().to_string(),
            auction_id: auction_id.to_string(),
            name: r.name.trim().to_string(),
            base_price,
            skill: r.skill.unwrap_or(PlayerSkill::AllRounder),
            status: PlayerStatus::Unsold,
            team_id: None,
            final_price: None,
            created_at: Utc::now(),
        });
    }

    state.db.insert_players(&players).await?;
    Ok(players)
}

/// Remove a player that has not been offered yet.
async fn delete_player(
    State(state): State<AppState>,
    Path(player_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    require_admin(&claims)?;
    if state.db.delete_unsold_player(&player_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::Conflict(
            "only unsold players can be deleted".to_string(),
        ))
    }
}

/// Put a player on the block.
async fn start_lot(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<StartLotRequest>,
) -> Result<Json<LotState>, ApiError> {
    require_admin(&claims)?;
    let lot = state.engine.start_lot(&auction_id, &req.player_id).await?;
    Ok(Json(lot))
}

/// Place a bid for the live lot. Team tokens bid for themselves; the
/// auctioneer may bid on a team's behalf by naming it.
async fn place_bid(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PlaceBidRequest>,
) -> Result<Json<LotState>, ApiError> {
    let team_id = resolve_bidding_team(&claims, req.team_id.as_deref())?;
    let lot = state
        .engine
        .place_bid(
            &auction_id,
            &team_id,
            req.amount,
            req.acknowledge_reserve.unwrap_or(false),
        )
        .await?;
    Ok(Json(lot))
}

async fn pause_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<LotState>, ApiError> {
    require_admin(&claims)?;
    let lot = state.engine.pause(&auction_id).await?;
    Ok(Json(lot))
}

async fn resume_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<LotState>, ApiError> {
    require_admin(&claims)?;
    let lot = state.engine.resume(&auction_id).await?;
    Ok(Json(lot))
}

/// Conclude the lot by operator decision.
async fn settle_lot(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<SettleResult>, ApiError> {
    require_admin(&claims)?;
    let result = state.engine.settle(&auction_id, req.outcome).await?;
    Ok(Json(result))
}

/// Mark an auction completed (no players remain worth offering). The
/// engine does not enforce this; it is the auctioneer's call.
async fn complete_auction(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_admin(&claims)?;

    let lot = state
        .db
        .get_lot(&auction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Auction {auction_id} not found")))?;
    if lot.current_player_id.is_some() {
        return Err(ApiError::Conflict(
            "settle the live lot before completing the auction".to_string(),
        ));
    }

    state
        .db
        .set_auction_status(&auction_id, AuctionStatus::Completed)
        .await?;
    tracing::info!("🏁 Auction {} completed", auction_id);
    Ok(Json(json!({ "status": "completed" })))
}

/// Read-only dashboard snapshot.
async fn get_state(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
) -> Result<Json<AuctionSnapshot>, ApiError> {
    state
        .db
        .snapshot(&auction_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Auction {auction_id} not found")))
}

/// Recent auction log entries, newest first.
async fn get_events(
    State(state): State<AppState>,
    Path(auction_id): Path<String>,
    Query(params): Query<EventsQuery>,
) -> Result<Json<EventsResponse>, ApiError> {
    state
        .db
        .get_auction(&auction_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Auction {auction_id} not found")))?;

    let limit = params.limit.unwrap_or(50).min(500);
    let events = state.db.list_events(&auction_id, limit).await?;
    Ok(Json(EventsResponse {
        count: events.len(),
        events,
    }))
}

// ===== WebSocket =====

async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.auction_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, auction_id: Option<String>) {
    let mut rx = state.push.subscribe();

    // On connect, replay recent events against the current snapshot so the
    // dashboard isn't empty even if it missed live pushes.
    if let Some(id) = &auction_id {
        if let (Ok(Some(snapshot)), Ok(mut events)) = (
            state.db.snapshot(id).await,
            state.db.list_events(id, 20).await,
        ) {
            events.reverse(); // chronological
            for event in events {
                let update = WsServerEvent::AuctionUpdate {
                    auction_id: id.clone(),
                    event,
                    snapshot: snapshot.clone(),
                };
                let msg = serde_json::to_string(&update).unwrap_or_else(|_| "{}".to_string());
                if socket.send(Message::Text(msg)).await.is_err() {
                    return;
                }
            }
        }
    }

    loop {
        tokio::select! {
            // Forward committed mutations to the client
            Ok(event) = rx.recv() => {
                let WsServerEvent::AuctionUpdate { auction_id: ref event_auction, .. } = event;
                if let Some(id) = &auction_id {
                    if event_auction != id {
                        continue;
                    }
                }
                let msg = serde_json::to_string(&event)
                    .unwrap_or_else(|e| {
                        tracing::warn!("Failed to serialize ws event: {}", e);
                        "{}".to_string()
                    });
                if socket.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            // Handle incoming messages from client
            Some(Ok(msg)) = socket.recv() => {
                match msg {
                    Message::Text(text) => {
                        if text == "ping" {
                            let _ = socket.send(Message::Text("pong".to_string())).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            else => break,
        }
    }
}

// ===== Request/Response Types =====

#[derive(Debug, Deserialize)]
struct CreateAuctionRequest {
    name: String,
    teams: Vec<CreateTeamRequest>,
}

#[derive(Debug, Deserialize)]
struct CreateTeamRequest {
    name: String,
    password: String,
    budget_total: Option<i64>,
    players_needed: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NewPlayerRequest {
    name: String,
    base_price: Option<i64>,
    skill: Option<PlayerSkill>,
}

#[derive(Debug, Deserialize)]
struct BulkAddPlayersRequest {
    players: Vec<NewPlayerRequest>,
}

#[derive(Serialize)]
struct BulkAddResponse {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct StartLotRequest {
    player_id: String,
}

#[derive(Debug, Deserialize)]
struct PlaceBidRequest {
    /// Required for admin tokens, ignored unless it matches for team tokens.
    team_id: Option<String>,
    /// Omitted = canonical minimum next bid.
    amount: Option<i64>,
    acknowledge_reserve: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct SettleRequest {
    outcome: SettleOutcome,
}

#[derive(Deserialize)]
struct EventsQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct EventsResponse {
    count: usize,
    events: Vec<AuctionEvent>,
}

#[derive(Deserialize)]
struct WsQuery {
    auction_id: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ===== Role checks =====

fn require_admin(claims: &Claims) -> Result<(), ApiError> {
    if claims.role != Role::Admin {
        return Err(ApiError::Forbidden("admin access required".to_string()));
    }
    Ok(())
}

/// Which team a bid is for: team tokens bid as themselves (a mismatched
/// explicit team_id is refused), admin tokens must name the team.
fn resolve_bidding_team(claims: &Claims, body_team_id: Option<&str>) -> Result<String, ApiError> {
    match claims.role {
        Role::Team => match body_team_id {
            Some(id) if id != claims.sub => Err(ApiError::Forbidden(
                "teams can only bid for themselves".to_string(),
            )),
            _ => Ok(claims.sub.clone()),
        },
        Role::Admin => body_team_id
            .map(|s| s.to_string())
            .ok_or_else(|| ApiError::BadRequest("team_id required".to_string())),
    }
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    Engine(EngineError),
    Internal(anyhow::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Forbidden(String),
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError::Engine(err)
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Engine(EngineError::Store(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(err) => match err {
                EngineError::InvalidState(_) | EngineError::LotClosed => {
                    (StatusCode::CONFLICT, json!({ "error": err.to_string() }))
                }
                EngineError::BidRejected(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({ "error": err.to_string() }),
                ),
                EngineError::ReserveConfirmationRequired {
                    left_after,
                    reserve_needed,
                } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    json!({
                        "error": err.to_string(),
                        "confirm_required": true,
                        "left_after": left_after,
                        "reserve_needed": reserve_needed,
                    }),
                ),
                EngineError::NotFound(kind, id) => (
                    StatusCode::NOT_FOUND,
                    json!({ "error": format!("{kind} not found: {id}") }),
                ),
                EngineError::Store(e) => {
                    tracing::error!("Store error: {}", e);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": "Internal server error" }),
                    )
                }
            },
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::BidRejection;

    fn claims(sub: &str, role: Role) -> Claims {
        Claims {
            sub: sub.to_string(),
            name: sub.to_string(),
            role,
            exp: 0,
        }
    }

    #[test]
    fn test_team_token_bids_as_itself() {
        let c = claims("team-1", Role::Team);
        assert_eq!(resolve_bidding_team(&c, None).unwrap(), "team-1");
        assert_eq!(resolve_bidding_team(&c, Some("team-1")).unwrap(), "team-1");
        assert!(matches!(
            resolve_bidding_team(&c, Some("team-2")),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_token_must_name_team() {
        let c = claims("admin", Role::Admin);
        assert_eq!(resolve_bidding_team(&c, Some("team-2")).unwrap(), "team-2");
        assert!(matches!(
            resolve_bidding_team(&c, None),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&claims("admin", Role::Admin)).is_ok());
        assert!(matches!(
            require_admin(&claims("team-1", Role::Team)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn test_engine_error_status_mapping() {
        let cases = [
            (
                ApiError::Engine(EngineError::InvalidState("x".to_string())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Engine(EngineError::LotClosed),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Engine(EngineError::BidRejected(BidRejection::SelfBid)),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Engine(EngineError::ReserveConfirmationRequired {
                    left_after: 3,
                    reserve_needed: 20,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::Engine(EngineError::NotFound("team", "t9".to_string())),
                StatusCode::NOT_FOUND,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
