//! Auctioneer - Live Sports-Draft Auction Backend
//! Mission: Run timed player lots with anti-snipe bidding and push every
//! state change to the dashboards watching.

mod api;
mod auth;
mod engine;
mod models;
mod store;

use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::post,
    Router,
};
use chrono::Utc;
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::broadcast, time::interval};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    auth::{api as auth_api, auth_middleware, AuthState, JwtHandler},
    engine::{AuctionEngine, EngineConfig},
    models::{Config, WsServerEvent},
    store::AuctionDb,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing();

    info!("🔨 Auctioneer starting");
    if config.admin_password == "admin123" {
        warn!("⚠️  Default admin password in use - CHANGE IT IN PRODUCTION!");
    }

    let db = Arc::new(
        AuctionDb::new(&config.database_path).context("Failed to open auction database")?,
    );
    info!("📊 Database initialized at: {}", config.database_path);

    // Broadcast channel feeding every connected WebSocket client.
    let (push_tx, _push_rx) = broadcast::channel::<WsServerEvent>(1000);

    let engine = Arc::new(AuctionEngine::new(
        db.clone(),
        EngineConfig::from_config(&config),
        push_tx.clone(),
    ));

    let jwt_handler = Arc::new(JwtHandler::new(config.jwt_secret.clone()));
    let auth_state = AuthState::new(db.clone(), jwt_handler.clone(), config.admin_password.clone());

    let app_state = api::AppState {
        db: db.clone(),
        engine: engine.clone(),
        push: push_tx,
        config: config.clone(),
    };

    // The only background mutator: automatic settlement on timer expiry.
    tokio::spawn(settlement_polling(
        engine,
        db,
        config.settle_poll_ms,
    ));

    let auth_router = Router::new()
        .route("/api/auth/team-login", post(auth_api::team_login))
        .route("/api/auth/admin-login", post(auth_api::admin_login))
        .with_state(auth_state);

    // Mutating routes sit behind JWT validation.
    let protected_routes = api::create_router(app_state.clone()).route_layer(
        middleware::from_fn_with_state(jwt_handler, auth_middleware),
    );

    // Snapshot, event log, WebSocket and health stay public.
    let public_routes = api::create_public_router(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(auth_router)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Poll occupied lots and settle the ones whose countdown hit zero
/// unpaused: sold to the leader if one exists, passed otherwise.
///
/// `settle_expired` re-checks expiry under the per-auction writer lock, so
/// a bid racing this poller either extends the deadline first or loses
/// with `LotClosed` - never both.
async fn settlement_polling(
    engine: Arc<AuctionEngine>,
    db: Arc<AuctionDb>,
    poll_ms: u64,
) -> Result<()> {
    info!("⏱️  Settlement poller started ({}ms cadence)", poll_ms);

    let mut ticker = interval(Duration::from_millis(poll_ms));
    loop {
        ticker.tick().await;

        let lots = match db.list_occupied_lots().await {
            Ok(lots) => lots,
            Err(e) => {
                warn!("lot scan failed: {}", e);
                continue;
            }
        };

        let now = Utc::now();
        for lot in lots {
            if lot.timer_paused || crate::engine::clock::remaining(&lot, now) > 0 {
                continue;
            }
            match engine.settle_expired(&lot.auction_id).await {
                // Settled, or a late bid revived the lot first - both fine.
                Ok(_) => {}
                Err(e) => warn!("auto-settlement failed for {}: {}", lot.auction_id, e),
            }
        }
    }
}

/// Initialize tracing with env-filter overrides
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "auctioneer=debug,auctioneer_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
