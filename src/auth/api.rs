//! Authentication API Endpoints
//! Mission: Issue JWT tokens for the auctioneer and for competing teams

use axum::{extract::State, http::StatusCode, response::Json};
use bcrypt::verify;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    auth::{
        jwt::JwtHandler,
        models::{AdminLoginRequest, LoginResponse, Role, TeamLoginRequest},
    },
    store::AuctionDb,
};

/// Shared state for auth endpoints
#[derive(Clone)]
pub struct AuthState {
    pub db: Arc<AuctionDb>,
    pub jwt: Arc<JwtHandler>,
    pub admin_password: String,
}

impl AuthState {
    pub fn new(db: Arc<AuctionDb>, jwt: Arc<JwtHandler>, admin_password: String) -> Self {
        Self {
            db,
            jwt,
            admin_password,
        }
    }
}

/// Team login: verify the bcrypt password of a team and issue a token
/// whose subject is the team id.
pub async fn team_login(
    State(state): State<AuthState>,
    Json(req): Json<TeamLoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    let team = state
        .db
        .get_team(&req.team_id)
        .await
        .map_err(|e| {
            tracing::error!("team lookup failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        })?
        .ok_or((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()))?;

    let valid = verify(&req.password, &team.password_hash).unwrap_or(false);
    if !valid {
        warn!("Failed team login attempt for {}", team.name);
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    }

    let (token, expires_in) = state
        .jwt
        .generate_token(&team.id, &team.name, Role::Team)
        .map_err(|e| {
            tracing::error!("token generation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        })?;

    info!("🔐 Team logged in: {}", team.name);

    Ok(Json(LoginResponse {
        token,
        expires_in,
        role: Role::Team,
        name: team.name,
    }))
}

/// Admin login: verify the configured auctioneer password.
pub async fn admin_login(
    State(state): State<AuthState>,
    Json(req): Json<AdminLoginRequest>,
) -> Result<Json<LoginResponse>, (StatusCode, String)> {
    if req.password != state.admin_password {
        warn!("Failed admin login attempt");
        return Err((StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()));
    }

    let (token, expires_in) = state
        .jwt
        .generate_token("admin", "Auctioneer", Role::Admin)
        .map_err(|e| {
            tracing::error!("token generation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        })?;

    info!("🔐 Admin logged in");

    Ok(Json(LoginResponse {
        token,
        expires_in,
        role: Role::Admin,
        name: "Auctioneer".to_string(),
    }))
}
