//! Authentication Models
//! Mission: Define the admin/team auth data structures

use serde::{Deserialize, Serialize};

/// Access roles
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin, // Auctioneer: full control of lots and rosters
    #[serde(rename = "team")]
    Team, // A competing team: may bid for itself
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Team => "team",
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // "admin" or the team id
    pub name: String,
    pub role: Role,
    pub exp: usize, // expiration timestamp
}

/// Team login request body
#[derive(Debug, Deserialize)]
pub struct TeamLoginRequest {
    pub team_id: String,
    pub password: String,
}

/// Admin login request body
#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub password: String,
}

/// Login response with JWT token
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: usize,
    pub role: Role,
    pub name: String,
}
