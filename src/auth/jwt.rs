//! JWT Token Handler
//! Mission: Generate and validate JWT tokens securely

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

use crate::auth::models::{Claims, Role};

/// JWT Handler for token operations
pub struct JwtHandler {
    secret: String,
    expiration_hours: i64,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            expiration_hours: 24, // 24-hour tokens by default
        }
    }

    /// Generate a JWT token for a subject and role
    pub fn generate_token(&self, sub: &str, name: &str, role: Role) -> Result<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(self.expiration_hours))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let expires_in = (self.expiration_hours * 3600) as usize;

        let claims = Claims {
            sub: sub.to_string(),
            name: name.to_string(),
            role,
            exp: expiration,
        };

        debug!(
            "Generating JWT for {} ({}), expires in {}h",
            claims.name, claims.sub, self.expiration_hours
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate JWT")?;

        Ok((token, expires_in))
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired token")?;

        debug!("Validated JWT for {}", decoded.claims.name);

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_generation_and_validation() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());

        let (token, expires_in) = handler
            .generate_token("team-1", "Team One", Role::Team)
            .unwrap();
        assert!(!token.is_empty());
        assert_eq!(expires_in, 24 * 3600); // 24 hours in seconds

        let claims = handler.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "team-1");
        assert_eq!(claims.name, "Team One");
        assert_eq!(claims.role, Role::Team);
    }

    #[test]
    fn test_invalid_token_rejected() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        assert!(handler.validate_token("not-a-real-token").is_err());
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let a = JwtHandler::new("secret-a".to_string());
        let b = JwtHandler::new("secret-b".to_string());

        let (token, _) = a.generate_token("admin", "Auctioneer", Role::Admin).unwrap();
        assert!(b.validate_token(&token).is_err());
    }
}
