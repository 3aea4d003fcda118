//! Authentication Module
//! Mission: Secure API access with JWT tokens and admin/team roles

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;

pub use api::AuthState;
pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
pub use models::{Claims, Role};
