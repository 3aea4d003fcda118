pub mod routes;

pub use routes::{create_public_router, create_router, AppState};
