//! Axum serving boundary for the NutriScan classifier.
//!
//! The HTTP layer validates upload constraints and delegates to the
//! inference pipeline; every classification decision lives in
//! `nscan-inference`.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
