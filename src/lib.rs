//! Library entry point for the newsflow backend.
//!
//! Exports all core modules for use in integration tests and by the main binary.

pub mod auth_middleware;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod rate_limit;
pub mod services;
pub mod telemetry;

pub use auth_middleware::{AuthMiddleware, OptionalAuth, UserContext};
pub use config::Settings;
pub use error::{AppError, AppResult};
pub use models::AppState;
pub use rate_limit::RateLimit;
pub use services::{NewsApiClient, TokenService};
pub use telemetry::{get_subscriber, init_subscriber};
