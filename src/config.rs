//! Runtime configuration for the newsflow backend.
//!
//! Values come from the process environment (optionally seeded from `.env`
//! by `dotenv`). Durations use humantime syntax such as `5m` or `7d`.

use std::{env, str::FromStr, time::Duration};

use anyhow::Context;

/// Application settings shared by every handler through [`crate::AppState`].
#[derive(Debug, Clone)]
pub struct Settings {
    /// Interface the HTTP server binds to.
    pub host: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Deployment label reported by the health endpoint.
    pub environment: String,
    /// SQLx connection string, e.g. `sqlite://database/newsapp.db`.
    pub database_url: String,
    pub database_max_connections: u32,
    /// HMAC secret used to sign session tokens.
    pub jwt_secret: String,
    /// Lifetime of issued session tokens and their session rows.
    pub jwt_expires_in: Duration,
    pub news_api_key: String,
    /// Base URL of the upstream news API, without trailing slash.
    pub news_api_base_url: String,
    /// How long cached articles stay fresh.
    pub news_cache_ttl: Duration,
    /// Origin allowed by CORS.
    pub frontend_url: String,
    /// Requests allowed per client IP in each `rate_limit_window`.
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    /// Whether `X-Forwarded-For` / `Forwarded` name the client. Leave off
    /// unless a reverse proxy overwrites those headers.
    pub trust_proxy: bool,
    /// Interval of the expired-session sweeper.
    pub session_cleanup_interval: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            environment: "development".to_string(),
            database_url: "sqlite://database/newsapp.db".to_string(),
            database_max_connections: 5,
            jwt_secret: String::new(),
            jwt_expires_in: Duration::from_secs(7 * 24 * 60 * 60),
            news_api_key: String::new(),
            news_api_base_url: "https://newsapi.org/v2".to_string(),
            news_cache_ttl: Duration::from_secs(5 * 60),
            frontend_url: "http://localhost:8000".to_string(),
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(15 * 60),
            trust_proxy: false,
            session_cleanup_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl Settings {
    /// Builds settings from environment variables, falling back to
    /// [`Settings::default`] for everything except the two secrets.
    ///
    /// # Errors
    /// Fails when `JWT_SECRET` or `NEWS_API_KEY` is missing, or when a
    /// numeric or duration variable cannot be parsed.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT", defaults.port)?,
            environment: env::var("APP_ENV").unwrap_or(defaults.environment),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            )?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            jwt_expires_in: duration_var("JWT_EXPIRES_IN", defaults.jwt_expires_in)?,
            news_api_key: env::var("NEWS_API_KEY").context("NEWS_API_KEY must be set")?,
            news_api_base_url: env::var("NEWS_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.news_api_base_url),
            news_cache_ttl: duration_var("NEWS_CACHE_TTL", defaults.news_cache_ttl)?,
            frontend_url: env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            rate_limit_max: parse_var("RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            rate_limit_window: duration_var("RATE_LIMIT_WINDOW", defaults.rate_limit_window)?,
            trust_proxy: parse_var("TRUST_PROXY", defaults.trust_proxy)?,
            session_cleanup_interval: duration_var(
                "SESSION_CLEANUP_INTERVAL",
                defaults.session_cleanup_interval,
            )?,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_var<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

fn duration_var(key: &str, default: Duration) -> anyhow::Result<Duration> {
    match env::var(key) {
        Ok(raw) => humantime::parse_duration(raw.trim())
            .with_context(|| format!("{key} is not a valid duration: {raw}")),
        Err(_) => Ok(default),
    }
}
