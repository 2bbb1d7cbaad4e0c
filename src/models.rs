//! Data models for users, articles, categories and bookmarks.
//!
//! Rows derive SQLx's `FromRow` for query mapping and Serde for API
//! responses. Response field names follow the column names, which is the
//! shape the frontend consumes.

use std::{sync::Arc, time::Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::{NewsApiClient, TokenService, config::Settings, db};

/// Public view of a user account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub theme_preference: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub async fn find(db: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, email, first_name, last_name, theme_preference, email_verified, \
             created_at, updated_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(db)
        .await
    }
}

/// Columns needed to check a login or a password confirmation.
#[derive(Debug, FromRow)]
pub struct UserCredentials {
    pub id: i64,
    pub password_hash: String,
    pub is_active: bool,
}

/// A news article, either read from the cache or freshly mapped from the
/// upstream API (in which case `id` is absent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Article {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
    pub category_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub sort_order: i64,
}

/// A bookmark joined with its article, as returned by every bookmark endpoint.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BookmarkView {
    pub bookmark_id: i64,
    pub bookmarked_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub article_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
    pub category_name: Option<String>,
}

/// Shared application state for all handlers.
///
/// Holds the SQLite pool, the parsed settings, and the two services that
/// carry their own configuration (token signing and the upstream news client).
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<Settings>,
    pub tokens: TokenService,
    pub news: NewsApiClient,
    pub started_at: Instant,
}

impl AppState {
    /// Connects to the configured database and builds the services.
    ///
    /// # Errors
    /// Returns an error when the pool cannot be opened, migrations fail,
    /// or the HTTP client cannot be built.
    pub async fn new(settings: Settings) -> anyhow::Result<Self> {
        let pool = db::connect_pool(&settings.database_url, settings.database_max_connections).await?;
        Self::with_pool(settings, pool)
    }

    /// Builds state around an existing pool. Used by tests with an
    /// in-memory database.
    pub fn with_pool(settings: Settings, db: SqlitePool) -> anyhow::Result<Self> {
        let tokens = TokenService::new(&settings.jwt_secret, settings.jwt_expires_in);
        let news = NewsApiClient::new(&settings.news_api_base_url, &settings.news_api_key)?;

        Ok(Self {
            db,
            settings: Arc::new(settings),
            tokens,
            news,
            started_at: Instant::now(),
        })
    }
}
