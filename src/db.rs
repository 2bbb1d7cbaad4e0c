//! Database connection utilities for the newsflow backend.
//!
//! The store is a single SQLite file. Schema lives in `migrations/` and is
//! embedded into the binary, so a fresh deployment only needs a writable path.

use std::{collections::BTreeMap, str::FromStr};

use chrono::Utc;
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

/// Opens a pool against `database_url`, creating the file if needed, and
/// applies pending migrations.
///
/// In-memory URLs (`sqlite::memory:`) are pinned to a single connection
/// that never expires, since each SQLite memory connection is its own
/// database.
pub async fn connect_pool(database_url: &str, max_connections: u32) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = database_url.contains(":memory:");

    if !in_memory {
        if let Some(parent) = options.get_filename().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
    }

    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    };

    let pool = pool_options.connect_with(options).await?;
    tracing::info!(database_url, "Connected to SQLite database");

    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations completed");

    Ok(pool)
}

/// Returns true when the database answers a trivial query.
pub async fn health_check(pool: &SqlitePool) -> bool {
    match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(v) => v == 1,
        Err(e) => {
            tracing::error!(error = %e, "Database health check failed");
            false
        }
    }
}

/// Row counts for every application table.
pub async fn table_stats(pool: &SqlitePool) -> Result<BTreeMap<String, i64>, sqlx::Error> {
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
    )
    .fetch_all(pool)
    .await?;

    let mut stats = BTreeMap::new();
    for table in tables {
        // Names come from sqlite_master, not from the request.
        let count = sqlx::query(&format!("SELECT COUNT(*) AS count FROM \"{table}\""))
            .fetch_one(pool)
            .await?
            .get::<i64, _>("count");
        stats.insert(table, count);
    }
    Ok(stats)
}

/// Deletes session rows whose expiry has passed.
pub async fn cleanup_expired_sessions(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(pool)
        .await?;

    let removed = result.rows_affected();
    if removed > 0 {
        tracing::info!(removed, "Cleaned up expired sessions");
    }
    Ok(removed)
}
