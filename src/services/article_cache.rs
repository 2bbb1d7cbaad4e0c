//! Article cache backed by the `articles` table.
//!
//! Upstream results are upserted by URL and considered fresh for the
//! configured cache window. Stale rows are never deleted; they serve as the
//! fallback when the upstream API is unavailable.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;

use crate::models::{Article, Category};

use super::{
    image_filter::{ImageCheck, is_real_image},
    news_query::{NewsCategory, SortBy},
};

const ARTICLE_COLUMNS: &str = "a.id, a.title, a.description, a.content, a.url, a.image_url, \
     a.source_name, a.author, a.published_at, c.display_name AS category_name";

/// Rows returned when the cache is stale and upstream produced nothing.
const FALLBACK_LIMIT: i64 = 10;

fn offset(page: u32, page_size: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(page_size)
}

/// Fresh cached articles for `category`, with placeholder images removed.
pub async fn cached_feed(
    pool: &SqlitePool,
    category: NewsCategory,
    sort_by: SortBy,
    page: u32,
    page_size: u32,
    ttl: Duration,
) -> Result<Vec<Article>, sqlx::Error> {
    let cutoff = Utc::now() - chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
    let order = match sort_by {
        SortBy::Popular => "a.id DESC",
        SortBy::Latest | SortBy::Relevant => "a.published_at DESC",
    };

    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles a \
         LEFT JOIN categories c ON a.category_id = c.id \
         WHERE c.name = ? AND a.updated_at > ? AND a.is_active = 1 \
         ORDER BY {order} LIMIT ? OFFSET ?"
    );

    let rows: Vec<Article> = sqlx::query_as(&sql)
        .bind(category.as_str())
        .bind(cutoff)
        .bind(i64::from(page_size))
        .bind(offset(page, page_size))
        .fetch_all(pool)
        .await?;

    Ok(rows
        .into_iter()
        .filter(|a| is_real_image(a.image_url.as_deref(), ImageCheck::Standard))
        .collect())
}

/// Latest rows of a category regardless of age.
pub async fn fallback_articles(
    pool: &SqlitePool,
    category: NewsCategory,
) -> Result<Vec<Article>, sqlx::Error> {
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles a \
         LEFT JOIN categories c ON a.category_id = c.id \
         WHERE c.name = ? AND a.is_active = 1 \
         ORDER BY a.published_at DESC LIMIT ?"
    );

    sqlx::query_as(&sql)
        .bind(category.as_str())
        .bind(FALLBACK_LIMIT)
        .fetch_all(pool)
        .await
}

/// Inserts or refreshes `articles` under `category`, keyed by URL.
///
/// Existing rows keep their id, so bookmarks pointing at them survive.
/// A row that fails to write is logged and skipped. Returns the number
/// of rows written.
pub async fn upsert_articles(
    pool: &SqlitePool,
    articles: &[Article],
    category: NewsCategory,
) -> Result<usize, sqlx::Error> {
    let category_id: i64 = sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
        .bind(category.as_str())
        .fetch_optional(pool)
        .await?
        .unwrap_or(1);

    let now = Utc::now();
    let mut written = 0;

    for article in articles {
        let result = sqlx::query(
            "INSERT INTO articles \
             (title, description, content, url, image_url, source_name, author, published_at, \
              category_id, is_active, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?) \
             ON CONFLICT(url) DO UPDATE SET \
               title = excluded.title, \
               description = excluded.description, \
               content = excluded.content, \
               image_url = excluded.image_url, \
               source_name = excluded.source_name, \
               author = excluded.author, \
               published_at = excluded.published_at, \
               category_id = excluded.category_id, \
               is_active = 1, \
               updated_at = excluded.updated_at",
        )
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.content)
        .bind(&article.url)
        .bind(&article.image_url)
        .bind(&article.source_name)
        .bind(&article.author)
        .bind(&article.published_at)
        .bind(category_id)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await;

        match result {
            Ok(_) => written += 1,
            Err(e) => tracing::warn!(url = %article.url, error = %e, "Failed to cache article"),
        }
    }

    tracing::debug!(category = category.as_str(), written, "Cached articles");
    Ok(written)
}

/// Substring match over cached titles and descriptions, newest first.
pub async fn search_cached(
    pool: &SqlitePool,
    query: &str,
    page: u32,
    page_size: u32,
) -> Result<Vec<Article>, sqlx::Error> {
    let pattern = format!("%{query}%");
    let sql = format!(
        "SELECT {ARTICLE_COLUMNS} FROM articles a \
         LEFT JOIN categories c ON a.category_id = c.id \
         WHERE (a.title LIKE ? OR a.description LIKE ?) AND a.is_active = 1 \
         ORDER BY a.published_at DESC LIMIT ? OFFSET ?"
    );

    sqlx::query_as(&sql)
        .bind(&pattern)
        .bind(&pattern)
        .bind(i64::from(page_size))
        .bind(offset(page, page_size))
        .fetch_all(pool)
        .await
}

pub async fn active_categories(pool: &SqlitePool) -> Result<Vec<Category>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, name, display_name, description, is_active, sort_order \
         FROM categories WHERE is_active = 1 ORDER BY sort_order, display_name",
    )
    .fetch_all(pool)
    .await
}

pub async fn record_search(
    pool: &SqlitePool,
    user_id: i64,
    query: &str,
    results_count: Option<i64>,
    ip_address: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO search_history (user_id, search_query, results_count, ip_address, created_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(query)
    .bind(results_count)
    .bind(ip_address)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}
