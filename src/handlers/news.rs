//! News feed, search and category endpoints.
//!
//! Feeds are served from the article cache while it is fresh, otherwise
//! fetched upstream and cached. When both come up empty the latest cached
//! rows of the category are served regardless of age.

use actix_web::{HttpRequest, HttpResponse, web};
use futures::future::join_all;
use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    AppState,
    auth_middleware::{OptionalAuth, UserContext, record_activity},
    error::AppResult,
    models::Article,
    services::{
        DateRange, FeedWindow, MIXED_FEED_CATEGORIES, NewsCategory, SortBy, article_cache,
    },
};

use super::client_ip;

pub fn configure_news_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/news")
            .route("", web::get().to(get_news))
            .route("/search", web::get().to(search_news))
            .route("/categories", web::get().to(get_categories))
            .route("/mixed", web::get().to(get_mixed_news)),
    );
}

fn default_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    20
}

fn default_mixed_page_size() -> u32 {
    5
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    #[serde(default)]
    pub category: NewsCategory,
    #[serde(default = "default_page")]
    #[validate(range(min = 1, max = 10, message = "Page must be between 1 and 10"))]
    pub page: u32,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "Page size must be between 1 and 100"))]
    pub page_size: u32,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub date_range: DateRange,
}

impl FeedQuery {
    fn window(&self) -> FeedWindow {
        FeedWindow {
            page: self.page,
            page_size: self.page_size,
            sort_by: self.sort_by,
            date_range: self.date_range,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    #[serde(default)]
    #[validate(length(min = 1, message = "Search query is required"))]
    pub q: String,
    #[serde(default = "default_page")]
    #[validate(range(min = 1, max = 10, message = "Page must be between 1 and 10"))]
    pub page: u32,
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1, max = 100, message = "Page size must be between 1 and 100"))]
    pub page_size: u32,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub date_range: DateRange,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MixedQuery {
    #[serde(default = "default_mixed_page_size")]
    #[validate(range(min = 1, max = 20, message = "Page size must be between 1 and 20"))]
    pub page_size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedSource {
    Cache,
    Upstream,
    Fallback,
}

struct FeedPage {
    articles: Vec<Article>,
    total_results: usize,
    source: FeedSource,
}

/// Cache, then upstream, then stale fallback. `None` when all three are empty.
async fn load_feed(
    state: &AppState,
    category: NewsCategory,
    window: FeedWindow,
) -> AppResult<Option<FeedPage>> {
    let cached = article_cache::cached_feed(
        &state.db,
        category,
        window.sort_by,
        window.page,
        window.page_size,
        state.settings.news_cache_ttl,
    )
    .await?;

    if !cached.is_empty() {
        return Ok(Some(FeedPage {
            total_results: cached.len(),
            articles: cached,
            source: FeedSource::Cache,
        }));
    }

    match state.news.fetch_category(category, window).await {
        Ok(fetched) if !fetched.is_empty() => {
            article_cache::upsert_articles(&state.db, &fetched, category).await?;
            return Ok(Some(FeedPage {
                total_results: fetched.len(),
                articles: fetched,
                source: FeedSource::Upstream,
            }));
        }
        Ok(_) => tracing::info!(category = category.as_str(), "News API returned no usable articles"),
        Err(e) => tracing::warn!(category = category.as_str(), error = %e, "News API fetch failed"),
    }

    fallback_page(state, category, window.page_size).await
}

async fn fallback_page(
    state: &AppState,
    category: NewsCategory,
    page_size: u32,
) -> AppResult<Option<FeedPage>> {
    let mut sample = article_cache::fallback_articles(&state.db, category).await?;
    if sample.is_empty() {
        return Ok(None);
    }

    tracing::info!(category = category.as_str(), "Serving stale articles as fallback");
    let total_results = sample.len();
    sample.truncate(page_size as usize);

    Ok(Some(FeedPage {
        articles: sample,
        total_results,
        source: FeedSource::Fallback,
    }))
}

async fn log_search(
    state: &AppState,
    user: &UserContext,
    query: &str,
    results_count: usize,
    req: &HttpRequest,
) {
    record_activity(&state.db, user.user_id).await;

    let ip = client_ip(req);
    if let Err(e) = article_cache::record_search(
        &state.db,
        user.user_id,
        query,
        Some(results_count as i64),
        ip.as_deref(),
    )
    .await
    {
        tracing::error!(user_id = user.user_id, error = %e, "Failed to record search history");
    }
}

/// Category feed.
///
/// # Query Parameters
/// `category`, `page` (1-10), `pageSize` (1-100), `sortBy`
/// (`latest|popular|relevant`), `dateRange` (`today|week|month`).
///
/// # Responses
/// - `200 OK`: `{ articles, totalResults, page, pageSize, category, cached }`,
///   plus `fallback: true` when stale rows were served
/// - `503 Service Unavailable`: nothing cached and upstream returned nothing
#[tracing::instrument(skip(state, user, req))]
pub async fn get_news(
    state: web::Data<AppState>,
    query: web::Query<FeedQuery>,
    user: OptionalAuth,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    query.validate()?;
    let query = query.into_inner();
    let category = query.category;

    let loaded = match load_feed(&state, category, query.window()).await {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(category = category.as_str(), error = %e, "News fetch failed");
            match fallback_page(&state, category, query.page_size).await {
                Ok(Some(page)) => Some(page),
                Ok(None) | Err(_) => {
                    return Ok(HttpResponse::InternalServerError().json(json!({
                        "error": "Unable to fetch news articles at this time. Please try again later.",
                        "articles": [],
                        "totalResults": 0,
                    })));
                }
            }
        }
    };

    let Some(page) = loaded else {
        if let Some(user) = user.as_ref() {
            log_search(&state, user, category.as_str(), 0, &req).await;
        }
        return Ok(HttpResponse::ServiceUnavailable().json(json!({
            "error": "Unable to fetch news at this time. Please try again later.",
            "articles": [],
            "totalResults": 0,
            "page": query.page,
            "pageSize": query.page_size,
            "category": category,
        })));
    };

    if let Some(user) = user.as_ref() {
        log_search(&state, user, category.as_str(), page.articles.len(), &req).await;
    }

    let mut body = json!({
        "articles": page.articles,
        "totalResults": page.total_results,
        "page": query.page,
        "pageSize": query.page_size,
        "category": category,
        "cached": page.source == FeedSource::Cache,
    });
    if page.source == FeedSource::Fallback {
        body["fallback"] = json!(true);
    }

    Ok(HttpResponse::Ok().json(body))
}

/// Free-text search: cached articles first, then the upstream API.
/// Upstream search results are not cached.
#[tracing::instrument(skip(state, user, req))]
pub async fn search_news(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
    user: OptionalAuth,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let mut query = query.into_inner();
    query.q = query.q.trim().to_string();
    query.validate()?;

    let cached =
        article_cache::search_cached(&state.db, &query.q, query.page, query.page_size).await?;

    let (articles, cached_hit) = if !cached.is_empty() {
        (cached, true)
    } else {
        let window = FeedWindow {
            page: query.page,
            page_size: query.page_size,
            sort_by: query.sort_by,
            date_range: query.date_range,
        };
        match state.news.search(&query.q, window).await {
            Ok(found) => (found, false),
            Err(e) => {
                tracing::warn!(error = %e, "News API search failed");
                (Vec::new(), false)
            }
        }
    };

    if let Some(user) = user.as_ref() {
        log_search(&state, user, &query.q, articles.len(), &req).await;
    }

    let found_any = !articles.is_empty();
    let mut body = json!({
        "totalResults": articles.len(),
        "articles": articles,
        "page": query.page,
        "pageSize": query.page_size,
        "query": query.q,
    });

    if !found_any {
        body["message"] = json!("No articles found for your search");
    } else {
        body["cached"] = json!(cached_hit);
    }

    Ok(HttpResponse::Ok().json(body))
}

#[tracing::instrument(skip(state))]
pub async fn get_categories(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let categories = article_cache::active_categories(&state.db).await?;
    Ok(HttpResponse::Ok().json(json!({ "categories": categories })))
}

/// A shuffled blend of several category feeds, loaded concurrently.
/// Categories that fail are skipped.
#[tracing::instrument(skip(state))]
pub async fn get_mixed_news(
    state: web::Data<AppState>,
    query: web::Query<MixedQuery>,
) -> AppResult<HttpResponse> {
    query.validate()?;

    let window = FeedWindow {
        page: 1,
        page_size: query.page_size,
        sort_by: SortBy::Latest,
        date_range: DateRange::Week,
    };

    let results = join_all(
        MIXED_FEED_CATEGORIES
            .iter()
            .map(|&category| load_feed(&state, category, window)),
    )
    .await;

    let mut articles: Vec<Article> = Vec::new();
    for (category, result) in MIXED_FEED_CATEGORIES.iter().zip(results) {
        match result {
            Ok(Some(page)) => articles.extend(page.articles),
            Ok(None) => tracing::debug!(category = category.as_str(), "No articles for mixed feed"),
            Err(e) => tracing::warn!(category = category.as_str(), error = %e, "Mixed feed category failed"),
        }
    }

    articles.shuffle(&mut rand::rng());

    Ok(HttpResponse::Ok().json(json!({
        "totalResults": articles.len(),
        "articles": articles,
        "category": "all",
    })))
}
