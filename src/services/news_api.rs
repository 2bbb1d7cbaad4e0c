//! HTTP client for the upstream NewsAPI-compatible service.

use std::{num::NonZeroU32, sync::Arc, time::Duration};

use chrono::Utc;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::Article;

use super::{
    image_filter::{ImageCheck, has_valid_content, is_real_image},
    news_query::{FeedWindow, NewsCategory, UpstreamRequest, feed_request, search_request},
};

/// Outbound calls per minute, shared by every request handler.
const UPSTREAM_REQUESTS_PER_MINUTE: u32 = 60;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum NewsApiError {
    #[error("news API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("news API returned status `{status}`: {message}")]
    Upstream { status: String, message: String },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    articles: Vec<ApiArticle>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    source: Option<ApiSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    name: Option<String>,
}

impl ApiArticle {
    fn is_displayable(&self, check: ImageCheck) -> bool {
        has_valid_content(
            self.title.as_deref(),
            self.description.as_deref(),
            self.url.as_deref(),
        ) && is_real_image(self.url_to_image.as_deref(), check)
    }

    fn into_article(self, category_name: Option<String>) -> Article {
        Article {
            id: None,
            title: self.title.unwrap_or_default(),
            description: self.description,
            content: self.content,
            url: self.url.unwrap_or_default(),
            image_url: self.url_to_image,
            source_name: self.source.and_then(|s| s.name),
            author: self.author,
            published_at: self.published_at,
            category_name,
        }
    }
}

/// Thin wrapper around `reqwest` that knows how to talk to `/top-headlines`
/// and `/everything` and filters out articles unfit for display.
#[derive(Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl NewsApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, NewsApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let per_minute = NonZeroU32::new(UPSTREAM_REQUESTS_PER_MINUTE).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
        })
    }

    async fn send(&self, request: &UpstreamRequest) -> Result<Vec<ApiArticle>, NewsApiError> {
        self.limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, request.endpoint.path());
        debug!(url = %url, params = ?request.params, "Calling news API");

        let body: ApiResponse = self
            .http
            .get(&url)
            .query(&request.params)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?
            .json()
            .await?;

        if body.status != "ok" {
            let message = body.message.or(body.code).unwrap_or_default();
            warn!(status = %body.status, message = %message, "News API rejected request");
            return Err(NewsApiError::Upstream {
                status: body.status,
                message,
            });
        }

        Ok(body.articles)
    }

    /// Fetches one page of a category feed, keeping at most
    /// `window.page_size` displayable articles.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_category(
        &self,
        category: NewsCategory,
        window: FeedWindow,
    ) -> Result<Vec<Article>, NewsApiError> {
        let request = feed_request(category, window, Utc::now());
        let raw = self.send(&request).await?;
        let received = raw.len();

        let label = category.label();
        let articles: Vec<Article> = raw
            .into_iter()
            .filter(|a| a.is_displayable(ImageCheck::Feed))
            .take(window.page_size as usize)
            .map(|a| a.into_article(Some(label.clone())))
            .collect();

        debug!(received, kept = articles.len(), "Filtered category feed");
        Ok(articles)
    }

    /// Free-text search over `/everything`.
    #[tracing::instrument(skip(self))]
    pub async fn search(&self, query: &str, window: FeedWindow) -> Result<Vec<Article>, NewsApiError> {
        let request = search_request(query, window, Utc::now());
        let raw = self.send(&request).await?;

        Ok(raw
            .into_iter()
            .filter(|a| a.is_displayable(ImageCheck::Standard))
            .take(window.page_size as usize)
            .map(|a| a.into_article(None))
            .collect())
    }
}
