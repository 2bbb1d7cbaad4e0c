//! Domain services shared by the HTTP handlers.

pub mod article_cache;
pub mod auth;
pub mod image_filter;
pub mod news_api;
pub mod news_query;

pub use auth::{Claims, IssuedToken, TokenService, hash_password, verify_password};
pub use news_api::{NewsApiClient, NewsApiError};
pub use news_query::{DateRange, FeedWindow, MIXED_FEED_CATEGORIES, NewsCategory, SortBy};
