//! Feed parameters and their translation into upstream news API requests.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Categories the feed understands. Anything else is rejected at the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewsCategory {
    #[default]
    Technology,
    Business,
    Cricket,
    India,
    Politics,
    Entertainment,
    Health,
    Science,
    Sports,
    World,
}

/// Categories blended into the mixed "all news" feed.
pub const MIXED_FEED_CATEGORIES: [NewsCategory; 6] = [
    NewsCategory::Technology,
    NewsCategory::Business,
    NewsCategory::Entertainment,
    NewsCategory::Politics,
    NewsCategory::Sports,
    NewsCategory::India,
];

impl NewsCategory {
    /// Name stored in the `categories` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Technology => "technology",
            Self::Business => "business",
            Self::Cricket => "cricket",
            Self::India => "india",
            Self::Politics => "politics",
            Self::Entertainment => "entertainment",
            Self::Health => "health",
            Self::Science => "science",
            Self::Sports => "sports",
            Self::World => "world",
        }
    }

    /// Capitalised label attached to freshly fetched articles.
    pub fn label(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Free-text query used when the category goes through `everything`.
    fn search_terms(self) -> Option<&'static str> {
        match self {
            Self::India => Some(
                r#"India OR Indian OR Delhi OR Mumbai OR "Prime Minister" OR Bollywood OR cricket"#,
            ),
            Self::Politics => Some("politics OR government OR election OR policy OR parliament"),
            Self::Health => Some("health OR medical OR medicine OR hospital OR disease OR vaccine"),
            Self::Science => {
                Some("science OR research OR discovery OR space OR climate OR environment")
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Latest,
    Popular,
    Relevant,
}

impl SortBy {
    fn upstream(self) -> &'static str {
        match self {
            Self::Popular => "popularity",
            Self::Latest | Self::Relevant => "publishedAt",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateRange {
    Today,
    #[default]
    Week,
    Month,
}

impl DateRange {
    /// Earliest publication date requested from the upstream search.
    pub fn from_date(self, now: DateTime<Utc>) -> NaiveDate {
        let days = match self {
            Self::Today => 0,
            Self::Week => 7,
            Self::Month => 30,
        };
        (now - Duration::days(days)).date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    TopHeadlines,
    Everything,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::TopHeadlines => "top-headlines",
            Self::Everything => "everything",
        }
    }
}

/// A fully parameterised upstream call, minus the API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub endpoint: Endpoint,
    pub params: Vec<(&'static str, String)>,
}

impl UpstreamRequest {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Paging and ordering shared by the feed and search endpoints.
#[derive(Debug, Clone, Copy)]
pub struct FeedWindow {
    pub page: u32,
    pub page_size: u32,
    pub sort_by: SortBy,
    pub date_range: DateRange,
}

impl FeedWindow {
    /// Ask upstream for twice as many articles as needed; the image filter
    /// discards a good share of them.
    fn upstream_page_size(&self) -> u32 {
        (self.page_size * 2).min(100)
    }

    fn everything_params(&self, q: String, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        vec![
            ("q", q),
            ("from", self.date_range.from_date(now).to_string()),
            ("sortBy", self.sort_by.upstream().to_string()),
            ("language", "en".to_string()),
            ("excludeDomains", "reddit.com,twitter.com".to_string()),
            ("page", self.page.to_string()),
            ("pageSize", self.upstream_page_size().to_string()),
        ]
    }
}

/// Maps a feed category onto the upstream endpoint that serves it best.
pub fn feed_request(category: NewsCategory, window: FeedWindow, now: DateTime<Utc>) -> UpstreamRequest {
    let headlines = |upstream_category: &str, country: Option<&str>| {
        let mut params = vec![("category", upstream_category.to_string())];
        if let Some(country) = country {
            params.push(("country", country.to_string()));
        }
        params.push(("page", window.page.to_string()));
        params.push(("pageSize", window.upstream_page_size().to_string()));
        UpstreamRequest {
            endpoint: Endpoint::TopHeadlines,
            params,
        }
    };

    match category {
        NewsCategory::Technology
        | NewsCategory::Business
        | NewsCategory::Sports
        | NewsCategory::Entertainment => headlines(category.as_str(), None),
        NewsCategory::World => headlines("general", Some("us")),
        other => {
            let q = other.search_terms().unwrap_or(other.as_str()).to_string();
            UpstreamRequest {
                endpoint: Endpoint::Everything,
                params: window.everything_params(q, now),
            }
        }
    }
}

/// Free-text search always goes through `everything`.
pub fn search_request(query: &str, window: FeedWindow, now: DateTime<Utc>) -> UpstreamRequest {
    UpstreamRequest {
        endpoint: Endpoint::Everything,
        params: window.everything_params(query.to_string(), now),
    }
}
