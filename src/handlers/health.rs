//! Health check and API index endpoints.

use actix_web::{HttpResponse, Responder, web};
use chrono::Utc;
use serde_json::json;

use crate::{AppState, db};

pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("", web::get().to(api_index))
        .route("/health", web::get().to(health_check));
}

/// Liveness plus a database round trip.
///
/// # Success Response (200 OK)
/// ```json
/// {
///   "status": "OK",
///   "timestamp": "2024-03-15T10:00:00Z",
///   "uptime": "2h 3m 5s",
///   "uptimeSeconds": 7385,
///   "environment": "development",
///   "database": "connected"
/// }
/// ```
///
/// Answers 503 with `status: "DEGRADED"` when the database does not respond.
#[tracing::instrument(skip(state))]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let elapsed = state.started_at.elapsed();
    // Whole seconds only; sub-second noise makes the string unreadable.
    let uptime = humantime::format_duration(std::time::Duration::from_secs(elapsed.as_secs()));
    let database_ok = db::health_check(&state.db).await;

    let body = json!({
        "status": if database_ok { "OK" } else { "DEGRADED" },
        "timestamp": Utc::now(),
        "uptime": uptime.to_string(),
        "uptimeSeconds": elapsed.as_secs(),
        "environment": state.settings.environment,
        "database": if database_ok { "connected" } else { "unavailable" },
    });

    if database_ok {
        HttpResponse::Ok().json(body)
    } else {
        tracing::error!("Health check failed: database unavailable");
        HttpResponse::ServiceUnavailable().json(body)
    }
}

pub async fn api_index() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "name": "News Flow API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Backend API for News Flow Application",
        "endpoints": {
            "auth": {
                "POST /api/auth/register": "Register a new user",
                "POST /api/auth/login": "Login user",
                "POST /api/auth/logout": "Logout user",
                "GET /api/auth/me": "Get current user info",
                "POST /api/auth/refresh": "Refresh session token"
            },
            "news": {
                "GET /api/news": "Get news articles",
                "GET /api/news/mixed": "Get a shuffled mix of categories",
                "GET /api/news/categories": "Get news categories",
                "GET /api/news/search": "Search news articles"
            },
            "bookmarks": {
                "GET /api/bookmarks": "Get user bookmarks",
                "POST /api/bookmarks": "Add bookmark",
                "PUT /api/bookmarks/{id}": "Update bookmark notes",
                "DELETE /api/bookmarks/{id}": "Remove bookmark",
                "DELETE /api/bookmarks/url/{encodedUrl}": "Remove bookmark by article URL",
                "GET /api/bookmarks/check/{encodedUrl}": "Check whether an article is bookmarked",
                "GET /api/bookmarks/stats": "Bookmark statistics"
            },
            "users": {
                "GET /api/users/profile": "Get user profile",
                "PUT /api/users/profile": "Update user profile",
                "PUT /api/users/password": "Change password",
                "GET /api/users/preferences": "Get user preferences",
                "PUT /api/users/preferences": "Update user preferences",
                "GET /api/users/search-history": "Get search history",
                "DELETE /api/users/account": "Delete account"
            }
        }
    }))
}
