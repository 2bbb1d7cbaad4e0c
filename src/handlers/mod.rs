//! HTTP handlers for the newsflow API.
//!
//! Every endpoint lives under `/api`; [`api_scope`] assembles the scope
//! with its extractor configuration and 404 fallback.

pub mod auth;
pub mod bookmarks;
pub mod health;
pub mod news;
pub mod users;

use actix_web::{HttpRequest, HttpResponse, Scope, web};

use crate::{AppState, error::extractor_error};

/// Maximum accepted JSON body.
pub const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

/// The `/api` scope with every route registered.
pub fn api_scope() -> Scope {
    web::scope("/api")
        .app_data(
            web::JsonConfig::default()
                .limit(JSON_BODY_LIMIT)
                .error_handler(|err, _| extractor_error(err)),
        )
        .app_data(web::QueryConfig::default().error_handler(|err, _| extractor_error(err)))
        .app_data(web::PathConfig::default().error_handler(|err, _| extractor_error(err)))
        .configure(configure_api_routes)
        .default_service(web::to(api_not_found))
}

/// Registers every API route relative to `/api`.
pub fn configure_api_routes(cfg: &mut web::ServiceConfig) {
    health::configure_health_routes(cfg);
    auth::configure_auth_routes(cfg);
    news::configure_news_routes(cfg);
    bookmarks::configure_bookmark_routes(cfg);
    users::configure_user_routes(cfg);
}

pub async fn api_not_found() -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({ "error": "API endpoint not found" }))
}

/// Client address: the socket peer, or the forwarded address when the
/// deployment trusts its proxy.
pub(crate) fn client_ip(req: &HttpRequest) -> Option<String> {
    let trust_proxy = req
        .app_data::<web::Data<AppState>>()
        .is_some_and(|state| state.settings.trust_proxy);

    if trust_proxy {
        req.connection_info().realip_remote_addr().map(str::to_string)
    } else {
        req.peer_addr().map(|addr| addr.ip().to_string())
    }
}

pub(crate) fn user_agent(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
