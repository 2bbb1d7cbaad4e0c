//! Shared fixtures for the integration tests.
//!
//! Every test gets its own in-memory database (migrated on connect) and its
//! own mock news API, so tests never share state.

#![allow(dead_code)]

use actix_http::Request;
use actix_web::{
    App, Error,
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::header,
    test, web,
};
use newsflow_server::{AppState, Settings, db, handlers};
use serde_json::{Value, json};
use wiremock::MockServer;

pub const TEST_PASSWORD: &str = "secret123";
pub const TEST_JWT_SECRET: &str = "integration-test-secret";

pub struct TestContext {
    pub state: AppState,
    pub news_api: MockServer,
}

pub async fn context() -> TestContext {
    let news_api = MockServer::start().await;
    let settings = Settings {
        jwt_secret: TEST_JWT_SECRET.to_string(),
        news_api_key: "test-key".to_string(),
        news_api_base_url: news_api.uri(),
        ..Settings::default()
    };

    let pool = db::connect_pool("sqlite::memory:", 1)
        .await
        .expect("in-memory database");
    let state = AppState::with_pool(settings, pool).expect("app state");

    TestContext { state, news_api }
}

pub async fn init_app(
    state: &AppState,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = Error> {
    test::init_service(
        App::new()
            .app_data(web::Data::new(state.clone()))
            .service(handlers::api_scope()),
    )
    .await
}

pub fn bearer(token: &str) -> (header::HeaderName, String) {
    (header::AUTHORIZATION, format!("Bearer {token}"))
}

/// Registers `email` through the API and returns the issued token.
pub async fn register<S, B>(app: &S, email: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": email,
            "password": TEST_PASSWORD,
            "firstName": "Ada",
            "lastName": "Lovelace",
        }))
        .to_request();
    let resp = test::call_service(app, req).await;
    assert_eq!(resp.status(), 201, "registration should succeed");

    let body: Value = test::read_body_json(resp).await;
    body["token"].as_str().expect("token in response").to_string()
}

/// A NewsAPI-shaped article that passes the display filters.
pub fn upstream_article(slug: &str) -> Value {
    json!({
        "source": { "id": null, "name": "Example Wire" },
        "author": "Staff Writer",
        "title": format!("Story {slug}"),
        "description": format!("What happened with {slug}"),
        "url": format!("https://news.example.org/articles/{slug}"),
        "urlToImage": format!("https://images.example.org/news/2024/03/{slug}.jpg"),
        "publishedAt": "2024-03-15T10:00:00Z",
        "content": "Full text"
    })
}

pub fn upstream_ok(articles: Vec<Value>) -> Value {
    json!({
        "status": "ok",
        "totalResults": articles.len(),
        "articles": articles,
    })
}
