//! Integration tests for bookmark endpoints.

mod common;

use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
};
use serde_json::{Value, json};

use common::{bearer, context, init_app, register};

const ARTICLE_URL: &str = "https://news.example.org/articles/deep-sea?ref=home";
const ENCODED_URL: &str = "https%3A%2F%2Fnews.example.org%2Farticles%2Fdeep-sea%3Fref%3Dhome";

async fn add_bookmark<S, B>(app: &S, token: &str, body: Value) -> ServiceResponse<B>
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let req = test::TestRequest::post()
        .uri("/api/bookmarks")
        .insert_header(bearer(token))
        .set_json(body)
        .to_request();
    test::call_service(app, req).await
}

fn deep_sea() -> Value {
    json!({
        "articleUrl": ARTICLE_URL,
        "title": "Life at the bottom of the ocean",
        "description": "Researchers map a new trench",
        "imageUrl": "https://images.example.org/science/2024/trench.jpg",
        "sourceName": "Example Wire",
        "publishedAt": "2024-03-15T10:00:00Z",
        "notes": "read later"
    })
}

#[actix_web::test]
async fn bookmarks_require_authentication() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;

    let req = test::TestRequest::get().uri("/api/bookmarks").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn add_list_and_duplicate() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "saver@example.com").await;

    let resp = add_bookmark(&app, &token, deep_sea()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Bookmark added successfully");
    assert_eq!(body["bookmark"]["url"], ARTICLE_URL);
    assert_eq!(body["bookmark"]["notes"], "read later");
    assert_eq!(body["bookmark"]["category_name"], "Technology");

    let resp = add_bookmark(&app, &token, deep_sea()).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Article already bookmarked");

    let req = test::TestRequest::get()
        .uri("/api/bookmarks")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["bookmarks"][0]["title"], "Life at the bottom of the ocean");
}

#[actix_web::test]
async fn add_rejects_invalid_input() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "careless@example.com").await;

    let resp = add_bookmark(
        &app,
        &token,
        json!({
            "articleUrl": "not a url",
            "title": "",
            "publishedAt": "yesterday",
            "notes": "x".repeat(1001),
        }),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    for field in ["article_url", "title", "published_at", "notes"] {
        assert!(body["details"].get(field).is_some(), "missing error for {field}");
    }
}

#[actix_web::test]
async fn bookmarks_are_private_to_their_owner() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let owner = register(&app, "owner@example.com").await;
    let other = register(&app, "other@example.com").await;

    let resp = add_bookmark(&app, &owner, deep_sea()).await;
    let body: Value = test::read_body_json(resp).await;
    let id = body["bookmark"]["bookmark_id"].as_i64().expect("bookmark id");

    let req = test::TestRequest::delete()
        .uri(&format!("/api/bookmarks/{id}"))
        .insert_header(bearer(&other))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Bookmark not found");

    // Same article, different user: allowed.
    let resp = add_bookmark(&app, &other, deep_sea()).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[actix_web::test]
async fn notes_can_be_updated_and_cleared() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "notes@example.com").await;

    let resp = add_bookmark(&app, &token, deep_sea()).await;
    let body: Value = test::read_body_json(resp).await;
    let id = body["bookmark"]["bookmark_id"].as_i64().expect("bookmark id");

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookmarks/{id}"))
        .insert_header(bearer(&token))
        .set_json(json!({ "notes": "share with the team" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["bookmark"]["notes"], "share with the team");

    let req = test::TestRequest::put()
        .uri(&format!("/api/bookmarks/{id}"))
        .insert_header(bearer(&token))
        .set_json(json!({ "notes": "" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert!(body["bookmark"]["notes"].is_null());
}

#[actix_web::test]
async fn non_numeric_id_is_a_validation_error() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "typo@example.com").await;

    let req = test::TestRequest::delete()
        .uri("/api/bookmarks/abc")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn check_and_remove_by_encoded_url() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "byurl@example.com").await;

    let resp = add_bookmark(&app, &token, deep_sea()).await;
    let body: Value = test::read_body_json(resp).await;
    let id = body["bookmark"]["bookmark_id"].clone();

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookmarks/check/{ENCODED_URL}"))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["isBookmarked"], true);
    assert_eq!(body["bookmarkId"], id);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/bookmarks/url/{ENCODED_URL}"))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri(&format!("/api/bookmarks/check/{ENCODED_URL}"))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["isBookmarked"], false);
    assert!(body["bookmarkId"].is_null());

    let req = test::TestRequest::delete()
        .uri(&format!("/api/bookmarks/url/{ENCODED_URL}"))
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn stats_summarise_bookmarks() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "stats@example.com").await;

    let req = test::TestRequest::get()
        .uri("/api/bookmarks/stats")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_bookmarks"], 0);
    assert!(body["first_bookmark"].is_null());

    add_bookmark(&app, &token, deep_sea()).await;
    let mut second = deep_sea();
    second["articleUrl"] = json!("https://news.example.org/articles/coral");
    add_bookmark(&app, &token, second).await;

    let req = test::TestRequest::get()
        .uri("/api/bookmarks/stats")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["total_bookmarks"], 2);
    assert_eq!(body["categories_bookmarked"], 1);
    assert_eq!(body["by_category"][0]["category"], "Technology");
    assert_eq!(body["by_category"][0]["count"], 2);
}
