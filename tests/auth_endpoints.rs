//! Integration tests for registration, login and session handling.

mod common;

use actix_web::{http::StatusCode, test};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use newsflow_server::services::Claims;
use serde_json::{Value, json};

use common::{TEST_JWT_SECRET, TEST_PASSWORD, bearer, context, init_app, register};

#[actix_web::test]
async fn register_returns_user_and_token() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({
            "email": "  Reader@Example.COM ",
            "password": "secret123",
            "firstName": " Ada ",
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["user"]["email"], "reader@example.com");
    assert_eq!(body["user"]["first_name"], "Ada");
    assert_eq!(body["user"]["theme_preference"], "light");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));

    let sessions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_sessions")
        .fetch_one(&ctx.state.db)
        .await
        .expect("count sessions");
    assert_eq!(sessions, 1);
}

#[actix_web::test]
async fn duplicate_email_is_a_conflict() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    register(&app, "dup@example.com").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "email": "DUP@example.com", "password": "another1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "User with this email already exists");
}

#[actix_web::test]
async fn concurrent_duplicate_registration_is_a_conflict() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;

    let request = || {
        test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({ "email": "race@example.com", "password": "secret123" }))
            .to_request()
    };
    let (first, second) = tokio::join!(
        test::call_service(&app, request()),
        test::call_service(&app, request()),
    );

    let mut statuses = vec![first.status(), second.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind("race@example.com")
        .fetch_one(&ctx.state.db)
        .await
        .expect("count users");
    assert_eq!(users, 1);
}

#[actix_web::test]
async fn register_validation_errors_are_listed() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/register")
        .set_json(json!({ "email": "not-an-email", "password": "123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Validation failed");
    assert!(body["details"].get("email").is_some());
    assert!(body["details"].get("password").is_some());
}

#[actix_web::test]
async fn login_accepts_correct_credentials_only() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    register(&app, "login@example.com").await;

    let wrong = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "login@example.com", "password": "wrong-password" }))
        .to_request();
    let resp = test::call_service(&app, wrong).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid email or password");

    let unknown = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "nobody@example.com", "password": TEST_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, unknown).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let right = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "Login@Example.com", "password": TEST_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, right).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["user"]["email"], "login@example.com");
}

#[actix_web::test]
async fn deactivated_account_cannot_log_in() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    register(&app, "gone@example.com").await;

    sqlx::query("UPDATE users SET is_active = 0 WHERE email = ?")
        .bind("gone@example.com")
        .execute(&ctx.state.db)
        .await
        .expect("deactivate");

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": "gone@example.com", "password": TEST_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Account is deactivated");
}

#[actix_web::test]
async fn me_requires_a_token() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;

    let req = test::TestRequest::get().uri("/api/auth/me").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Access token required");

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer("not.a.jwt"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Invalid token");
}

#[actix_web::test]
async fn expired_token_is_reported_as_expired() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;

    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: 1,
        email: "late@example.com".to_string(),
        iat: now - 7200,
        exp: now - 3600,
        jti: "expired-token".to_string(),
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET.as_bytes()),
    )
    .expect("sign token");

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Token expired");
}

#[actix_web::test]
async fn token_of_deleted_user_is_rejected() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "vanished@example.com").await;

    sqlx::query("DELETE FROM users WHERE email = ?")
        .bind("vanished@example.com")
        .execute(&ctx.state.db)
        .await
        .expect("delete user");

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "User not found or inactive");
}

#[actix_web::test]
async fn me_returns_the_current_user() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "me@example.com").await;

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["user"]["email"], "me@example.com");
    assert_eq!(body["user"]["last_name"], "Lovelace");
}

#[actix_web::test]
async fn logout_removes_the_session_row() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "bye@example.com").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/logout")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Logout successful");

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user_sessions WHERE session_token = ?")
        .bind(&token)
        .fetch_one(&ctx.state.db)
        .await
        .expect("count sessions");
    assert_eq!(remaining, 0);
}

#[actix_web::test]
async fn refresh_moves_the_session_to_a_new_token() {
    let ctx = context().await;
    let app = init_app(&ctx.state).await;
    let token = register(&app, "fresh@example.com").await;

    let req = test::TestRequest::post()
        .uri("/api/auth/refresh")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["message"], "Token refreshed successfully");
    let refreshed = body["token"].as_str().expect("token").to_string();
    assert_ne!(refreshed, token);

    let rows: Vec<String> = sqlx::query_scalar("SELECT session_token FROM user_sessions")
        .fetch_all(&ctx.state.db)
        .await
        .expect("sessions");
    assert_eq!(rows, vec![refreshed]);
}
