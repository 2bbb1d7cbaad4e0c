//! Account registration, login and session management.

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    AppState,
    auth_middleware::AuthMiddleware,
    error::{AppError, AppResult},
    models::{User, UserCredentials},
    services::{IssuedToken, hash_password, verify_password},
};

use super::{client_ip, user_agent};

pub fn configure_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(register))
            .route("/login", web::post().to(login))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me))
            .route("/refresh", web::post().to(refresh)),
    );
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters"))]
    pub last_name: Option<String>,
}

impl RegisterRequest {
    fn normalized(mut self) -> Self {
        self.email = normalize_email(&self.email);
        self.first_name = self.first_name.map(|s| s.trim().to_string());
        self.last_name = self.last_name.map(|s| s.trim().to_string());
        self
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Please provide a valid email"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn create_session(
    db: &SqlitePool,
    user_id: i64,
    issued: &IssuedToken,
    req: &HttpRequest,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_sessions (user_id, session_token, expires_at, ip_address, user_agent, created_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(&issued.token)
    .bind(issued.expires_at)
    .bind(client_ip(req))
    .bind(user_agent(req))
    .bind(Utc::now())
    .execute(db)
    .await?;
    Ok(())
}

/// Creates an account and signs the new user in.
///
/// # Request Body (JSON)
/// ```json
/// { "email": "reader@example.com", "password": "secret1", "firstName": "Ada", "lastName": "L" }
/// ```
///
/// # Responses
/// - `201 Created`: `{ "message", "user", "token" }`
/// - `400 Bad Request`: validation failure
/// - `409 Conflict`: the email is already registered
#[tracing::instrument(skip(state, form, req), fields(email = %form.email))]
pub async fn register(
    state: web::Data<AppState>,
    form: web::Json<RegisterRequest>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let form = form.into_inner().normalized();
    form.validate()?;

    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(&form.email)
        .fetch_optional(&state.db)
        .await?;
    if existing.is_some() {
        return Err(AppError::conflict("User with this email already exists"));
    }

    let password_hash = hash_password(&form.password)?;
    let now = Utc::now();

    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (email, password_hash, first_name, last_name, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&form.email)
    .bind(&password_hash)
    .bind(form.first_name.as_deref().filter(|s| !s.is_empty()))
    .bind(form.last_name.as_deref().filter(|s| !s.is_empty()))
    .bind(now)
    .bind(now)
    .fetch_one(&state.db)
    .await;

    // A concurrent registration can win the race past the lookup above.
    let user_id = match inserted {
        Ok(id) => id,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(AppError::conflict("User with this email already exists"));
        }
        Err(e) => return Err(e.into()),
    };

    let issued = state.tokens.issue(user_id, &form.email)?;
    create_session(&state.db, user_id, &issued, &req).await?;

    let user = User::find(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Internal("registered user vanished".to_string()))?;

    tracing::info!(user_id, "User registered");

    Ok(HttpResponse::Created().json(json!({
        "message": "User registered successfully",
        "user": user,
        "token": issued.token,
    })))
}

/// Verifies credentials and opens a new session.
///
/// Unknown emails and wrong passwords both answer `401 Invalid email or
/// password`; a deactivated account answers `401 Account is deactivated`.
#[tracing::instrument(skip(state, form, req), fields(email = %form.email))]
pub async fn login(
    state: web::Data<AppState>,
    form: web::Json<LoginRequest>,
    req: HttpRequest,
) -> AppResult<HttpResponse> {
    let mut form = form.into_inner();
    form.email = normalize_email(&form.email);
    form.validate()?;

    let credentials: Option<UserCredentials> =
        sqlx::query_as("SELECT id, password_hash, is_active FROM users WHERE email = ?")
            .bind(&form.email)
            .fetch_optional(&state.db)
            .await?;

    let Some(credentials) = credentials else {
        tracing::info!("Login attempt for unknown email");
        return Err(AppError::unauthorized("Invalid email or password"));
    };

    if !credentials.is_active {
        return Err(AppError::unauthorized("Account is deactivated"));
    }

    if !verify_password(&form.password, &credentials.password_hash)? {
        tracing::info!(user_id = credentials.id, "Login attempt with wrong password");
        return Err(AppError::unauthorized("Invalid email or password"));
    }

    let issued = state.tokens.issue(credentials.id, &form.email)?;
    create_session(&state.db, credentials.id, &issued, &req).await?;

    let user = User::find(&state.db, credentials.id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Login successful",
        "user": user,
        "token": issued.token,
    })))
}

/// Revokes the session row of the presented token.
#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn logout(state: web::Data<AppState>, user: AuthMiddleware) -> AppResult<HttpResponse> {
    sqlx::query("DELETE FROM user_sessions WHERE session_token = ?")
        .bind(&user.token)
        .execute(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Logout successful" })))
}

#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn me(state: web::Data<AppState>, user: AuthMiddleware) -> AppResult<HttpResponse> {
    let found = User::find(&state.db, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({ "user": found })))
}

/// Issues a fresh token and moves the caller's session row onto it.
#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn refresh(state: web::Data<AppState>, user: AuthMiddleware) -> AppResult<HttpResponse> {
    let issued = state.tokens.issue(user.user_id, &user.email)?;

    sqlx::query("UPDATE user_sessions SET session_token = ?, expires_at = ? WHERE session_token = ?")
        .bind(&issued.token)
        .bind(issued.expires_at)
        .bind(&user.token)
        .execute(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Token refreshed successfully",
        "token": issued.token,
    })))
}
