//! Profile, password, preference and account endpoints for the signed-in user.

use std::collections::BTreeMap;

use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::{FromRow, SqlitePool};
use validator::{Validate, ValidationError};

use crate::{
    AppState,
    auth_middleware::{AuthMiddleware, record_activity},
    error::{AppError, AppResult},
    models::{User, UserCredentials},
    services::{hash_password, verify_password},
};

use super::auth::normalize_email;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 100;
const POPULAR_SEARCHES: i64 = 10;

pub fn configure_user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("/profile", web::get().to(get_profile))
            .route("/profile", web::put().to(update_profile))
            .route("/password", web::put().to(change_password))
            .route("/preferences", web::get().to(get_preferences))
            .route("/preferences", web::put().to(update_preferences))
            .route("/search-history", web::get().to(get_search_history))
            .route("/account", web::delete().to(delete_account)),
    );
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50, message = "First name must be 1-50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 50, message = "Last name must be 1-50 characters"))]
    pub last_name: Option<String>,
    #[validate(email(message = "Please provide a valid email"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must be at least 6 characters long"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Password confirmation does not match"))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePreferencesRequest {
    pub theme: Option<Theme>,
    pub preferences: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHistoryQuery {
    pub limit: Option<String>,
}

fn confirm_delete(value: &str) -> Result<(), ValidationError> {
    if value == "DELETE" {
        Ok(())
    } else {
        let mut err = ValidationError::new("confirmation");
        err.message = Some("Please type DELETE to confirm".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteAccountRequest {
    #[validate(length(min = 1, message = "Password is required to delete account"))]
    pub password: String,
    #[validate(custom(function = "confirm_delete"))]
    pub confirmation: String,
}

#[derive(Debug, Serialize, FromRow)]
struct ProfileStats {
    bookmark_count: i64,
    search_count: i64,
    active_sessions: i64,
}

#[derive(Debug, Serialize, FromRow)]
struct SearchEntry {
    search_query: String,
    created_at: DateTime<Utc>,
    results_count: Option<i64>,
}

#[derive(Debug, Serialize, FromRow)]
struct PopularSearch {
    search_query: String,
    count: i64,
}

/// Clamps the `limit` query parameter; unparsable or non-positive values
/// fall back to the default.
fn history_limit(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT)
}

async fn credentials(db: &SqlitePool, user_id: i64) -> AppResult<UserCredentials> {
    sqlx::query_as("SELECT id, password_hash, is_active FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
}

async fn load_preferences(db: &SqlitePool, user_id: i64) -> Result<(String, BTreeMap<String, Value>), sqlx::Error> {
    let theme: Option<String> = sqlx::query_scalar("SELECT theme_preference FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(db)
        .await?;

    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT preference_key, preference_value FROM user_preferences WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let preferences = rows
        .into_iter()
        .map(|(key, raw)| {
            let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
            (key, value)
        })
        .collect();

    Ok((theme.unwrap_or_else(|| Theme::Light.as_str().to_string()), preferences))
}

/// The caller's profile with bookmark, search and session counts.
#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn get_profile(state: web::Data<AppState>, user: AuthMiddleware) -> AppResult<HttpResponse> {
    record_activity(&state.db, user.user_id).await;

    let profile = User::find(&state.db, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let stats: ProfileStats = sqlx::query_as(
        "SELECT \
            (SELECT COUNT(*) FROM bookmarks WHERE user_id = ?1) AS bookmark_count, \
            (SELECT COUNT(*) FROM search_history WHERE user_id = ?1) AS search_count, \
            (SELECT COUNT(*) FROM user_sessions WHERE user_id = ?1 AND expires_at > ?2) AS active_sessions",
    )
    .bind(user.user_id)
    .bind(Utc::now())
    .fetch_one(&state.db)
    .await?;

    let mut body = serde_json::to_value(&profile)
        .map_err(|e| AppError::Internal(format!("profile serialization failed: {e}")))?;
    body["stats"] = serde_json::to_value(&stats)
        .map_err(|e| AppError::Internal(format!("stats serialization failed: {e}")))?;

    Ok(HttpResponse::Ok().json(json!({ "user": body })))
}

/// Updates any of first name, last name and email.
///
/// # Responses
/// - `200 OK`: `{ "message", "user" }`
/// - `400 Bad Request`: validation failure or an empty body
/// - `409 Conflict`: the email belongs to another account
#[tracing::instrument(skip(state, user, form), fields(user_id = user.user_id))]
pub async fn update_profile(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    form: web::Json<UpdateProfileRequest>,
) -> AppResult<HttpResponse> {
    let mut form = form.into_inner();
    form.first_name = form.first_name.map(|s| s.trim().to_string());
    form.last_name = form.last_name.map(|s| s.trim().to_string());
    form.email = form.email.map(|s| normalize_email(&s));
    form.validate()?;

    record_activity(&state.db, user.user_id).await;

    if let Some(email) = &form.email {
        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ? AND id != ?")
            .bind(email)
            .bind(user.user_id)
            .fetch_optional(&state.db)
            .await?;
        if taken.is_some() {
            return Err(AppError::conflict("Email already in use"));
        }
    }

    if form.first_name.is_none() && form.last_name.is_none() && form.email.is_none() {
        return Err(AppError::bad_request("No valid fields to update"));
    }

    sqlx::query(
        "UPDATE users SET \
            first_name = COALESCE(?, first_name), \
            last_name = COALESCE(?, last_name), \
            email = COALESCE(?, email), \
            updated_at = ? \
         WHERE id = ?",
    )
    .bind(&form.first_name)
    .bind(&form.last_name)
    .bind(&form.email)
    .bind(Utc::now())
    .bind(user.user_id)
    .execute(&state.db)
    .await?;

    let updated = User::find(&state.db, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Profile updated successfully",
        "user": updated,
    })))
}

/// Changes the password and signs out every other session.
#[tracing::instrument(skip(state, user, form), fields(user_id = user.user_id))]
pub async fn change_password(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    form: web::Json<ChangePasswordRequest>,
) -> AppResult<HttpResponse> {
    form.validate()?;
    record_activity(&state.db, user.user_id).await;

    let stored = credentials(&state.db, user.user_id).await?;
    if !verify_password(&form.current_password, &stored.password_hash)? {
        return Err(AppError::unauthorized("Current password is incorrect"));
    }

    let new_hash = hash_password(&form.new_password)?;

    let mut tx = state.db.begin().await?;
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(&new_hash)
        .bind(Utc::now())
        .bind(user.user_id)
        .execute(&mut *tx)
        .await?;
    let revoked = sqlx::query("DELETE FROM user_sessions WHERE user_id = ? AND session_token != ?")
        .bind(user.user_id)
        .bind(&user.token)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;

    tracing::info!(revoked, "Password changed");

    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed successfully" })))
}

#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn get_preferences(state: web::Data<AppState>, user: AuthMiddleware) -> AppResult<HttpResponse> {
    let (theme, preferences) = load_preferences(&state.db, user.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "theme": theme, "preferences": preferences })))
}

/// Sets the theme and upserts free-form preferences. Each value is stored
/// as JSON text and returned decoded.
#[tracing::instrument(skip(state, user, form), fields(user_id = user.user_id))]
pub async fn update_preferences(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    form: web::Json<UpdatePreferencesRequest>,
) -> AppResult<HttpResponse> {
    record_activity(&state.db, user.user_id).await;
    let form = form.into_inner();
    let now = Utc::now();

    let mut tx = state.db.begin().await?;

    if let Some(theme) = form.theme {
        sqlx::query("UPDATE users SET theme_preference = ?, updated_at = ? WHERE id = ?")
            .bind(theme.as_str())
            .bind(now)
            .bind(user.user_id)
            .execute(&mut *tx)
            .await?;
    }

    for (key, value) in form.preferences.unwrap_or_default() {
        sqlx::query(
            "INSERT INTO user_preferences (user_id, preference_key, preference_value, updated_at) \
             VALUES (?, ?, ?, ?) \
             ON CONFLICT(user_id, preference_key) DO UPDATE SET \
               preference_value = excluded.preference_value, \
               updated_at = excluded.updated_at",
        )
        .bind(user.user_id)
        .bind(&key)
        .bind(value.to_string())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let (theme, preferences) = load_preferences(&state.db, user.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Preferences updated successfully",
        "theme": theme,
        "preferences": preferences,
    })))
}

#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn get_search_history(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    query: web::Query<SearchHistoryQuery>,
) -> AppResult<HttpResponse> {
    let limit = history_limit(query.limit.as_deref());

    let recent: Vec<SearchEntry> = sqlx::query_as(
        "SELECT search_query, created_at, results_count FROM search_history \
         WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user.user_id)
    .bind(limit)
    .fetch_all(&state.db)
    .await?;

    let popular: Vec<PopularSearch> = sqlx::query_as(
        "SELECT search_query, COUNT(*) AS count FROM search_history \
         WHERE user_id = ? GROUP BY search_query ORDER BY count DESC, search_query LIMIT ?",
    )
    .bind(user.user_id)
    .bind(POPULAR_SEARCHES)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({ "recent": recent, "popular": popular })))
}

/// Deletes the account after re-checking the password. Sessions, bookmarks,
/// preferences and search history go with it.
#[tracing::instrument(skip(state, user, form), fields(user_id = user.user_id))]
pub async fn delete_account(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    form: web::Json<DeleteAccountRequest>,
) -> AppResult<HttpResponse> {
    form.validate()?;

    let stored = credentials(&state.db, user.user_id).await?;
    if !verify_password(&form.password, &stored.password_hash)? {
        return Err(AppError::unauthorized("Incorrect password"));
    }

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(stored.id)
        .execute(&state.db)
        .await?;

    tracing::info!("Account deleted");

    Ok(HttpResponse::Ok().json(json!({ "message": "Account deleted successfully" })))
}
