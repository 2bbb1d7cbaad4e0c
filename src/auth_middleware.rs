//! Session-token extractors.
//!
//! # Overview
//! [`AuthMiddleware`] is an Actix Web extractor that rejects the request
//! unless it carries a valid `Authorization: Bearer <token>` header for an
//! active user. [`OptionalAuth`] never rejects; it resolves to `None` unless
//! the token verifies, its session row is still live, and the user is active.
//!
//! # Usage
//! Add `user: AuthMiddleware` (or `user: OptionalAuth`) to a handler's
//! arguments to receive the caller's [`UserContext`].
//!
//! # Errors
//! `AuthMiddleware` answers 401 with `Access token required`, `Invalid token`,
//! `Token expired`, or `User not found or inactive`.

use std::ops::Deref;

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::SqlitePool;
use tracing::Span;

use crate::{AppState, error::AppError};

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: i64,
    pub email: String,
    /// Id of the live session row for this token, if one exists.
    pub session_id: Option<i64>,
    /// The raw bearer token, needed to find the caller's own session row.
    pub token: String,
}

/// Extractor for routes that require a signed-in user.
#[derive(Debug, Clone)]
pub struct AuthMiddleware(pub UserContext);

impl Deref for AuthMiddleware {
    type Target = UserContext;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extractor for routes that personalise their output when a user is known.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<UserContext>);

impl Deref for OptionalAuth {
    type Target = Option<UserContext>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

impl FromRequest for AuthMiddleware {
    type Error = actix_web::Error;
    type Future = BoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let state =
                state.ok_or_else(|| AppError::Internal("AppState missing".to_string()))?;

            let token = token.ok_or_else(|| {
                tracing::debug!("No bearer token present in request");
                AppError::MissingToken
            })?;

            let claims = state.tokens.verify(&token)?;

            let active: Option<i64> =
                sqlx::query_scalar("SELECT id FROM users WHERE id = ? AND is_active = 1")
                    .bind(claims.sub)
                    .fetch_optional(&state.db)
                    .await
                    .map_err(AppError::from)?;

            if active.is_none() {
                tracing::warn!(user_id = claims.sub, "Token for missing or inactive user");
                return Err(AppError::unauthorized("User not found or inactive").into());
            }

            // A missing session row does not reject the request.
            let session_id: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM user_sessions WHERE session_token = ? AND expires_at > ?",
            )
            .bind(&token)
            .bind(Utc::now())
            .fetch_optional(&state.db)
            .await
            .map_err(AppError::from)?;

            Span::current().record("user_id", claims.sub);
            tracing::debug!(user_id = claims.sub, ?session_id, "User authenticated");

            Ok(AuthMiddleware(UserContext {
                user_id: claims.sub,
                email: claims.email,
                session_id,
                token,
            }))
        })
    }
}

impl FromRequest for OptionalAuth {
    type Error = actix_web::Error;
    type Future = BoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req);

        Box::pin(async move {
            let (Some(state), Some(token)) = (state, token) else {
                return Ok(OptionalAuth(None));
            };

            let Ok(claims) = state.tokens.verify(&token) else {
                tracing::debug!("Ignoring invalid token on optional-auth route");
                return Ok(OptionalAuth(None));
            };

            let session = sqlx::query_as::<_, (i64, bool)>(
                "SELECT s.id, u.is_active FROM user_sessions s \
                 JOIN users u ON s.user_id = u.id \
                 WHERE s.session_token = ? AND s.expires_at > ?",
            )
            .bind(&token)
            .bind(Utc::now())
            .fetch_optional(&state.db)
            .await;

            let user = match session {
                Ok(Some((session_id, true))) => {
                    Span::current().record("user_id", claims.sub);
                    Some(UserContext {
                        user_id: claims.sub,
                        email: claims.email,
                        session_id: Some(session_id),
                        token,
                    })
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::error!(error = %e, "Session lookup failed");
                    None
                }
            };

            Ok(OptionalAuth(user))
        })
    }
}

/// Marks the user as recently active. Failures are logged, never surfaced.
pub async fn record_activity(db: &SqlitePool, user_id: i64) {
    let result = sqlx::query("UPDATE users SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(user_id)
        .execute(db)
        .await;

    if let Err(e) = result {
        tracing::error!(user_id, error = %e, "Activity logging failed");
    }
}
