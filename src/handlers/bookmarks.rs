//! Bookmark endpoints. Every route requires a signed-in user and only ever
//! touches that user's rows.

use actix_web::{HttpResponse, web};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, SqlitePool};
use validator::{Validate, ValidationError};

use crate::{
    AppState,
    auth_middleware::{AuthMiddleware, record_activity},
    error::{AppError, AppResult},
    models::BookmarkView,
};

/// Category assigned to articles that enter the store through a bookmark.
const DEFAULT_CATEGORY_ID: i64 = 1;

const BOOKMARK_VIEW_SQL: &str = "SELECT \
        b.id AS bookmark_id, \
        b.created_at AS bookmarked_at, \
        b.notes, \
        a.id AS article_id, \
        a.title, a.description, a.url, a.image_url, a.source_name, a.author, a.published_at, \
        c.display_name AS category_name \
    FROM bookmarks b \
    JOIN articles a ON b.article_id = a.id \
    LEFT JOIN categories c ON a.category_id = c.id";

pub fn configure_bookmark_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/bookmarks")
            .route("", web::get().to(list_bookmarks))
            .route("", web::post().to(add_bookmark))
            .route("/stats", web::get().to(bookmark_stats))
            .route("/check/{encoded_url:.*}", web::get().to(check_bookmark))
            .route("/url/{encoded_url:.*}", web::delete().to(remove_bookmark_by_url))
            .route("/{id}", web::put().to(update_bookmark))
            .route("/{id}", web::delete().to(remove_bookmark)),
    );
}

fn validate_iso8601(value: &str) -> Result<(), ValidationError> {
    let parses = DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok();

    if parses {
        Ok(())
    } else {
        let mut err = ValidationError::new("iso8601");
        err.message = Some("Published date must be valid ISO date".into());
        Err(err)
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddBookmarkRequest {
    #[validate(url(message = "Valid article URL is required"))]
    pub article_url: String,
    #[validate(length(min = 1, message = "Article title is required"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(url(message = "Image URL must be valid"))]
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub author: Option<String>,
    #[validate(custom(function = "validate_iso8601"))]
    pub published_at: Option<String>,
    #[validate(length(max = 1000, message = "Notes must be less than 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBookmarkRequest {
    #[validate(length(max = 1000, message = "Notes must be less than 1000 characters"))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, FromRow)]
struct BookmarkTotals {
    total_bookmarks: i64,
    categories_bookmarked: i64,
    first_bookmark: Option<DateTime<Utc>>,
    latest_bookmark: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, FromRow)]
struct CategoryCount {
    category: String,
    count: i64,
}

/// Empty strings from form fields mean "not provided".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn decode_article_url(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}

async fn find_bookmark(db: &SqlitePool, bookmark_id: i64) -> Result<Option<BookmarkView>, sqlx::Error> {
    sqlx::query_as(&format!("{BOOKMARK_VIEW_SQL} WHERE b.id = ?"))
        .bind(bookmark_id)
        .fetch_optional(db)
        .await
}

async fn owned_bookmark_id(db: &SqlitePool, bookmark_id: i64, user_id: i64) -> AppResult<i64> {
    sqlx::query_scalar("SELECT id FROM bookmarks WHERE id = ? AND user_id = ?")
        .bind(bookmark_id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found("Bookmark not found"))
}

/// Reuses the stored article for `form.article_url`, or stores a new one.
async fn find_or_create_article(db: &SqlitePool, form: &AddBookmarkRequest) -> Result<i64, sqlx::Error> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM articles WHERE url = ?")
        .bind(&form.article_url)
        .fetch_optional(db)
        .await?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let now = Utc::now();
    let published_at = form.published_at.clone().unwrap_or_else(|| now.to_rfc3339());

    sqlx::query_scalar(
        "INSERT INTO articles \
         (title, description, url, image_url, source_name, author, published_at, category_id, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&form.title)
    .bind(&form.description)
    .bind(&form.article_url)
    .bind(&form.image_url)
    .bind(&form.source_name)
    .bind(&form.author)
    .bind(published_at)
    .bind(DEFAULT_CATEGORY_ID)
    .bind(now)
    .bind(now)
    .fetch_one(db)
    .await
}

#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn list_bookmarks(state: web::Data<AppState>, user: AuthMiddleware) -> AppResult<HttpResponse> {
    record_activity(&state.db, user.user_id).await;

    let bookmarks: Vec<BookmarkView> =
        sqlx::query_as(&format!("{BOOKMARK_VIEW_SQL} WHERE b.user_id = ? ORDER BY b.created_at DESC, b.id DESC"))
            .bind(user.user_id)
            .fetch_all(&state.db)
            .await?;

    Ok(HttpResponse::Ok().json(json!({
        "total": bookmarks.len(),
        "bookmarks": bookmarks,
    })))
}

/// Bookmarks an article, storing the article first if it is not known yet.
///
/// # Responses
/// - `201 Created`: `{ "message", "bookmark" }`
/// - `400 Bad Request`: validation failure
/// - `409 Conflict`: the article is already bookmarked by this user
#[tracing::instrument(skip(state, user, form), fields(user_id = user.user_id, url = %form.article_url))]
pub async fn add_bookmark(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    form: web::Json<AddBookmarkRequest>,
) -> AppResult<HttpResponse> {
    form.validate()?;
    record_activity(&state.db, user.user_id).await;

    let mut form = form.into_inner();
    form.description = non_empty(form.description);
    form.image_url = non_empty(form.image_url);
    form.source_name = non_empty(form.source_name);
    form.author = non_empty(form.author);
    form.published_at = non_empty(form.published_at);

    let article_id = find_or_create_article(&state.db, &form).await?;

    let already: Option<i64> =
        sqlx::query_scalar("SELECT id FROM bookmarks WHERE user_id = ? AND article_id = ?")
            .bind(user.user_id)
            .bind(article_id)
            .fetch_optional(&state.db)
            .await?;
    if already.is_some() {
        return Err(AppError::conflict("Article already bookmarked"));
    }

    let inserted = sqlx::query_scalar::<_, i64>(
        "INSERT INTO bookmarks (user_id, article_id, notes, created_at) VALUES (?, ?, ?, ?) RETURNING id",
    )
    .bind(user.user_id)
    .bind(article_id)
    .bind(non_empty(form.notes))
    .bind(Utc::now())
    .fetch_one(&state.db)
    .await;

    let bookmark_id = match inserted {
        Ok(id) => id,
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(AppError::conflict("Article already bookmarked"));
        }
        Err(e) => return Err(e.into()),
    };

    let bookmark = find_bookmark(&state.db, bookmark_id)
        .await?
        .ok_or_else(|| AppError::Internal("created bookmark vanished".to_string()))?;

    tracing::info!(bookmark_id, article_id, "Bookmark added");

    Ok(HttpResponse::Created().json(json!({
        "message": "Bookmark added successfully",
        "bookmark": bookmark,
    })))
}

#[tracing::instrument(skip(state, user, form), fields(user_id = user.user_id))]
pub async fn update_bookmark(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    path: web::Path<i64>,
    form: web::Json<UpdateBookmarkRequest>,
) -> AppResult<HttpResponse> {
    form.validate()?;
    record_activity(&state.db, user.user_id).await;

    let bookmark_id = owned_bookmark_id(&state.db, path.into_inner(), user.user_id).await?;

    sqlx::query("UPDATE bookmarks SET notes = ? WHERE id = ?")
        .bind(non_empty(form.into_inner().notes))
        .bind(bookmark_id)
        .execute(&state.db)
        .await?;

    let bookmark = find_bookmark(&state.db, bookmark_id)
        .await?
        .ok_or_else(|| AppError::not_found("Bookmark not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Bookmark updated successfully",
        "bookmark": bookmark,
    })))
}

#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn remove_bookmark(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    record_activity(&state.db, user.user_id).await;

    let bookmark_id = owned_bookmark_id(&state.db, path.into_inner(), user.user_id).await?;

    sqlx::query("DELETE FROM bookmarks WHERE id = ?")
        .bind(bookmark_id)
        .execute(&state.db)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Bookmark removed successfully" })))
}

/// Removes the caller's bookmark of the article at a percent-encoded URL.
#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn remove_bookmark_by_url(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    record_activity(&state.db, user.user_id).await;
    let article_url = decode_article_url(&path);

    let removed = sqlx::query(
        "DELETE FROM bookmarks WHERE user_id = ? AND article_id IN (SELECT id FROM articles WHERE url = ?)",
    )
    .bind(user.user_id)
    .bind(&article_url)
    .execute(&state.db)
    .await?
    .rows_affected();

    if removed == 0 {
        return Err(AppError::not_found("Bookmark not found"));
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Bookmark removed successfully" })))
}

#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn check_bookmark(
    state: web::Data<AppState>,
    user: AuthMiddleware,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let article_url = decode_article_url(&path);

    let bookmark_id: Option<i64> = sqlx::query_scalar(
        "SELECT b.id FROM bookmarks b JOIN articles a ON b.article_id = a.id \
         WHERE b.user_id = ? AND a.url = ?",
    )
    .bind(user.user_id)
    .bind(&article_url)
    .fetch_optional(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "isBookmarked": bookmark_id.is_some(),
        "bookmarkId": bookmark_id,
    })))
}

#[tracing::instrument(skip(state, user), fields(user_id = user.user_id))]
pub async fn bookmark_stats(state: web::Data<AppState>, user: AuthMiddleware) -> AppResult<HttpResponse> {
    let totals: BookmarkTotals = sqlx::query_as(
        "SELECT \
            COUNT(*) AS total_bookmarks, \
            COUNT(DISTINCT a.category_id) AS categories_bookmarked, \
            MIN(b.created_at) AS first_bookmark, \
            MAX(b.created_at) AS latest_bookmark \
         FROM bookmarks b JOIN articles a ON b.article_id = a.id \
         WHERE b.user_id = ?",
    )
    .bind(user.user_id)
    .fetch_one(&state.db)
    .await?;

    let by_category: Vec<CategoryCount> = sqlx::query_as(
        "SELECT c.display_name AS category, COUNT(*) AS count \
         FROM bookmarks b \
         JOIN articles a ON b.article_id = a.id \
         JOIN categories c ON a.category_id = c.id \
         WHERE b.user_id = ? \
         GROUP BY c.id, c.display_name \
         ORDER BY count DESC",
    )
    .bind(user.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(HttpResponse::Ok().json(json!({
        "total_bookmarks": totals.total_bookmarks,
        "categories_bookmarked": totals.categories_bookmarked,
        "first_bookmark": totals.first_bookmark,
        "latest_bookmark": totals.latest_bookmark,
        "by_category": by_category,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iso_dates_are_accepted() {
        assert!(validate_iso8601("2024-03-15T10:00:00Z").is_ok());
        assert!(validate_iso8601("2024-03-15T10:00:00.250+05:30").is_ok());
        assert!(validate_iso8601("2024-03-15").is_ok());
        assert!(validate_iso8601("15/03/2024").is_err());
    }

    #[test]
    fn add_request_rejects_bad_urls_and_long_notes() {
        let form = AddBookmarkRequest {
            article_url: "not a url".into(),
            title: String::new(),
            description: None,
            image_url: Some("also not a url".into()),
            source_name: None,
            author: None,
            published_at: Some("yesterday".into()),
            notes: Some("n".repeat(1001)),
        };
        let errors = form.validate().unwrap_err();
        let fields = errors.field_errors();
        for field in ["article_url", "title", "image_url", "published_at", "notes"] {
            assert!(fields.contains_key(field), "{field}");
        }
    }

    #[test]
    fn encoded_urls_decode() {
        assert_eq!(
            decode_article_url("https%3A%2F%2Fnews.example.org%2Fstory%3Fid%3D7"),
            "https://news.example.org/story?id=7"
        );
    }
}
