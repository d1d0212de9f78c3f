//! Blog routes
//!
//! Public reading of published posts plus the admin editor, the AI writer and
//! the weekly content plan.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireStaff;
use crate::domain::blog::{
    AdminPostFilter, BlogPlanResponse, BlogPost, BlogQuery, CreatePostRequest,
    CreateWeeklyPlanRequest, GeneratePostRequest, PostStatus, PublicPostResponse,
    UpdatePostRequest,
};
use crate::domain::clean;
use crate::error::ApiError;
use crate::services::blog::{self as blog_service, ArticleBrief};
use crate::services::settings;

const DEFAULT_LANG: &str = "uk";

fn lang_of(query: &BlogQuery) -> String {
    query
        .lang
        .as_deref()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or(DEFAULT_LANG)
        .to_lowercase()
}

// =============================================================================
// Public
// =============================================================================

/// GET /blog
///
/// Published posts whose publish date has passed, newest first.
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BlogQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let tag = clean(query.tag.clone()).map(|t| format!("%{}%", t));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM blog_posts
        WHERE status = $1 AND (publish_date IS NULL OR publish_date <= NOW())
          AND ($2::TEXT IS NULL OR tags ILIKE $2)
        "#,
    )
    .bind(PostStatus::Published.to_string())
    .bind(&tag)
    .fetch_one(&state.db)
    .await?;

    let posts = sqlx::query_as::<_, BlogPost>(
        r#"
        SELECT * FROM blog_posts
        WHERE status = $1 AND (publish_date IS NULL OR publish_date <= NOW())
          AND ($2::TEXT IS NULL OR tags ILIKE $2)
        ORDER BY publish_date DESC NULLS LAST, created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(PostStatus::Published.to_string())
    .bind(&tag)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let lang = lang_of(&query);
    let data = posts
        .into_iter()
        .map(|p| PublicPostResponse::new(p, &lang))
        .collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /blog/:slug
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<BlogQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let post = sqlx::query_as::<_, BlogPost>(
        r#"
        UPDATE blog_posts SET views = views + 1
        WHERE slug = $1 AND status = $2 AND (publish_date IS NULL OR publish_date <= NOW())
        RETURNING *
        "#,
    )
    .bind(&slug)
    .bind(PostStatus::Published.to_string())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Post not found"))?;

    Ok(DataResponse::new(PublicPostResponse::new(post, &lang_of(&query))))
}

// =============================================================================
// Admin
// =============================================================================

async fn fetch_post(state: &AppState, id: Uuid) -> Result<BlogPost, ApiError> {
    sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))
}

/// GET /admin/blog
pub async fn admin_list_posts(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<AdminPostFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = filter.status.map(|s| s.to_string());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM blog_posts WHERE ($1::TEXT IS NULL OR status = $1)",
    )
    .bind(&status)
    .fetch_one(&state.db)
    .await?;

    let posts = sqlx::query_as::<_, BlogPost>(
        r#"
        SELECT * FROM blog_posts
        WHERE ($1::TEXT IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&status)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(posts, &pagination, total))
}

/// GET /admin/blog/:id
pub async fn admin_get_post(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(fetch_post(&state, id).await?))
}

/// POST /admin/blog
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }

    let slug_source = clean(req.slug.clone()).unwrap_or_else(|| title.to_string());
    let slug = blog_service::unique_slug(&state.db, &slug_source, None).await?;
    let publish_date = match req.status {
        PostStatus::Published => req.publish_date.or_else(|| Some(Utc::now())),
        _ => req.publish_date,
    };

    let post = sqlx::query_as::<_, BlogPost>(
        r#"
        INSERT INTO blog_posts
            (id, title, slug, excerpt, content, title_en, excerpt_en, content_en,
             title_de, excerpt_de, content_de, featured_image, meta_title, meta_description,
             meta_keywords, tags, category, status, publish_date, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(title)
    .bind(&slug)
    .bind(&req.excerpt)
    .bind(&req.content)
    .bind(&req.title_en)
    .bind(&req.excerpt_en)
    .bind(&req.content_en)
    .bind(&req.title_de)
    .bind(&req.excerpt_de)
    .bind(&req.content_de)
    .bind(&req.featured_image)
    .bind(&req.meta_title)
    .bind(&req.meta_description)
    .bind(&req.meta_keywords)
    .bind(&req.tags)
    .bind(&req.category)
    .bind(req.status.to_string())
    .bind(publish_date)
    .fetch_one(&state.db)
    .await?;

    tracing::info!(post_id = %post.id, slug = %post.slug, "Blog post created");
    Ok(Created(post))
}

/// PUT /admin/blog/:id
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = fetch_post(&state, id).await?;

    if req.title.as_deref().map_or(false, |t| t.trim().is_empty()) {
        return Err(ApiError::bad_request("Title cannot be empty"));
    }
    let slug = match clean(req.slug.clone()) {
        Some(s) if s != current.slug => Some(blog_service::unique_slug(&state.db, &s, Some(id)).await?),
        _ => None,
    };
    let publish_date = match req.status {
        Some(PostStatus::Published) if req.publish_date.is_none() && current.publish_date.is_none() => {
            Some(Utc::now())
        }
        _ => req.publish_date,
    };

    let post = sqlx::query_as::<_, BlogPost>(
        r#"
        UPDATE blog_posts SET
            title = COALESCE($2, title),
            slug = COALESCE($3, slug),
            excerpt = COALESCE($4, excerpt),
            content = COALESCE($5, content),
            title_en = COALESCE($6, title_en),
            excerpt_en = COALESCE($7, excerpt_en),
            content_en = COALESCE($8, content_en),
            title_de = COALESCE($9, title_de),
            excerpt_de = COALESCE($10, excerpt_de),
            content_de = COALESCE($11, content_de),
            featured_image = COALESCE($12, featured_image),
            meta_title = COALESCE($13, meta_title),
            meta_description = COALESCE($14, meta_description),
            meta_keywords = COALESCE($15, meta_keywords),
            tags = COALESCE($16, tags),
            category = COALESCE($17, category),
            status = COALESCE($18, status),
            publish_date = COALESCE($19, publish_date),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.title.as_deref().map(str::trim))
    .bind(&slug)
    .bind(&req.excerpt)
    .bind(&req.content)
    .bind(&req.title_en)
    .bind(&req.excerpt_en)
    .bind(&req.content_en)
    .bind(&req.title_de)
    .bind(&req.excerpt_de)
    .bind(&req.content_de)
    .bind(&req.featured_image)
    .bind(&req.meta_title)
    .bind(&req.meta_description)
    .bind(&req.meta_keywords)
    .bind(&req.tags)
    .bind(&req.category)
    .bind(req.status.map(|s| s.to_string()))
    .bind(publish_date)
    .fetch_one(&state.db)
    .await?;

    Ok(DataResponse::new(post))
}

/// DELETE /admin/blog/:id
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Post not found"));
    }
    tracing::info!(post_id = %id, "Blog post deleted");
    Ok(NoContent)
}

// =============================================================================
// AI writer
// =============================================================================

/// POST /admin/blog/generate
pub async fn generate_post(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Json(req): Json<GeneratePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.topic.trim().is_empty() {
        return Err(ApiError::bad_request("Topic is required"));
    }
    let ai = state.ai()?;
    let ai_settings = settings::ai_settings(&state.db).await?;
    if !ai_settings.blogger_enabled {
        return Err(ApiError::forbidden("The AI blogger is disabled"));
    }

    let post =
        blog_service::write_post(&state.db, ai, &ai_settings, &ArticleBrief::from(&req)).await?;
    Ok(Created(post))
}

#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    #[serde(default)]
    pub date: Option<chrono::NaiveDate>,
}

/// POST /admin/blog/plans
///
/// Up to seven topics, one per day from `start_date` (default today).
pub async fn create_plan(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Json(req): Json<CreateWeeklyPlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.topics.iter().all(|t| t.topic.trim().is_empty()) {
        return Err(ApiError::bad_request("At least one topic is required"));
    }
    let today = Utc::now().date_naive();
    let start = req.start_date.unwrap_or(today);
    let plans = blog_service::create_weekly_plan(&state.db, &req, start).await?;

    Ok(Created(
        plans
            .into_iter()
            .map(|p| BlogPlanResponse::new(p, today))
            .collect::<Vec<_>>(),
    ))
}

/// GET /admin/blog/plans/week
pub async fn week_plan(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(query): Query<WeekQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let today = Utc::now().date_naive();
    let plans = blog_service::week_plans(&state.db, query.date.unwrap_or(today)).await?;
    Ok(DataResponse::new(
        plans
            .into_iter()
            .map(|p| BlogPlanResponse::new(p, today))
            .collect::<Vec<_>>(),
    ))
}

/// POST /admin/blog/plans/generate-due
pub async fn generate_due(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let ai = state.ai()?;
    let ai_settings = settings::ai_settings(&state.db).await?;
    if !ai_settings.blogger_enabled {
        return Err(ApiError::forbidden("The AI blogger is disabled"));
    }

    let results =
        blog_service::generate_due(&state.db, ai, &ai_settings, Utc::now().date_naive()).await?;
    Ok(DataResponse::new(results))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_defaults_to_ukrainian() {
        assert_eq!(lang_of(&BlogQuery::default()), "uk");
        let query = BlogQuery {
            lang: Some(" EN ".into()),
            tag: None,
        };
        assert_eq!(lang_of(&query), "en");
    }
}
