//! Contact form and its admin inbox

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::PaginationMeta;
use crate::api::{Created, MessageResponse, NoContent, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireStaff;
use crate::domain::clean;
use crate::domain::site::{ContactListFilter, ContactMessage, ContactStats, CreateContactRequest};
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ContactListResponse {
    pub data: Vec<ContactMessage>,
    pub stats: ContactStats,
    pub pagination: PaginationMeta,
}

/// POST /contact
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::BadRequest)?;

    let message = sqlx::query_as::<_, ContactMessage>(
        r#"
        INSERT INTO contact_messages (id, name, email, phone, subject, message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.name.trim())
    .bind(req.email.trim().to_lowercase())
    .bind(clean(req.phone))
    .bind(clean(req.subject))
    .bind(req.message.trim())
    .fetch_one(&state.db)
    .await?;

    tracing::info!(contact_id = %message.id, "Contact message received");
    Ok(Created(MessageResponse::new("Thank you! We will get back to you soon.")))
}

// =============================================================================
// Admin
// =============================================================================

/// GET /admin/contacts
pub async fn list(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<ContactListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = sqlx::query_as::<_, ContactStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE NOT is_read) AS unread,
            COUNT(*) FILTER (WHERE created_at >= CURRENT_DATE) AS today
        FROM contact_messages
        "#,
    )
    .fetch_one(&state.db)
    .await?;

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM contact_messages WHERE ($1::BOOLEAN IS NULL OR is_read = NOT $1)",
    )
    .bind(filter.unread)
    .fetch_one(&state.db)
    .await?;

    let messages = sqlx::query_as::<_, ContactMessage>(
        r#"
        SELECT * FROM contact_messages
        WHERE ($1::BOOLEAN IS NULL OR is_read = NOT $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(filter.unread)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ContactListResponse {
        data: messages,
        stats,
        pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
    }))
}

/// POST /admin/contacts/:id/read
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = sqlx::query("UPDATE contact_messages SET is_read = TRUE WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Message not found"));
    }
    Ok(MessageResponse::new("Marked as read"))
}

/// DELETE /admin/contacts/:id
pub async fn delete(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = sqlx::query("DELETE FROM contact_messages WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Message not found"));
    }
    Ok(NoContent)
}

/// POST /admin/contacts/read-all
pub async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let updated = sqlx::query("UPDATE contact_messages SET is_read = TRUE WHERE NOT is_read")
        .execute(&state.db)
        .await?;
    Ok(MessageResponse::new(format!(
        "{} messages marked as read",
        updated.rows_affected()
    )))
}

/// DELETE /admin/contacts/read
pub async fn delete_read(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = sqlx::query("DELETE FROM contact_messages WHERE is_read")
        .execute(&state.db)
        .await?;
    tracing::info!(deleted = deleted.rows_affected(), "Read contact messages deleted");
    Ok(MessageResponse::new(format!(
        "{} messages deleted",
        deleted.rows_affected()
    )))
}
