//! Admin order management

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::PaginationMeta;
use crate::api::{DataResponse, NoContent, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireStaff;
use crate::domain::clean;
use crate::domain::orders::{
    Order, OrderListFilter, OrderStats, UpdateOrderNotesRequest, UpdateOrderStatusRequest,
};
use crate::error::ApiError;
use crate::routes::admin::order_stats;
use crate::services::orders;

#[derive(Serialize)]
pub struct OrderListResponse {
    pub data: Vec<Order>,
    pub stats: OrderStats,
    pub pagination: PaginationMeta,
}

/// GET /admin/orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<OrderListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = filter.status.map(|s| s.to_string());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM orders WHERE ($1::TEXT IS NULL OR status = $1)",
    )
    .bind(&status)
    .fetch_one(&state.db)
    .await?;

    let orders = sqlx::query_as::<_, Order>(
        r#"
        SELECT * FROM orders
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

    Ok(Json(OrderListResponse {
        data: orders,
        stats: order_stats(&state.db).await?,
        pagination: PaginationMeta::new(&pagination, total.max(0) as u64),
    }))
}

/// GET /admin/orders/:id
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = orders::fetch_detail(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(DataResponse::new(detail))
}

/// POST /admin/orders/:id/status
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let tracking = clean(req.tracking_number);
    let order = orders::set_status(&state.db, id, req.status, tracking.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    tracing::info!(
        order_id = %order.id,
        status = %order.status,
        admin_id = %staff.user_id,
        "Order status changed"
    );
    Ok(DataResponse::new(order))
}

/// POST /admin/orders/:id/notes
pub async fn update_notes(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderNotesRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = sqlx::query_as::<_, Order>(
        "UPDATE orders SET admin_notes = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(clean(req.admin_notes))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(DataResponse::new(order))
}

/// DELETE /admin/orders/:id
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Order not found"));
    }
    tracing::info!(order_id = %id, admin_id = %staff.user_id, "Order deleted");
    Ok(NoContent)
}
