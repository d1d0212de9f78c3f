//! Admin dashboard and settings
//!
//! Every route here requires a staff token (`admin` or `manager`).

use axum::{extract::State, response::IntoResponse, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::RequireStaff;
use crate::domain::ai::UpdateAiSettingsRequest;
use crate::domain::orders::{Order, OrderStats};
use crate::domain::site::UpdateSiteSettingsRequest;
use crate::error::ApiError;
use crate::services::cache::keys;
use crate::services::settings;

const RECENT_ORDERS: i64 = 10;
const TOP_PRODUCTS: i64 = 10;
const REVENUE_DAYS: i32 = 30;

/// Paid-like statuses, as stored.
pub(crate) const PAID_STATUSES: &str = "('paid', 'processing', 'shipped', 'delivered')";

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DashboardCounters {
    pub products: i64,
    pub active_products: i64,
    pub low_stock_products: i64,
    pub categories: i64,
    pub orders_today: i64,
    pub pending_orders: i64,
    pub orders_to_ship: i64,
    pub revenue_today: Decimal,
    pub revenue_month: Decimal,
    pub customers: i64,
    pub partners_pending: i64,
    pub unread_alerts: i64,
    pub unread_contacts: i64,
}

#[derive(Serialize)]
pub struct DashboardResponse {
    pub counters: DashboardCounters,
    pub recent_orders: Vec<Order>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DailyRevenue {
    pub day: chrono::NaiveDate,
    pub orders: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct TopProduct {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub quantity: i64,
    pub revenue: Decimal,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub orders: OrderStats,
    pub by_status: Vec<StatusCount>,
    pub daily_revenue: Vec<DailyRevenue>,
    pub top_products: Vec<TopProduct>,
}

// =============================================================================
// Dashboard
// =============================================================================

/// GET /admin/dashboard
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let counters = sqlx::query_as::<_, DashboardCounters>(&format!(
        r#"
        SELECT
            (SELECT COUNT(*) FROM products) AS products,
            (SELECT COUNT(*) FROM products WHERE is_active) AS active_products,
            (SELECT COUNT(*) FROM products WHERE is_active AND stock <= min_stock) AS low_stock_products,
            (SELECT COUNT(*) FROM categories) AS categories,
            (SELECT COUNT(*) FROM orders WHERE created_at >= CURRENT_DATE) AS orders_today,
            (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders,
            (SELECT COUNT(*) FROM orders WHERE status IN ('paid', 'processing')) AS orders_to_ship,
            (SELECT COALESCE(SUM(amount), 0) FROM orders
             WHERE status IN {paid} AND paid_at >= CURRENT_DATE) AS revenue_today,
            (SELECT COALESCE(SUM(amount), 0) FROM orders
             WHERE status IN {paid} AND paid_at >= date_trunc('month', NOW())) AS revenue_month,
            (SELECT COUNT(*) FROM users WHERE role = 'customer') AS customers,
            (SELECT COUNT(*) FROM companies WHERE status = 'pending') AS partners_pending,
            (SELECT COUNT(*) FROM admin_alerts WHERE NOT is_read) AS unread_alerts,
            (SELECT COUNT(*) FROM contact_messages WHERE NOT is_read) AS unread_contacts
        "#,
        paid = PAID_STATUSES
    ))
    .fetch_one(&state.db)
    .await?;

    let recent_orders = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1",
    )
    .bind(RECENT_ORDERS)
    .fetch_all(&state.db)
    .await?;

    Ok(DataResponse::new(DashboardResponse {
        counters,
        recent_orders,
    }))
}

/// Totals shared by the stats page and the order list.
pub(crate) async fn order_stats(db: &sqlx::PgPool) -> Result<OrderStats, sqlx::Error> {
    sqlx::query_as::<_, OrderStats>(&format!(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status IN {paid}) AS paid,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending,
            COALESCE(SUM(amount) FILTER (WHERE status IN {paid}), 0) AS revenue
        FROM orders
        "#,
        paid = PAID_STATUSES
    ))
    .fetch_one(db)
    .await
}

/// GET /admin/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let orders = order_stats(&state.db).await?;

    let by_status = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY count DESC",
    )
    .fetch_all(&state.db)
    .await?;

    let daily_revenue = sqlx::query_as::<_, DailyRevenue>(&format!(
        r#"
        SELECT paid_at::date AS day, COUNT(*) AS orders, COALESCE(SUM(amount), 0) AS revenue
        FROM orders
        WHERE status IN {paid} AND paid_at >= CURRENT_DATE - $1::INTEGER
        GROUP BY day
        ORDER BY day
        "#,
        paid = PAID_STATUSES
    ))
    .bind(REVENUE_DAYS)
    .fetch_all(&state.db)
    .await?;

    let top_products = sqlx::query_as::<_, TopProduct>(&format!(
        r#"
        SELECT i.product_id, i.product_name,
               SUM(i.quantity)::BIGINT AS quantity,
               COALESCE(SUM(i.price * i.quantity), 0) AS revenue
        FROM order_items i
        JOIN orders o ON o.id = i.order_id
        WHERE o.status IN {paid}
        GROUP BY i.product_id, i.product_name
        ORDER BY quantity DESC
        LIMIT $1
        "#,
        paid = PAID_STATUSES
    ))
    .bind(TOP_PRODUCTS)
    .fetch_all(&state.db)
    .await?;

    Ok(DataResponse::new(StatsResponse {
        orders,
        by_status,
        daily_revenue,
        top_products,
    }))
}

// =============================================================================
// Settings
// =============================================================================

/// GET /admin/settings
pub async fn get_site_settings(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(settings::site_settings(&state.db).await?))
}

/// PUT /admin/settings
pub async fn update_site_settings(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Json(req): Json<UpdateSiteSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::BadRequest)?;
    let updated = settings::update_site_settings(&state.db, &req).await?;

    // the chatbot prompt embeds prices in the default currency
    if let Err(e) = state.cache.delete_pattern(&keys::catalog_pattern()).await {
        tracing::warn!(error = %e, "Failed to invalidate catalog cache");
    }

    tracing::info!(admin_id = %staff.user_id, "Site settings updated");
    Ok(DataResponse::new(updated))
}

/// GET /admin/ai-settings
pub async fn get_ai_settings(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(settings::ai_settings(&state.db).await?))
}

/// PUT /admin/ai-settings
pub async fn update_ai_settings(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Json(req): Json<UpdateAiSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::BadRequest)?;
    let updated = settings::update_ai_settings(&state.db, &req).await?;
    tracing::info!(admin_id = %staff.user_id, "AI settings updated");
    Ok(DataResponse::new(updated))
}

/// POST /admin/cache/clear
pub async fn clear_cache(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.cache.delete_pattern(&keys::catalog_pattern()).await?;
    tracing::info!(admin_id = %staff.user_id, removed, "Catalog cache cleared");
    Ok(MessageResponse::new(format!("{} cache entries removed", removed)))
}
