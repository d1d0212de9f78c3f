//! Admin catalog management
//!
//! Product and category edits drop every cached catalog derivative (the
//! chatbot's catalog text included).

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireStaff;
use crate::domain::catalog::{
    AdminProductResponse, Category, CreateCategoryRequest, CreateProductRequest, Product,
    UpdateCategoryRequest, UpdateProductRequest,
};
use crate::domain::clean;
use crate::error::ApiError;
use crate::services::cache::keys;
use crate::services::catalog::{self, conflict_on_duplicate, fetch_product};

async fn invalidate_catalog(state: &AppState) {
    if let Err(e) = state.cache.delete_pattern(&keys::catalog_pattern()).await {
        tracing::warn!(error = %e, "Failed to invalidate catalog cache");
    }
}

// =============================================================================
// Categories
// =============================================================================

/// GET /admin/categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories ORDER BY sort_order, name",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(DataResponse::new(categories))
}

/// GET /admin/categories/:id
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;
    Ok(DataResponse::new(category))
}

/// POST /admin/categories
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Json(req): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (name, slug) = req.validate().map_err(ApiError::BadRequest)?;

    let category = sqlx::query_as::<_, Category>(
        r#"
        INSERT INTO categories (id, name, slug, description, image_url, is_active, sort_order, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&name)
    .bind(&slug)
    .bind(clean(req.description))
    .bind(clean(req.image_url))
    .bind(req.is_active.unwrap_or(true))
    .bind(req.sort_order.unwrap_or(0))
    .fetch_one(&state.db)
    .await
    .map_err(conflict_on_duplicate("A category with this slug"))?;

    invalidate_catalog(&state).await;
    tracing::info!(category_id = %category.id, slug = %category.slug, "Category created");
    Ok(Created(category))
}

/// PUT /admin/categories/:id
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateCategoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let slug = req.validate().map_err(ApiError::BadRequest)?;

    let category = sqlx::query_as::<_, Category>(
        r#"
        UPDATE categories SET
            name = COALESCE($2, name),
            slug = COALESCE($3, slug),
            description = COALESCE($4, description),
            image_url = COALESCE($5, image_url),
            is_active = COALESCE($6, is_active),
            sort_order = COALESCE($7, sort_order)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(slug)
    .bind(&req.description)
    .bind(&req.image_url)
    .bind(req.is_active)
    .bind(req.sort_order)
    .fetch_optional(&state.db)
    .await
    .map_err(conflict_on_duplicate("A category with this slug"))?
    .ok_or_else(|| ApiError::not_found("Category not found"))?;

    invalidate_catalog(&state).await;
    Ok(DataResponse::new(category))
}

/// DELETE /admin/categories/:id
///
/// Products of the category stay, uncategorized.
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;
    let detached = sqlx::query("UPDATE products SET category_id = NULL WHERE category_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let deleted = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Category not found"));
    }
    tx.commit().await?;

    invalidate_catalog(&state).await;
    tracing::info!(category_id = %id, detached, "Category deleted");
    Ok(NoContent)
}

// =============================================================================
// Products
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AdminProductFilter {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub low_stock: Option<bool>,
}

fn push_admin_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &AdminProductFilter) {
    qb.push(" WHERE TRUE");
    if let Some(q) = clean(filter.q.clone()) {
        let pattern = format!("%{}%", q);
        qb.push(" AND (name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(category_id) = filter.category_id {
        qb.push(" AND category_id = ").push_bind(category_id);
    }
    if let Some(active) = filter.active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if filter.low_stock == Some(true) {
        qb.push(" AND stock <= min_stock");
    }
}

/// GET /admin/products
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<AdminProductFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products");
    push_admin_filter(&mut count, &filter);
    let total = count.build_query_scalar::<i64>().fetch_one(&state.db).await?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT * FROM products");
    push_admin_filter(&mut query, &filter);
    query
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());
    let products = query.build_query_as::<Product>().fetch_all(&state.db).await?;

    let data = products.into_iter().map(AdminProductResponse::from).collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /admin/products/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = fetch_product(&state.db, id).await?;
    Ok(DataResponse::new(AdminProductResponse::from(product)))
}

/// POST /admin/products
///
/// Opening stock is booked as an `in` movement so the ledger starts complete.
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = catalog::create_product(&state.db, &req, Some(staff.user_id)).await?;
    invalidate_catalog(&state).await;
    Ok(Created(AdminProductResponse::from(product)))
}

/// PUT /admin/products/:id
///
/// Stock is not editable here; it changes through stock movements only.
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::BadRequest)?;

    let gallery = req
        .gallery
        .as_ref()
        .map(|g| serde_json::to_value(g).unwrap_or_default());

    let product = sqlx::query_as::<_, Product>(
        r#"
        UPDATE products SET
            name = COALESCE($2, name),
            sku = COALESCE($3, sku),
            price = COALESCE($4, price),
            old_price = COALESCE($5, old_price),
            cost_price = COALESCE($6, cost_price),
            b2b_price = COALESCE($7, b2b_price),
            min_b2b_quantity = COALESCE($8, min_b2b_quantity),
            currency = COALESCE($9, currency),
            min_stock = COALESCE($10, min_stock),
            short_description = COALESCE($11, short_description),
            description = COALESCE($12, description),
            image_url = COALESCE($13, image_url),
            gallery = COALESCE($14, gallery),
            category_id = COALESCE($15, category_id),
            is_active = COALESCE($16, is_active),
            is_featured = COALESCE($17, is_featured),
            meta_title = COALESCE($18, meta_title),
            meta_description = COALESCE($19, meta_description),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(clean(req.sku.clone()))
    .bind(req.price)
    .bind(req.old_price)
    .bind(req.cost_price)
    .bind(req.b2b_price)
    .bind(req.min_b2b_quantity.map(|q| q.max(1)))
    .bind(clean(req.currency.clone()))
    .bind(req.min_stock)
    .bind(&req.short_description)
    .bind(&req.description)
    .bind(&req.image_url)
    .bind(gallery)
    .bind(req.category_id)
    .bind(req.is_active)
    .bind(req.is_featured)
    .bind(&req.meta_title)
    .bind(&req.meta_description)
    .fetch_optional(&state.db)
    .await
    .map_err(conflict_on_duplicate("A product with this SKU"))?
    .ok_or_else(|| ApiError::not_found("Product not found"))?;

    invalidate_catalog(&state).await;
    Ok(DataResponse::new(AdminProductResponse::from(product)))
}

/// DELETE /admin/products/:id
pub async fn delete_product(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(ApiError::not_found("Product not found"));
    }

    invalidate_catalog(&state).await;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(NoContent)
}

/// POST /admin/products/:id/toggle
pub async fn toggle_product(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = sqlx::query_as::<_, Product>(
        "UPDATE products SET is_active = NOT is_active, updated_at = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Product not found"))?;

    invalidate_catalog(&state).await;
    Ok(DataResponse::new(AdminProductResponse::from(product)))
}
