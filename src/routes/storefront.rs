//! Storefront routes
//!
//! Public catalog browsing: home page data, product grid, product pages,
//! categories and public site settings.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::MaybeAuth;
use crate::domain::catalog::{Category, Product, ProductFilter, ShopProduct};
use crate::domain::site::PublicSiteSettings;
use crate::error::ApiError;
use crate::services::settings;

const HOME_PRODUCTS: i64 = 8;
const RELATED_PRODUCTS: i64 = 4;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ShopCounters {
    pub products: i64,
    pub orders: i64,
    pub revenue: Decimal,
}

#[derive(Serialize)]
pub struct HomeResponse {
    pub settings: PublicSiteSettings,
    pub products: Vec<ShopProduct>,
    pub categories: Vec<Category>,
    pub stats: ShopCounters,
}

#[derive(Serialize)]
pub struct ProductPageResponse {
    pub product: ShopProduct,
    pub category: Option<Category>,
    pub related: Vec<ShopProduct>,
}

#[derive(Serialize)]
pub struct CategoryPageResponse {
    pub category: Category,
    pub products: Paginated<ShopProduct>,
}

async fn active_categories(state: &AppState) -> Result<Vec<Category>, ApiError> {
    Ok(sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE is_active ORDER BY sort_order, name",
    )
    .fetch_all(&state.db)
    .await?)
}

/// WHERE clause shared by the product grid and its count.
fn push_product_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE p.is_active");
    if let Some(category) = filter.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        qb.push(" AND p.category_id IN (SELECT id FROM categories WHERE slug = ")
            .push_bind(category.to_string())
            .push(" OR id::text = ")
            .push_bind(category.to_string())
            .push(")");
    }
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", q);
        qb.push(" AND (p.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.short_description ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR p.sku ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if filter.featured == Some(true) {
        qb.push(" AND p.is_featured");
    }
}

/// GET /home
///
/// Everything the landing page needs in one call.
pub async fn home(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
) -> Result<impl IntoResponse, ApiError> {
    let site = settings::site_settings(&state.db).await?;
    let is_b2b = auth.is_b2b();

    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE is_active ORDER BY is_featured DESC, created_at DESC LIMIT $1",
    )
    .bind(HOME_PRODUCTS)
    .fetch_all(&state.db)
    .await?;

    let stats = sqlx::query_as::<_, ShopCounters>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM products WHERE is_active) AS products,
            (SELECT COUNT(*) FROM orders) AS orders,
            (SELECT COALESCE(SUM(amount), 0) FROM orders
             WHERE status IN ('paid', 'processing', 'shipped', 'delivered')) AS revenue
        "#,
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(HomeResponse {
        settings: site.into(),
        products: products
            .into_iter()
            .map(|p| ShopProduct::new(p, is_b2b))
            .collect(),
        categories: active_categories(&state).await?,
        stats,
    }))
}

/// GET /products
///
/// Active products, newest first.
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    Query(filter): Query<ProductFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let site = settings::site_settings(&state.db).await?;
    let pagination = pagination.or_per_page(site.products_per_page.max(1) as u32);

    let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
    push_product_filter(&mut count, &filter);
    let total: i64 = count.build_query_scalar::<i64>().fetch_one(&state.db).await?;

    let mut query = QueryBuilder::<Postgres>::new("SELECT p.* FROM products p");
    push_product_filter(&mut query, &filter);
    query
        .push(" ORDER BY p.created_at DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());
    let products = query.build_query_as::<Product>().fetch_all(&state.db).await?;

    let is_b2b = auth.is_b2b();
    let data = products
        .into_iter()
        .map(|p| ShopProduct::new(p, is_b2b))
        .collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /products/:id
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = $1 AND is_active",
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let (category, related) = match product.category_id {
        Some(category_id) => {
            let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
                .bind(category_id)
                .fetch_optional(&state.db)
                .await?;
            let related = sqlx::query_as::<_, Product>(
                r#"
                SELECT * FROM products
                WHERE category_id = $1 AND id <> $2 AND is_active
                ORDER BY created_at DESC
                LIMIT $3
                "#,
            )
            .bind(category_id)
            .bind(product.id)
            .bind(RELATED_PRODUCTS)
            .fetch_all(&state.db)
            .await?;
            (category, related)
        }
        None => (None, Vec::new()),
    };

    let is_b2b = auth.is_b2b();
    Ok(DataResponse::new(ProductPageResponse {
        product: ShopProduct::new(product, is_b2b),
        category,
        related: related
            .into_iter()
            .map(|p| ShopProduct::new(p, is_b2b))
            .collect(),
    }))
}

/// GET /categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(active_categories(&state).await?))
}

/// GET /categories/:slug
pub async fn get_category(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    Path(slug): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let category = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE slug = $1 AND is_active",
    )
    .bind(&slug)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let site = settings::site_settings(&state.db).await?;
    let pagination = pagination.or_per_page(site.products_per_page.max(1) as u32);

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products WHERE category_id = $1 AND is_active",
    )
    .bind(category.id)
    .fetch_one(&state.db)
    .await?;

    let products = sqlx::query_as::<_, Product>(
        r#"
        SELECT * FROM products
        WHERE category_id = $1 AND is_active
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(category.id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let is_b2b = auth.is_b2b();
    let data = products
        .into_iter()
        .map(|p| ShopProduct::new(p, is_b2b))
        .collect();

    Ok(Json(CategoryPageResponse {
        category,
        products: Paginated::new(data, &pagination, total),
    }))
}

/// GET /site
///
/// Public storefront settings.
pub async fn site(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let site = settings::site_settings(&state.db).await?;
    Ok(DataResponse::new(PublicSiteSettings::from(site)))
}
