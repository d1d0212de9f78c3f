//! Product creation and lookup shared by the admin handlers.

use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::domain::catalog::{CreateProductRequest, Product};
use crate::domain::clean;
use crate::domain::warehouse::MovementType;
use crate::error::{ApiError, ApiResult};
use crate::services::stock::{self, Movement};

/// Unique-violation on a slug or SKU becomes a 409.
pub fn conflict_on_duplicate(what: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |e| {
        if db::is_unique_violation(&e) {
            ApiError::conflict(format!("{} already exists", what))
        } else {
            e.into()
        }
    }
}

pub async fn fetch_product(db: &PgPool, id: Uuid) -> ApiResult<Product> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))
}

/// Insert a product. Opening stock is booked as an `in` movement so the
/// ledger explains every unit on hand.
pub async fn create_product(
    db: &PgPool,
    req: &CreateProductRequest,
    performed_by: Option<Uuid>,
) -> ApiResult<Product> {
    req.validate().map_err(ApiError::BadRequest)?;

    let gallery = serde_json::to_value(&req.gallery).unwrap_or_default();
    let mut tx = db.begin().await?;
    let product = sqlx::query_as::<_, Product>(
        r#"
        INSERT INTO products
            (id, name, sku, price, old_price, cost_price, b2b_price, min_b2b_quantity, currency,
             stock, min_stock, short_description, description, image_url, gallery, category_id,
             is_active, is_featured, meta_title, meta_description, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.name.trim())
    .bind(clean(req.sku.clone()))
    .bind(req.price)
    .bind(req.old_price)
    .bind(req.cost_price)
    .bind(req.b2b_price)
    .bind(req.min_b2b_quantity.unwrap_or(1).max(1))
    .bind(clean(req.currency.clone()).unwrap_or_else(|| "EUR".to_string()))
    .bind(req.min_stock.unwrap_or(0))
    .bind(clean(req.short_description.clone()))
    .bind(clean(req.description.clone()))
    .bind(clean(req.image_url.clone()))
    .bind(gallery)
    .bind(req.category_id)
    .bind(req.is_active.unwrap_or(true))
    .bind(req.is_featured.unwrap_or(false))
    .bind(clean(req.meta_title.clone()))
    .bind(clean(req.meta_description.clone()))
    .fetch_one(&mut *tx)
    .await
    .map_err(conflict_on_duplicate("A product with this SKU"))?;

    let opening = req.stock.unwrap_or(0);
    if opening > 0 {
        stock::record_movement(
            &mut tx,
            Movement {
                product_id: product.id,
                movement_type: MovementType::In,
                delta: opening,
                reason: Some("initial"),
                reference_id: None,
                notes: None,
                performed_by,
            },
        )
        .await?;
    }
    tx.commit().await?;

    tracing::info!(product_id = %product.id, name = %product.name, opening_stock = opening, "Product created");
    fetch_product(db, product.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn request(body: serde_json::Value) -> CreateProductRequest {
        serde_json::from_value(body).unwrap()
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL DATABASE_URL"]
    async fn created_product_reads_back_with_submitted_fields(pool: PgPool) {
        let req = request(json!({
            "name": "  Desk lamp ",
            "price": 49.9,
            "old_price": 59.9,
            "sku": "LAMP-1",
            "stock": 7,
            "min_stock": 2,
            "gallery": ["https://cdn.example.com/a.jpg"],
            "is_featured": true
        }));

        let created = create_product(&pool, &req, None).await.unwrap();
        let stored = fetch_product(&pool, created.id).await.unwrap();

        assert_eq!(stored.name, "Desk lamp");
        assert_eq!(stored.sku.as_deref(), Some("LAMP-1"));
        assert_eq!(stored.price, dec!(49.90));
        assert_eq!(stored.old_price, Some(dec!(59.90)));
        assert_eq!(stored.stock, 7);
        assert_eq!(stored.min_stock, 2);
        assert_eq!(stored.gallery.0, vec!["https://cdn.example.com/a.jpg".to_string()]);
        assert!(stored.is_active);
        assert!(stored.is_featured);

        let booked: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM stock_movements WHERE product_id = $1",
        )
        .bind(created.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(booked, 7);
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL DATABASE_URL"]
    async fn duplicate_sku_is_a_conflict(pool: PgPool) {
        let req = request(json!({"name": "Mug", "price": 5, "sku": "MUG"}));
        create_product(&pool, &req, None).await.unwrap();

        let err = create_product(&pool, &req, None).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }
}
