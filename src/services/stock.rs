//! Stock ledger: every stock change goes through a recorded movement.

use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::warehouse::{apply_stock_delta, MovementType, StockMovement};
use crate::error::{ApiError, ApiResult};

/// A stock change to record.
#[derive(Debug, Clone)]
pub struct Movement<'a> {
    pub product_id: Uuid,
    pub movement_type: MovementType,
    /// Signed change applied to the product's stock.
    pub delta: i32,
    pub reason: Option<&'a str>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<&'a str>,
    pub performed_by: Option<Uuid>,
}

/// Apply a movement to the product (row-locked) and write the ledger entry.
pub async fn record_movement(conn: &mut PgConnection, m: Movement<'_>) -> ApiResult<StockMovement> {
    let current: Option<i32> =
        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(m.product_id)
            .fetch_optional(&mut *conn)
            .await?;
    let current = current.ok_or_else(|| ApiError::not_found("Product not found"))?;

    let stock_after = apply_stock_delta(current, m.delta).ok_or_else(|| {
        ApiError::bad_request(format!(
            "Not enough stock: {} left, {} requested",
            current,
            m.delta.unsigned_abs()
        ))
    })?;

    sqlx::query("UPDATE products SET stock = $2, updated_at = NOW() WHERE id = $1")
        .bind(m.product_id)
        .bind(stock_after)
        .execute(&mut *conn)
        .await?;

    let movement = sqlx::query_as::<_, StockMovement>(
        r#"
        INSERT INTO stock_movements
            (id, product_id, movement_type, quantity, stock_after, reason, reference_id, notes, performed_by, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(m.product_id)
    .bind(m.movement_type.to_string())
    .bind(m.delta)
    .bind(stock_after)
    .bind(m.reason)
    .bind(m.reference_id)
    .bind(m.notes)
    .bind(m.performed_by)
    .fetch_one(&mut *conn)
    .await?;

    info!(
        product_id = %m.product_id,
        delta = m.delta,
        stock_after = stock_after,
        movement_type = %m.movement_type,
        "Stock movement recorded"
    );
    Ok(movement)
}

/// Quantity that can actually be taken when `wanted` units were sold.
pub fn sale_delta(stock: i32, wanted: i32) -> i32 {
    -wanted.clamp(0, stock.max(0))
}

/// Deduct sold quantities of an order. The payment is already taken, so a
/// shortfall takes what is left and is logged rather than failing.
pub async fn deduct_for_order(conn: &mut PgConnection, order_id: Uuid) -> ApiResult<()> {
    let lines: Vec<(Uuid, i32, i32)> = sqlx::query_as(
        r#"
        SELECT oi.product_id, oi.quantity, p.stock
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        WHERE oi.order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    for (product_id, quantity, stock) in lines {
        let delta = sale_delta(stock, quantity);
        if -delta < quantity {
            warn!(
                order_id = %order_id,
                product_id = %product_id,
                ordered = quantity,
                stock = stock,
                "Sold more than in stock"
            );
        }
        if delta == 0 {
            continue;
        }
        record_movement(
            &mut *conn,
            Movement {
                product_id,
                movement_type: MovementType::Out,
                delta,
                reason: Some("sale"),
                reference_id: Some(order_id),
                notes: None,
                performed_by: None,
            },
        )
        .await?;
    }
    Ok(())
}

/// Open an alert for every active product at or below its minimum stock
/// that has none open yet. Returns how many were created.
pub async fn scan_low_stock(db: &PgPool) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        INSERT INTO low_stock_alerts (id, product_id, current_stock, min_stock, created_at)
        SELECT gen_random_uuid(), p.id, p.stock, p.min_stock, NOW()
        FROM products p
        WHERE p.is_active AND p.min_stock > 0 AND p.stock <= p.min_stock
          AND NOT EXISTS (
              SELECT 1 FROM low_stock_alerts a WHERE a.product_id = p.id AND NOT a.is_resolved
          )
        ON CONFLICT (product_id) WHERE NOT is_resolved DO NOTHING
        "#,
    )
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Resolve open low-stock alerts of the given products.
pub async fn resolve_low_stock_for(
    conn: &mut PgConnection,
    product_ids: &[Uuid],
    replenishment_id: Option<Uuid>,
    resolved_by: Option<Uuid>,
) -> sqlx::Result<u64> {
    let result = sqlx::query(
        r#"
        UPDATE low_stock_alerts
        SET is_resolved = TRUE, resolved_at = NOW(), resolved_by = $3,
            replenishment_id = COALESCE($2, replenishment_id)
        WHERE product_id = ANY($1) AND NOT is_resolved
        "#,
    )
    .bind(product_ids)
    .bind(replenishment_id)
    .bind(resolved_by)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_takes_at_most_what_is_left() {
        assert_eq!(sale_delta(10, 3), -3);
        assert_eq!(sale_delta(2, 5), -2);
        assert_eq!(sale_delta(0, 1), 0);
        assert_eq!(sale_delta(-1, 1), 0);
    }
}
