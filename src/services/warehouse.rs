//! Fulfillment task lifecycle.
//!
//! Shipping and delivering a task move the linked order in the same
//! transaction, so the two never disagree.

use sqlx::{PgConnection, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::domain::clean;
use crate::domain::orders::{Order, OrderStatus};
use crate::domain::warehouse::{
    validate_priority, CreateTaskRequest, ShipTaskRequest, TaskStatus, WarehouseTask,
    DEFAULT_TASK_PRIORITY,
};
use crate::error::{ApiError, ApiResult};
use crate::services::orders::{self, next_document_number};

pub const TASK_PREFIX: &str = "WH";
pub const TASK_SEQUENCE: &str = "warehouse_task_number_seq";

/// Load a task row-locked for the rest of the transaction.
pub async fn lock_task(conn: &mut PgConnection, id: Uuid) -> ApiResult<WarehouseTask> {
    sqlx::query_as::<_, WarehouseTask>("SELECT * FROM warehouse_tasks WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ApiError::not_found("Warehouse task not found"))
}

/// Open a task for an order, copying its customer and shipping data.
pub async fn create_task(db: &PgPool, req: &CreateTaskRequest) -> ApiResult<WarehouseTask> {
    let priority = validate_priority(req.priority.unwrap_or(DEFAULT_TASK_PRIORITY))
        .map_err(ApiError::BadRequest)?;

    let mut tx = db.begin().await?;

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(req.order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    let task_number = next_document_number(&mut tx, TASK_PREFIX, TASK_SEQUENCE).await?;

    let task = sqlx::query_as::<_, WarehouseTask>(
        r#"
        INSERT INTO warehouse_tasks (
            id, task_number, order_id, status, priority,
            customer_name, customer_phone, customer_email,
            shipping_address, shipping_city, shipping_postal_code, shipping_country,
            notes, created_at, updated_at
        )
        VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&task_number)
    .bind(order.id)
    .bind(priority)
    .bind(&order.customer_name)
    .bind(&order.customer_phone)
    .bind(&order.customer_email)
    .bind(&order.shipping_address)
    .bind(&order.shipping_city)
    .bind(&order.shipping_postal_code)
    .bind(&order.shipping_country)
    .bind(clean(req.notes.clone()).or_else(|| order.notes.clone()))
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(task_id = %task.id, task_number = %task.task_number, order_id = %order.id, "Warehouse task created");
    Ok(task)
}

/// Hand the parcel to the carrier; the order becomes `shipped` with the
/// same tracking number.
pub async fn ship_task(db: &PgPool, id: Uuid, req: &ShipTaskRequest) -> ApiResult<WarehouseTask> {
    let tracking = req.tracking_number.trim();
    if tracking.is_empty() {
        return Err(ApiError::bad_request("Tracking number is required"));
    }

    let mut tx = db.begin().await?;
    let task = lock_task(&mut tx, id).await?;
    if !task.status().can_ship() {
        return Err(ApiError::conflict(format!(
            "A task in status '{}' cannot be shipped",
            task.status
        )));
    }

    let task = sqlx::query_as::<_, WarehouseTask>(
        r#"
        UPDATE warehouse_tasks SET
            status = $2,
            tracking_number = $3,
            carrier = COALESCE($4, carrier),
            shipped_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(TaskStatus::Shipped.to_string())
    .bind(tracking)
    .bind(clean(req.carrier.clone()))
    .fetch_one(&mut *tx)
    .await?;

    orders::set_status(&mut *tx, task.order_id, OrderStatus::Shipped, Some(tracking)).await?;
    tx.commit().await?;

    info!(task_id = %id, order_id = %task.order_id, tracking_number = %tracking, "Warehouse task shipped");
    Ok(task)
}

pub async fn deliver_task(db: &PgPool, id: Uuid) -> ApiResult<WarehouseTask> {
    let mut tx = db.begin().await?;
    let task = lock_task(&mut tx, id).await?;
    if !task.status().can_deliver() {
        return Err(ApiError::conflict(format!(
            "A task in status '{}' cannot be delivered",
            task.status
        )));
    }

    let task = sqlx::query_as::<_, WarehouseTask>(
        r#"
        UPDATE warehouse_tasks
        SET status = $2, delivered_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(TaskStatus::Delivered.to_string())
    .fetch_one(&mut *tx)
    .await?;

    orders::set_status(&mut *tx, task.order_id, OrderStatus::Delivered, None).await?;
    tx.commit().await?;

    info!(task_id = %id, order_id = %task.order_id, "Warehouse task delivered");
    Ok(task)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::orders::NewOrderLine;
    use crate::services::catalog;
    use crate::services::orders::NewOrder;
    use crate::services::stripe::CheckoutSession;
    use serde_json::json;

    /// A product with `stock` units and a pending order for `quantity` of it.
    pub(crate) async fn pending_order(pool: &PgPool, stock: i32, quantity: u32) -> (Uuid, Order) {
        let req = serde_json::from_value(json!({"name": "Kettle", "price": 30, "stock": stock}))
            .unwrap();
        let product = catalog::create_product(pool, &req, None).await.unwrap();

        let order = orders::create_order(
            pool,
            &NewOrder {
                customer_email: Some("buyer@example.com".into()),
                currency: "EUR".into(),
                lines: vec![NewOrderLine {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    sku: None,
                    price: product.price,
                    quantity,
                    currency: "EUR".into(),
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (product.id, order)
    }

    pub(crate) fn paid_session(id: &str, order_id: Uuid) -> CheckoutSession {
        serde_json::from_value(json!({
            "id": id,
            "payment_status": "paid",
            "payment_intent": "pi_test",
            "metadata": {"order_id": order_id.to_string()}
        }))
        .unwrap()
    }

    async fn order_status(pool: &PgPool, id: Uuid) -> (String, Option<String>) {
        sqlx::query_as("SELECT status, tracking_number FROM orders WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn ship(tracking: &str) -> ShipTaskRequest {
        ShipTaskRequest {
            tracking_number: tracking.into(),
            carrier: Some("Nova Poshta".into()),
        }
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL DATABASE_URL"]
    async fn shipping_and_delivering_move_the_order(pool: PgPool) {
        let (_, order) = pending_order(&pool, 5, 1).await;
        orders::mark_paid(&pool, &paid_session("cs_test_ship", order.id))
            .await
            .unwrap();

        let task = create_task(
            &pool,
            &CreateTaskRequest {
                order_id: order.id,
                priority: None,
                notes: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.task_number.starts_with("WH-"));

        let shipped = ship_task(&pool, task.id, &ship(" 20450000000001 ")).await.unwrap();
        assert_eq!(shipped.status(), TaskStatus::Shipped);
        assert!(shipped.shipped_at.is_some());
        assert_eq!(
            order_status(&pool, order.id).await,
            ("shipped".to_string(), Some("20450000000001".to_string()))
        );

        let again = ship_task(&pool, task.id, &ship("X")).await.unwrap_err();
        assert!(matches!(again, ApiError::Conflict(_)));

        let delivered = deliver_task(&pool, task.id).await.unwrap();
        assert_eq!(delivered.status(), TaskStatus::Delivered);
        assert_eq!(order_status(&pool, order.id).await.0, "delivered");
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL DATABASE_URL"]
    async fn pending_task_cannot_be_delivered(pool: PgPool) {
        let (_, order) = pending_order(&pool, 1, 1).await;
        let task = create_task(
            &pool,
            &CreateTaskRequest {
                order_id: order.id,
                priority: Some(1),
                notes: None,
            },
        )
        .await
        .unwrap();

        let err = deliver_task(&pool, task.id).await.unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(order_status(&pool, order.id).await.0, "pending");

        let blank = ship_task(&pool, task.id, &ship("  ")).await.unwrap_err();
        assert!(matches!(blank, ApiError::BadRequest(_)));
    }
}
