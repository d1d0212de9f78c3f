//! Order lifecycle: creation from a cart, payment and status changes.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::orders::{
    document_number, order_prefix, NewOrderLine, Order, OrderDetail, OrderItem, OrderStatus,
    OrderTotals,
};
use crate::error::{ApiError, ApiResult};
use crate::services::stock;
use crate::services::stripe::CheckoutSession;

/// Next `PREFIX-YYYY-00001` number from a document sequence.
pub async fn next_document_number(
    conn: &mut PgConnection,
    prefix: &str,
    sequence: &'static str,
) -> sqlx::Result<String> {
    let seq: i64 = sqlx::query_scalar("SELECT nextval($1::regclass)")
        .bind(sequence)
        .fetch_one(&mut *conn)
        .await?;
    Ok(document_number(prefix, Utc::now().year(), seq))
}

/// Order about to be placed from a priced cart.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub user_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub is_b2b: bool,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub currency: String,
    pub lines: Vec<NewOrderLine>,
}

/// Insert a `pending` order and its item snapshots in one transaction.
#[instrument(skip(db, new), fields(lines = new.lines.len(), is_b2b = new.is_b2b))]
pub async fn create_order(db: &PgPool, new: &NewOrder) -> ApiResult<Order> {
    if new.lines.is_empty() {
        return Err(ApiError::bad_request("Order has no items"));
    }
    let totals = OrderTotals::compute(&new.lines, Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);

    let mut tx = db.begin().await?;
    let order_number =
        next_document_number(&mut tx, order_prefix(new.is_b2b), "order_number_seq").await?;

    let order = sqlx::query_as::<_, Order>(
        r#"
        INSERT INTO orders
            (id, order_number, user_id, company_id, is_b2b, customer_name, customer_email,
             customer_phone, subtotal, discount, shipping_cost, tax, amount, currency, status,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&order_number)
    .bind(new.user_id)
    .bind(new.company_id)
    .bind(new.is_b2b)
    .bind(&new.customer_name)
    .bind(&new.customer_email)
    .bind(&new.customer_phone)
    .bind(totals.subtotal)
    .bind(totals.discount)
    .bind(totals.shipping_cost)
    .bind(totals.tax)
    .bind(totals.amount)
    .bind(&new.currency)
    .bind(OrderStatus::Pending.to_string())
    .fetch_one(&mut *tx)
    .await?;

    for line in &new.lines {
        sqlx::query(
            r#"
            INSERT INTO order_items (id, order_id, product_id, product_name, sku, price, quantity, currency)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(line.product_id)
        .bind(&line.product_name)
        .bind(&line.sku)
        .bind(line.price)
        .bind(line.quantity as i32)
        .bind(&line.currency)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    info!(order_id = %order.id, order_number = %order.order_number, amount = %order.amount, "Order created");
    Ok(order)
}

pub async fn attach_session(db: &PgPool, order_id: Uuid, session_id: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE orders SET stripe_session_id = $2, updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .bind(session_id)
        .execute(db)
        .await?;
    Ok(())
}

/// Mark the order of a paid Checkout Session as `paid` and take its items
/// out of stock. Only a `pending` order changes; calling it again is a
/// no-op that returns `None`.
#[instrument(skip(db, session), fields(session_id = %session.id))]
pub async fn mark_paid(db: &PgPool, session: &CheckoutSession) -> ApiResult<Option<Order>> {
    let mut tx = db.begin().await?;

    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE stripe_session_id = $1 OR id = $2 LIMIT 1 FOR UPDATE",
    )
    .bind(&session.id)
    .bind(session.order_id())
    .fetch_optional(&mut *tx)
    .await?;

    let Some(order) = order else {
        info!("No order for checkout session");
        return Ok(None);
    };
    if order.status() != OrderStatus::Pending {
        info!(order_id = %order.id, status = %order.status, "Order already processed");
        return Ok(None);
    }

    let customer = session.customer_details.clone().unwrap_or_default();
    let paid = sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
        SET status = $2, payment_status = 'paid', paid_at = NOW(),
            stripe_session_id = COALESCE(stripe_session_id, $3),
            stripe_payment_intent = $4,
            customer_email = COALESCE($5, customer_email),
            customer_name = COALESCE($6, customer_name),
            customer_phone = COALESCE($7, customer_phone),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(order.id)
    .bind(OrderStatus::Paid.to_string())
    .bind(&session.id)
    .bind(&session.payment_intent)
    .bind(customer.email)
    .bind(customer.name)
    .bind(customer.phone)
    .fetch_one(&mut *tx)
    .await?;

    stock::deduct_for_order(&mut tx, order.id).await?;
    tx.commit().await?;

    info!(order_id = %paid.id, order_number = %paid.order_number, amount = %paid.amount, "Order paid");
    Ok(Some(paid))
}

pub async fn fetch_detail(db: &PgPool, id: Uuid) -> sqlx::Result<Option<OrderDetail>> {
    let Some(order) = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?
    else {
        return Ok(None);
    };

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT * FROM order_items WHERE order_id = $1 ORDER BY product_name",
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    Ok(Some(OrderDetail { order, items }))
}

/// Set a status, stamping paid/shipped/delivered times the first time.
pub async fn set_status<'e, E>(
    executor: E,
    id: Uuid,
    status: OrderStatus,
    tracking_number: Option<&str>,
) -> sqlx::Result<Option<Order>>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    sqlx::query_as::<_, Order>(
        r#"
        UPDATE orders
        SET status = $2,
            paid_at = CASE WHEN $2 = 'paid' THEN COALESCE(paid_at, NOW()) ELSE paid_at END,
            payment_status = CASE WHEN $2 = 'paid' THEN 'paid' ELSE payment_status END,
            shipped_at = CASE WHEN $2 = 'shipped' THEN COALESCE(shipped_at, NOW()) ELSE shipped_at END,
            delivered_at = CASE WHEN $2 = 'delivered' THEN COALESCE(delivered_at, NOW()) ELSE delivered_at END,
            tracking_number = COALESCE($3, tracking_number),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.to_string())
    .bind(tracking_number)
    .fetch_optional(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::warehouse::tests::{paid_session, pending_order};

    async fn stock_of(pool: &PgPool, product_id: Uuid) -> i32 {
        sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL DATABASE_URL"]
    async fn paid_session_settles_the_order_once(pool: PgPool) {
        let (product_id, order) = pending_order(&pool, 5, 2).await;
        assert_eq!(order.status(), OrderStatus::Pending);
        attach_session(&pool, order.id, "cs_test_paid").await.unwrap();

        let session = paid_session("cs_test_paid", order.id);
        let paid = mark_paid(&pool, &session).await.unwrap().unwrap();
        assert_eq!(paid.status(), OrderStatus::Paid);
        assert!(paid.paid_at.is_some());
        assert_eq!(paid.stripe_payment_intent.as_deref(), Some("pi_test"));
        assert_eq!(stock_of(&pool, product_id).await, 3);

        // webhook and success page both report the same session
        assert!(mark_paid(&pool, &session).await.unwrap().is_none());
        assert_eq!(stock_of(&pool, product_id).await, 3);

        let detail = fetch_detail(&pool, order.id).await.unwrap().unwrap();
        assert_eq!(detail.order.status(), OrderStatus::Paid);
        assert_eq!(detail.order.paid_at, paid.paid_at);
        assert_eq!(detail.items.len(), 1);
    }

    #[sqlx::test]
    #[ignore = "needs a PostgreSQL DATABASE_URL"]
    async fn unknown_session_changes_nothing(pool: PgPool) {
        let (_, order) = pending_order(&pool, 1, 1).await;
        let stray = paid_session("cs_test_other", Uuid::new_v4());

        assert!(mark_paid(&pool, &stray).await.unwrap().is_none());
        let detail = fetch_detail(&pool, order.id).await.unwrap().unwrap();
        assert_eq!(detail.order.status(), OrderStatus::Pending);
    }
}
