//! Warehouse: fulfillment tasks, stock ledger, supplier replenishments,
//! expenses and low-stock alerts.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::pagination::PaginationMeta;
use crate::api::{Created, DataResponse, MessageResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireStaff;
use crate::domain::clean;
use crate::domain::orders::OrderDetail;
use crate::domain::warehouse::{
    validate_priority, CreateExpenseRequest, CreateReplenishmentRequest, CreateTaskRequest,
    ExpenseCategoryTotal, ExpenseListFilter, LowStockAlert, LowStockListFilter, MovementListFilter,
    MovementType, PackTaskRequest, RecordMovementRequest, ReplenishmentDetail, ReplenishmentItem,
    ReplenishmentOrder, ReplenishmentStatus, ResolveLowStockRequest, ShipTaskRequest,
    StockMovement, TaskListFilter, TaskStatus, UpdateReplenishmentRequest, UpdateTaskRequest,
    TaskTransitionError, WarehouseExpense, WarehouseStats, WarehouseTask,
};
use crate::error::ApiError;
use crate::services::orders::{self, next_document_number};
use crate::services::stock::{self, Movement};
use crate::services::warehouse;

const REPLENISHMENT_PREFIX: &str = "REP";
const REPLENISHMENT_SEQUENCE: &str = "replenishment_number_seq";

#[derive(Serialize)]
pub struct TaskDetailResponse {
    pub task: WarehouseTask,
    pub order: Option<OrderDetail>,
}

#[derive(Serialize)]
pub struct ExpenseListResponse {
    pub data: Vec<WarehouseExpense>,
    pub totals: Vec<ExpenseCategoryTotal>,
    pub total_amount: Decimal,
    pub pagination: PaginationMeta,
}

// =============================================================================
// Stats
// =============================================================================

/// GET /admin/warehouse/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let stats = sqlx::query_as::<_, WarehouseStats>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM warehouse_tasks WHERE status IN ('pending', 'processing')) AS pending_tasks,
            (SELECT COUNT(*) FROM warehouse_tasks WHERE status IN ('packed', 'ready')) AS packed_tasks,
            (SELECT COUNT(*) FROM warehouse_tasks WHERE status IN ('shipped', 'in_transit')) AS shipped_tasks,
            (SELECT COUNT(*) FROM low_stock_alerts WHERE NOT is_resolved) AS open_low_stock_alerts,
            (SELECT COUNT(*) FROM replenishment_orders
             WHERE status NOT IN ('received', 'cancelled')) AS open_replenishments,
            (SELECT COALESCE(SUM(amount), 0) FROM warehouse_expenses
             WHERE expense_date >= date_trunc('month', CURRENT_DATE)) AS expenses_this_month
        "#,
    )
    .fetch_one(&state.db)
    .await?;
    Ok(DataResponse::new(stats))
}

// =============================================================================
// Tasks
// =============================================================================

/// GET /admin/warehouse/tasks
pub async fn list_tasks(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<TaskListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = filter.status.map(|s| s.to_string());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM warehouse_tasks WHERE ($1::TEXT IS NULL OR status = $1)",
    )
    .bind(&status)
    .fetch_one(&state.db)
    .await?;

    let tasks = sqlx::query_as::<_, WarehouseTask>(
        r#"
        SELECT * FROM warehouse_tasks
        WHERE ($1::TEXT IS NULL OR status = $1)
        ORDER BY priority, created_at
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&status)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(tasks, &pagination, total))
}

/// POST /admin/warehouse/tasks
///
/// Customer and shipping data are copied from the order.
pub async fn create_task(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = warehouse::create_task(&state.db, &req).await?;
    tracing::info!(task_id = %task.id, admin_id = %staff.user_id, "Warehouse task opened by staff");
    Ok(Created(task))
}

/// GET /admin/warehouse/tasks/:id
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = sqlx::query_as::<_, WarehouseTask>("SELECT * FROM warehouse_tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("Warehouse task not found"))?;

    let order = orders::fetch_detail(&state.db, task.order_id).await?;
    Ok(DataResponse::new(TaskDetailResponse { task, order }))
}

/// PUT /admin/warehouse/tasks/:id
pub async fn update_task(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let priority = req
        .priority
        .map(validate_priority)
        .transpose()
        .map_err(ApiError::BadRequest)?;
    if req.shipping_cost.map_or(false, |c| c.is_sign_negative()) {
        return Err(ApiError::bad_request("Shipping cost cannot be negative"));
    }

    let mut tx = state.db.begin().await?;
    let current = warehouse::lock_task(&mut tx, id).await?;
    if current.status().is_closed() {
        return Err(ApiError::conflict(format!(
            "A task in status '{}' cannot be changed",
            current.status
        )));
    }
    if let Some(to) = req.status {
        current.status().manual_transition(to).map_err(|e| match e {
            TaskTransitionError::DedicatedAction { .. } => ApiError::BadRequest(e.to_string()),
            TaskTransitionError::NotAllowed { .. } => ApiError::Conflict(e.to_string()),
        })?;
    }

    let task = sqlx::query_as::<_, WarehouseTask>(
        r#"
        UPDATE warehouse_tasks SET
            status = COALESCE($2, status),
            priority = COALESCE($3, priority),
            assigned_to = COALESCE($4, assigned_to),
            admin_notes = COALESCE($5, admin_notes),
            shipping_cost = COALESCE($6, shipping_cost),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.status.map(|s| s.to_string()))
    .bind(priority)
    .bind(clean(req.assigned_to))
    .bind(clean(req.admin_notes))
    .bind(req.shipping_cost)
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    Ok(DataResponse::new(task))
}

/// POST /admin/warehouse/tasks/:id/pack
pub async fn pack_task(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<PackTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.weight_kg.map_or(false, |w| w <= Decimal::ZERO) {
        return Err(ApiError::bad_request("Weight must be positive"));
    }

    let mut tx = state.db.begin().await?;
    let task = warehouse::lock_task(&mut tx, id).await?;
    if !task.status().can_pack() {
        return Err(ApiError::conflict(format!(
            "A task in status '{}' cannot be packed",
            task.status
        )));
    }

    let task = sqlx::query_as::<_, WarehouseTask>(
        r#"
        UPDATE warehouse_tasks SET
            status = $2,
            weight_kg = COALESCE($3, weight_kg),
            dimensions = COALESCE($4, dimensions),
            packed_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(TaskStatus::Packed.to_string())
    .bind(req.weight_kg)
    .bind(clean(req.dimensions))
    .fetch_one(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(task_id = %id, admin_id = %staff.user_id, "Warehouse task packed");
    Ok(DataResponse::new(task))
}

/// POST /admin/warehouse/tasks/:id/ship
///
/// Marks the linked order as shipped with the same tracking number.
pub async fn ship_task(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<ShipTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let task = warehouse::ship_task(&state.db, id, &req).await?;
    tracing::debug!(task_id = %id, admin_id = %staff.user_id, "Ship action");
    Ok(DataResponse::new(task))
}

/// POST /admin/warehouse/tasks/:id/deliver
pub async fn deliver_task(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let task = warehouse::deliver_task(&state.db, id).await?;
    tracing::debug!(task_id = %id, admin_id = %staff.user_id, "Deliver action");
    Ok(DataResponse::new(task))
}

// =============================================================================
// Stock movements
// =============================================================================

/// GET /admin/warehouse/movements
pub async fn list_movements(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<MovementListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM stock_movements WHERE ($1::UUID IS NULL OR product_id = $1)",
    )
    .bind(filter.product_id)
    .fetch_one(&state.db)
    .await?;

    let movements = sqlx::query_as::<_, StockMovement>(
        r#"
        SELECT * FROM stock_movements
        WHERE ($1::UUID IS NULL OR product_id = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(filter.product_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(movements, &pagination, total))
}

/// POST /admin/warehouse/movements
///
/// `quantity` is signed; the resulting stock may not go below zero.
pub async fn record_movement(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Json(req): Json<RecordMovementRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.quantity == 0 {
        return Err(ApiError::bad_request("Quantity cannot be zero"));
    }
    match req.movement_type {
        MovementType::In | MovementType::Return if req.quantity < 0 => {
            return Err(ApiError::bad_request("Incoming stock must be positive"));
        }
        MovementType::Out if req.quantity > 0 => {
            return Err(ApiError::bad_request("Outgoing stock must be negative"));
        }
        _ => {}
    }

    let reason = clean(req.reason);
    let notes = clean(req.notes);

    let mut tx = state.db.begin().await?;
    let movement = stock::record_movement(
        &mut tx,
        Movement {
            product_id: req.product_id,
            movement_type: req.movement_type,
            delta: req.quantity,
            reason: reason.as_deref(),
            reference_id: None,
            notes: notes.as_deref(),
            performed_by: Some(staff.user_id),
        },
    )
    .await?;
    tx.commit().await?;

    Ok(Created(movement))
}

// =============================================================================
// Replenishments
// =============================================================================

async fn replenishment_detail(db: &PgPool, id: Uuid) -> Result<ReplenishmentDetail, ApiError> {
    let order = sqlx::query_as::<_, ReplenishmentOrder>(
        "SELECT * FROM replenishment_orders WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Replenishment not found"))?;

    let items = sqlx::query_as::<_, ReplenishmentItem>(
        "SELECT * FROM replenishment_items WHERE replenishment_id = $1 ORDER BY product_name",
    )
    .bind(id)
    .fetch_all(db)
    .await?;

    Ok(ReplenishmentDetail { order, items })
}

/// GET /admin/warehouse/replenishments
pub async fn list_replenishments(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM replenishment_orders")
        .fetch_one(&state.db)
        .await?;

    let orders = sqlx::query_as::<_, ReplenishmentOrder>(
        "SELECT * FROM replenishment_orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(orders, &pagination, total))
}

/// POST /admin/warehouse/replenishments
///
/// Product names and SKUs are snapshotted from the catalog.
pub async fn create_replenishment(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Json(req): Json<CreateReplenishmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate().map_err(ApiError::BadRequest)?;
    let (subtotal, total) = req.totals();

    let mut tx = state.db.begin().await?;
    let order_number =
        next_document_number(&mut tx, REPLENISHMENT_PREFIX, REPLENISHMENT_SEQUENCE).await?;

    let order = sqlx::query_as::<_, ReplenishmentOrder>(
        r#"
        INSERT INTO replenishment_orders (
            id, order_number, status, supplier_name, supplier_contact,
            subtotal, shipping_cost, total, currency, payment_method, notes,
            created_by, expected_at, created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&order_number)
    .bind(ReplenishmentStatus::Draft.to_string())
    .bind(clean(req.supplier_name.clone()))
    .bind(clean(req.supplier_contact.clone()))
    .bind(subtotal)
    .bind(req.shipping_cost)
    .bind(total)
    .bind(
        clean(req.currency.clone())
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| "EUR".to_string()),
    )
    .bind(clean(req.payment_method.clone()))
    .bind(clean(req.notes.clone()))
    .bind(staff.user_id)
    .bind(req.expected_at)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(req.items.len());
    for line in &req.items {
        let product: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT name, sku FROM products WHERE id = $1")
                .bind(line.product_id)
                .fetch_optional(&mut *tx)
                .await?;
        let (name, sku) = product.ok_or_else(|| {
            ApiError::bad_request(format!("Product {} does not exist", line.product_id))
        })?;

        let item = sqlx::query_as::<_, ReplenishmentItem>(
            r#"
            INSERT INTO replenishment_items
                (id, replenishment_id, product_id, product_name, sku, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(line.product_id)
        .bind(name)
        .bind(sku)
        .bind(line.quantity)
        .bind(line.unit_price)
        .fetch_one(&mut *tx)
        .await?;
        items.push(item);
    }

    tx.commit().await?;

    tracing::info!(
        replenishment_id = %order.id,
        order_number = %order.order_number,
        items = items.len(),
        total = %order.total,
        admin_id = %staff.user_id,
        "Replenishment created"
    );
    Ok(Created(ReplenishmentDetail { order, items }))
}

/// GET /admin/warehouse/replenishments/:id
pub async fn get_replenishment(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(DataResponse::new(replenishment_detail(&state.db, id).await?))
}

/// PUT /admin/warehouse/replenishments/:id
///
/// Receiving goes through the receive endpoint so stock is booked.
pub async fn update_replenishment(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateReplenishmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.status == Some(ReplenishmentStatus::Received) {
        return Err(ApiError::bad_request(
            "Use the receive action to book received goods",
        ));
    }

    let order = sqlx::query_as::<_, ReplenishmentOrder>(
        r#"
        UPDATE replenishment_orders SET
            status = COALESCE($2, status),
            ordered_at = CASE WHEN $2 = 'ordered' THEN COALESCE(ordered_at, NOW()) ELSE ordered_at END,
            is_paid = COALESCE($3, is_paid),
            paid_at = CASE
                WHEN $3 IS TRUE THEN COALESCE(paid_at, NOW())
                WHEN $3 IS FALSE THEN NULL
                ELSE paid_at
            END,
            payment_method = COALESCE($4, payment_method),
            expected_at = COALESCE($5, expected_at),
            notes = COALESCE($6, notes),
            updated_at = NOW()
        WHERE id = $1 AND status <> 'received'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.status.map(|s| s.to_string()))
    .bind(req.is_paid)
    .bind(clean(req.payment_method))
    .bind(req.expected_at)
    .bind(clean(req.notes))
    .fetch_optional(&state.db)
    .await?;

    match order {
        Some(order) => Ok(DataResponse::new(order)),
        None => {
            // distinguish a missing order from a closed one
            replenishment_detail(&state.db, id).await?;
            Err(ApiError::conflict("A received replenishment cannot be changed"))
        }
    }
}

/// POST /admin/warehouse/replenishments/:id/receive
///
/// Books every item into stock and resolves open low-stock alerts of the
/// received products.
pub async fn receive_replenishment(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut tx = state.db.begin().await?;

    let order = sqlx::query_as::<_, ReplenishmentOrder>(
        "SELECT * FROM replenishment_orders WHERE id = $1 FOR UPDATE",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ApiError::not_found("Replenishment not found"))?;

    match order.status() {
        ReplenishmentStatus::Received => {
            return Err(ApiError::conflict("Replenishment has already been received"))
        }
        ReplenishmentStatus::Cancelled => {
            return Err(ApiError::conflict("A cancelled replenishment cannot be received"))
        }
        _ => {}
    }

    let items = sqlx::query_as::<_, ReplenishmentItem>(
        "SELECT * FROM replenishment_items WHERE replenishment_id = $1",
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;

    let mut received = Vec::with_capacity(items.len());
    for item in &items {
        // products deleted since ordering are skipped
        let Some(product_id) = item.product_id else {
            continue;
        };
        stock::record_movement(
            &mut tx,
            Movement {
                product_id,
                movement_type: MovementType::In,
                delta: item.quantity,
                reason: Some("replenishment"),
                reference_id: Some(id),
                notes: Some(&order.order_number),
                performed_by: Some(staff.user_id),
            },
        )
        .await?;
        received.push(product_id);
    }

    let resolved =
        stock::resolve_low_stock_for(&mut tx, &received, Some(id), Some(staff.user_id)).await?;

    let order = sqlx::query_as::<_, ReplenishmentOrder>(
        r#"
        UPDATE replenishment_orders
        SET status = $2, received_at = NOW(), updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(ReplenishmentStatus::Received.to_string())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        replenishment_id = %id,
        products = received.len(),
        alerts_resolved = resolved,
        admin_id = %staff.user_id,
        "Replenishment received"
    );
    Ok(DataResponse::new(ReplenishmentDetail { order, items }))
}

// =============================================================================
// Expenses
// =============================================================================

fn push_expense_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, filter: &'a ExpenseListFilter) {
    qb.push(" WHERE TRUE");
    if let Some(category) = filter.category {
        qb.push(" AND category = ").push_bind(category.to_string());
    }
    if let Some(from) = filter.from {
        qb.push(" AND expense_date >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND expense_date <= ").push_bind(to);
    }
}

/// GET /admin/warehouse/expenses
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<ExpenseListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let mut totals_query = QueryBuilder::<Postgres>::new(
        "SELECT category, COALESCE(SUM(amount), 0) AS total, COUNT(*) AS count FROM warehouse_expenses",
    );
    push_expense_filter(&mut totals_query, &filter);
    totals_query.push(" GROUP BY category ORDER BY total DESC");
    let totals = totals_query
        .build_query_as::<ExpenseCategoryTotal>()
        .fetch_all(&state.db)
        .await?;

    let mut list_query = QueryBuilder::<Postgres>::new("SELECT * FROM warehouse_expenses");
    push_expense_filter(&mut list_query, &filter);
    list_query
        .push(" ORDER BY expense_date DESC, created_at DESC LIMIT ")
        .push_bind(pagination.limit())
        .push(" OFFSET ")
        .push_bind(pagination.offset());
    let expenses = list_query
        .build_query_as::<WarehouseExpense>()
        .fetch_all(&state.db)
        .await?;

    let count: i64 = totals.iter().map(|t| t.count).sum();
    let total_amount: Decimal = totals.iter().map(|t| t.total).sum();

    Ok(Json(ExpenseListResponse {
        data: expenses,
        totals,
        total_amount,
        pagination: PaginationMeta::new(&pagination, count.max(0) as u64),
    }))
}

/// POST /admin/warehouse/expenses
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Json(req): Json<CreateExpenseRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let description = req.description.trim();
    if description.is_empty() {
        return Err(ApiError::bad_request("Description is required"));
    }
    if req.amount <= Decimal::ZERO {
        return Err(ApiError::bad_request("Amount must be positive"));
    }

    let expense = sqlx::query_as::<_, WarehouseExpense>(
        r#"
        INSERT INTO warehouse_expenses (
            id, category, description, amount, currency, warehouse_task_id, replenishment_id,
            receipt_number, receipt_url, created_by, expense_date, notes, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.category.to_string())
    .bind(description)
    .bind(req.amount)
    .bind(
        clean(req.currency)
            .map(|c| c.to_uppercase())
            .unwrap_or_else(|| "EUR".to_string()),
    )
    .bind(req.warehouse_task_id)
    .bind(req.replenishment_id)
    .bind(clean(req.receipt_number))
    .bind(clean(req.receipt_url))
    .bind(staff.user_id)
    .bind(req.expense_date.unwrap_or_else(|| Utc::now().date_naive()))
    .bind(clean(req.notes))
    .fetch_one(&state.db)
    .await?;

    tracing::info!(
        expense_id = %expense.id,
        category = %expense.category,
        amount = %expense.amount,
        admin_id = %staff.user_id,
        "Warehouse expense recorded"
    );
    Ok(Created(expense))
}

// =============================================================================
// Low-stock alerts
// =============================================================================

/// GET /admin/warehouse/low-stock
pub async fn list_low_stock(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<LowStockListFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let alerts = sqlx::query_as::<_, LowStockAlert>(
        r#"
        SELECT a.id, a.product_id, p.name AS product_name, a.current_stock, a.min_stock,
               a.is_resolved, a.resolved_at, a.resolved_by, a.replenishment_id, a.created_at
        FROM low_stock_alerts a
        JOIN products p ON p.id = a.product_id
        WHERE $1 OR NOT a.is_resolved
        ORDER BY a.is_resolved, a.created_at DESC
        "#,
    )
    .bind(filter.include_resolved.unwrap_or(false))
    .fetch_all(&state.db)
    .await?;
    Ok(DataResponse::new(alerts))
}

/// POST /admin/warehouse/low-stock/scan
pub async fn scan_low_stock(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let created = stock::scan_low_stock(&state.db).await?;
    tracing::info!(created, admin_id = %staff.user_id, "Low-stock scan finished");
    Ok(MessageResponse::new(format!("{} new low-stock alerts", created)))
}

/// POST /admin/warehouse/low-stock/:id/resolve
pub async fn resolve_low_stock(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveLowStockRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let replenishment_id = body.and_then(|Json(r)| r.replenishment_id);

    let resolved = sqlx::query(
        r#"
        UPDATE low_stock_alerts
        SET is_resolved = TRUE, resolved_at = NOW(), resolved_by = $2,
            replenishment_id = COALESCE($3, replenishment_id)
        WHERE id = $1 AND NOT is_resolved
        "#,
    )
    .bind(id)
    .bind(staff.user_id)
    .bind(replenishment_id)
    .execute(&state.db)
    .await?;

    if resolved.rows_affected() == 0 {
        return Err(ApiError::not_found("Open low-stock alert not found"));
    }
    Ok(MessageResponse::new("Low-stock alert resolved"))
}
