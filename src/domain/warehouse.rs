//! Warehouse domain types
//!
//! Fulfillment tasks, stock movements, supplier replenishments, expenses and
//! low-stock alerts.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{parse_text, text_of};

pub const DEFAULT_TASK_PRIORITY: i32 = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Packed,
    Ready,
    Shipped,
    InTransit,
    Delivered,
    Returned,
    Cancelled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

impl TaskStatus {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Delivered | Self::Returned | Self::Cancelled)
    }

    /// Whether a parcel in this state may be packed.
    pub fn can_pack(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Packed)
    }

    pub fn can_ship(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing | Self::Packed | Self::Ready)
    }

    pub fn can_deliver(&self) -> bool {
        matches!(self, Self::Shipped | Self::InTransit)
    }

    /// Check a status change made through a plain task update. Packing,
    /// shipping and delivery stamp times and move the order, so those
    /// statuses are only reachable through their own actions.
    pub fn manual_transition(self, to: TaskStatus) -> Result<(), TaskTransitionError> {
        let action = match to {
            Self::Packed => Some("pack"),
            Self::Shipped => Some("ship"),
            Self::Delivered => Some("deliver"),
            _ => None,
        };
        if let Some(action) = action {
            return Err(TaskTransitionError::DedicatedAction { to, action });
        }
        if self == to {
            return Ok(());
        }

        let allowed = match to {
            Self::Pending | Self::Processing | Self::Ready | Self::Cancelled => self.can_ship(),
            Self::InTransit => self == Self::Shipped,
            Self::Returned => matches!(self, Self::Shipped | Self::InTransit),
            Self::Packed | Self::Shipped | Self::Delivered => false,
        };
        if allowed {
            Ok(())
        } else {
            Err(TaskTransitionError::NotAllowed { from: self, to })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TaskTransitionError {
    #[error("Status '{to}' is set with POST /admin/warehouse/tasks/:id/{action}")]
    DedicatedAction { to: TaskStatus, action: &'static str },
    #[error("A task in status '{from}' cannot move to '{to}'")]
    NotAllowed { from: TaskStatus, to: TaskStatus },
}

/// Fulfillment task for one order
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WarehouseTask {
    pub id: Uuid,
    pub task_number: String,
    pub order_id: Uuid,
    pub status: String,
    pub priority: i32,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub assigned_to: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier: Option<String>,
    pub weight_kg: Option<Decimal>,
    pub dimensions: Option<String>,
    pub shipping_cost: Option<Decimal>,
    pub packed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WarehouseTask {
    pub fn status(&self) -> TaskStatus {
        parse_text(&self.status).unwrap_or_default()
    }
}

pub fn validate_priority(priority: i32) -> Result<i32, String> {
    if (1..=5).contains(&priority) {
        Ok(priority)
    } else {
        Err("Priority must be between 1 and 5".to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub order_id: Uuid,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub shipping_cost: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PackTaskRequest {
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    #[serde(default)]
    pub dimensions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShipTaskRequest {
    pub tracking_number: String,
    #[serde(default)]
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskListFilter {
    #[serde(default)]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    In,
    Out,
    Adjustment,
    Return,
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

/// Stock level after applying `delta`; `None` when it would go below zero.
pub fn apply_stock_delta(current: i32, delta: i32) -> Option<i32> {
    current.checked_add(delta).filter(|s| *s >= 0)
}

/// Stock movement ledger entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StockMovement {
    pub id: Uuid,
    pub product_id: Uuid,
    pub movement_type: String,
    pub quantity: i32,
    pub stock_after: i32,
    pub reason: Option<String>,
    pub reference_id: Option<Uuid>,
    pub notes: Option<String>,
    pub performed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordMovementRequest {
    pub product_id: Uuid,
    /// Signed change: positive adds stock, negative removes it.
    pub quantity: i32,
    pub movement_type: MovementType,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovementListFilter {
    #[serde(default)]
    pub product_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReplenishmentStatus {
    Draft,
    Pending,
    Approved,
    Ordered,
    Shipped,
    Received,
    Cancelled,
}

impl Default for ReplenishmentStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl fmt::Display for ReplenishmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

/// Purchase order to a supplier
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReplenishmentOrder {
    pub id: Uuid,
    pub order_number: String,
    pub status: String,
    pub supplier_name: Option<String>,
    pub supplier_contact: Option<String>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_by: Option<Uuid>,
    pub ordered_at: Option<DateTime<Utc>>,
    pub expected_at: Option<DateTime<Utc>>,
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReplenishmentOrder {
    pub fn status(&self) -> ReplenishmentStatus {
        parse_text(&self.status).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReplenishmentItem {
    pub id: Uuid,
    pub replenishment_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub sku: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplenishmentDetail {
    #[serde(flatten)]
    pub order: ReplenishmentOrder,
    pub items: Vec<ReplenishmentItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplenishmentItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    #[serde(default)]
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReplenishmentRequest {
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub supplier_contact: Option<String>,
    #[serde(default)]
    pub shipping_cost: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub expected_at: Option<DateTime<Utc>>,
    pub items: Vec<ReplenishmentItemRequest>,
}

impl CreateReplenishmentRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.items.is_empty() {
            return Err("A replenishment needs at least one item".to_string());
        }
        if self.items.iter().any(|i| i.quantity <= 0) {
            return Err("Item quantities must be positive".to_string());
        }
        if self.shipping_cost.is_sign_negative()
            || self.items.iter().any(|i| i.unit_price.is_sign_negative())
        {
            return Err("Prices cannot be negative".to_string());
        }
        Ok(())
    }

    /// `(subtotal, total)` where total adds shipping.
    pub fn totals(&self) -> (Decimal, Decimal) {
        let subtotal: Decimal = self
            .items
            .iter()
            .map(|i| i.unit_price * Decimal::from(i.quantity))
            .sum();
        (subtotal, subtotal + self.shipping_cost)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReplenishmentRequest {
    #[serde(default)]
    pub status: Option<ReplenishmentStatus>,
    #[serde(default)]
    pub is_paid: Option<bool>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub expected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Shipping,
    Packaging,
    Warehouse,
    Return,
    Other,
}

impl fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WarehouseExpense {
    pub id: Uuid,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub currency: String,
    pub warehouse_task_id: Option<Uuid>,
    pub replenishment_id: Option<Uuid>,
    pub receipt_number: Option<String>,
    pub receipt_url: Option<String>,
    pub created_by: Option<Uuid>,
    pub expense_date: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateExpenseRequest {
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub warehouse_task_id: Option<Uuid>,
    #[serde(default)]
    pub replenishment_id: Option<Uuid>,
    #[serde(default)]
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub receipt_url: Option<String>,
    #[serde(default)]
    pub expense_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseListFilter {
    #[serde(default)]
    pub category: Option<ExpenseCategory>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ExpenseCategoryTotal {
    pub category: String,
    pub total: Decimal,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LowStockAlert {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub current_stock: i32,
    pub min_stock: i32,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<Uuid>,
    pub replenishment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LowStockListFilter {
    #[serde(default)]
    pub include_resolved: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveLowStockRequest {
    #[serde(default)]
    pub replenishment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WarehouseStats {
    pub pending_tasks: i64,
    pub packed_tasks: i64,
    pub shipped_tasks: i64,
    pub open_low_stock_alerts: i64,
    pub open_replenishments: i64,
    pub expenses_this_month: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn stock_never_goes_below_zero() {
        assert_eq!(apply_stock_delta(5, -5), Some(0));
        assert_eq!(apply_stock_delta(5, -6), None);
        assert_eq!(apply_stock_delta(0, 12), Some(12));
        assert_eq!(apply_stock_delta(i32::MAX, 1), None);
    }

    #[test]
    fn task_transitions() {
        assert!(TaskStatus::Packed.can_ship());
        assert!(!TaskStatus::Delivered.can_ship());
        assert!(TaskStatus::InTransit.can_deliver());
        assert!(!TaskStatus::Pending.can_deliver());
        assert!(TaskStatus::Cancelled.is_closed());
    }

    #[test]
    fn plain_updates_cannot_ship_or_deliver() {
        for to in [TaskStatus::Packed, TaskStatus::Shipped, TaskStatus::Delivered] {
            assert!(matches!(
                TaskStatus::Pending.manual_transition(to),
                Err(TaskTransitionError::DedicatedAction { .. })
            ));
        }
        let err = TaskStatus::Pending.manual_transition(TaskStatus::Shipped).unwrap_err();
        assert!(err.to_string().ends_with("/ship"));
    }

    #[test]
    fn plain_updates_follow_the_task_flow() {
        assert!(TaskStatus::Pending.manual_transition(TaskStatus::Processing).is_ok());
        assert!(TaskStatus::Packed.manual_transition(TaskStatus::Ready).is_ok());
        assert!(TaskStatus::Ready.manual_transition(TaskStatus::Cancelled).is_ok());
        assert!(TaskStatus::Shipped.manual_transition(TaskStatus::InTransit).is_ok());
        assert!(TaskStatus::InTransit.manual_transition(TaskStatus::Returned).is_ok());
        assert!(TaskStatus::Processing.manual_transition(TaskStatus::Processing).is_ok());

        assert_eq!(
            TaskStatus::Shipped.manual_transition(TaskStatus::Pending),
            Err(TaskTransitionError::NotAllowed {
                from: TaskStatus::Shipped,
                to: TaskStatus::Pending
            })
        );
        assert!(TaskStatus::Pending.manual_transition(TaskStatus::InTransit).is_err());
        assert!(TaskStatus::Packed.manual_transition(TaskStatus::Returned).is_err());
        assert!(TaskStatus::Shipped.manual_transition(TaskStatus::Cancelled).is_err());
    }

    #[test]
    fn priority_bounds() {
        assert_eq!(validate_priority(1), Ok(1));
        assert!(validate_priority(0).is_err());
        assert!(validate_priority(6).is_err());
    }

    #[test]
    fn replenishment_totals_include_shipping() {
        let req: CreateReplenishmentRequest = serde_json::from_value(serde_json::json!({
            "supplier_name": "Acme",
            "shipping_cost": 12.5,
            "items": [
                {"product_id": Uuid::new_v4(), "quantity": 10, "unit_price": 3.2},
                {"product_id": Uuid::new_v4(), "quantity": 2, "unit_price": 50}
            ]
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.totals(), (dec!(132), dec!(144.5)));
    }

    #[test]
    fn replenishment_requires_positive_items() {
        let req: CreateReplenishmentRequest = serde_json::from_value(serde_json::json!({
            "items": [{"product_id": Uuid::new_v4(), "quantity": 0}]
        }))
        .unwrap();
        assert!(req.validate().is_err());
    }
}
