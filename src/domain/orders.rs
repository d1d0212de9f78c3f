//! Order domain types
//!
//! Orders move through a plain status field:
//! `created -> pending -> paid -> processing -> shipped -> delivered`, with
//! `cancelled` and `refunded` as exits.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{parse_text, text_of};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Created,
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl Default for OrderStatus {
    fn default() -> Self {
        Self::Created
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

impl OrderStatus {
    /// Statuses that count as money received.
    pub fn is_paid_like(&self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Card,
    Invoice,
    Cash,
    Prepaid,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        Self::Card
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
    pub is_b2b: bool,
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub shipping_address: Option<String>,
    pub shipping_city: Option<String>,
    pub shipping_postal_code: Option<String>,
    pub shipping_country: Option<String>,
    pub shipping_method: Option<String>,
    pub shipping_cost: Decimal,
    pub tracking_number: Option<String>,
    pub payment_method: String,
    pub payment_status: String,
    #[serde(skip_serializing)]
    pub stripe_payment_intent: Option<String>,
    #[serde(skip_serializing)]
    pub stripe_session_id: Option<String>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn status(&self) -> OrderStatus {
        parse_text(&self.status).unwrap_or_default()
    }
}

/// Snapshot of a purchased product
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub sku: Option<String>,
    pub price: Decimal,
    pub quantity: i32,
    pub currency: String,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// A line going into a new order.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub sku: Option<String>,
    pub price: Decimal,
    pub quantity: u32,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub amount: Decimal,
}

impl OrderTotals {
    /// `amount = subtotal - discount + shipping + tax`
    pub fn compute(
        lines: &[NewOrderLine],
        discount: Decimal,
        shipping_cost: Decimal,
        tax: Decimal,
    ) -> Self {
        let subtotal: Decimal = lines
            .iter()
            .map(|l| l.price * Decimal::from(l.quantity))
            .sum();
        Self {
            subtotal,
            discount,
            shipping_cost,
            tax,
            amount: subtotal - discount + shipping_cost + tax,
        }
    }
}

/// `PREFIX-YYYY-00042` style document numbers.
pub fn document_number(prefix: &str, year: i32, seq: i64) -> String {
    format!("{}-{}-{:05}", prefix, year, seq)
}

pub fn order_prefix(is_b2b: bool) -> &'static str {
    if is_b2b {
        "B2B"
    } else {
        "SM"
    }
}

/// Contact details given at checkout; logged-in buyers default to their
/// account data.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub order_number: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderListFilter {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrderNotesRequest {
    #[serde(default)]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderStats {
    pub total: i64,
    pub paid: i64,
    pub pending: i64,
    pub revenue: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn line(price: Decimal, quantity: u32) -> NewOrderLine {
        NewOrderLine {
            product_id: Uuid::new_v4(),
            product_name: "Item".into(),
            sku: None,
            price,
            quantity,
            currency: "EUR".into(),
        }
    }

    #[test]
    fn totals_follow_amount_formula() {
        let lines = vec![line(dec!(10.50), 2), line(dec!(4), 3)];
        let totals = OrderTotals::compute(&lines, dec!(5), dec!(7.90), dec!(1.10));
        assert_eq!(totals.subtotal, dec!(33));
        assert_eq!(totals.amount, dec!(37));
    }

    #[test]
    fn document_numbers_are_zero_padded() {
        assert_eq!(document_number(order_prefix(false), 2025, 7), "SM-2025-00007");
        assert_eq!(document_number(order_prefix(true), 2025, 123456), "B2B-2025-123456");
        assert_eq!(document_number("WH", 2026, 1), "WH-2026-00001");
    }

    #[test]
    fn paid_like_statuses() {
        assert_eq!(OrderStatus::Paid.to_string(), "paid");
        assert!(OrderStatus::Shipped.is_paid_like());
        assert!(!OrderStatus::Pending.is_paid_like());
    }
}
