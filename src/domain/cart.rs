//! Shopping cart
//!
//! The cart itself is a product-id to quantity map persisted in Redis; the
//! view is rebuilt against current catalog prices on every read.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::catalog::Product;

/// Header carrying the anonymous cart id.
pub const CART_ID_HEADER: &str = "x-cart-id";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub items: BTreeMap<Uuid, u32>,
}

impl Cart {
    /// Add to an existing line; quantities below 1 count as 1.
    pub fn add(&mut self, product_id: Uuid, quantity: i64) {
        let quantity = quantity.clamp(1, u32::MAX as i64) as u32;
        let entry = self.items.entry(product_id).or_insert(0);
        *entry = entry.saturating_add(quantity);
    }

    /// Replace a line's quantity; zero or less removes the line.
    pub fn set(&mut self, product_id: Uuid, quantity: i64) {
        if quantity <= 0 {
            self.items.remove(&product_id);
        } else {
            self.items
                .insert(product_id, quantity.min(u32::MAX as i64) as u32);
        }
    }

    pub fn remove(&mut self, product_id: Uuid) -> bool {
        self.items.remove(&product_id).is_some()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines.
    pub fn count(&self) -> u64 {
        self.items.values().map(|q| *q as u64).sum()
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.items.keys().copied().collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub unit_price: Decimal,
    pub currency: String,
    pub quantity: u32,
    pub line_total: Decimal,
    pub available_stock: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub cart_id: Uuid,
    pub items: Vec<CartLine>,
    pub total: Decimal,
    pub count: u64,
    pub currency: Option<String>,
}

impl CartView {
    /// Price the cart against the given products. Lines whose product is
    /// missing or inactive are left out of both the items and the totals.
    pub fn build(cart_id: Uuid, cart: &Cart, products: &[Product], is_b2b: bool) -> Self {
        let mut items = Vec::with_capacity(cart.items.len());
        let mut total = Decimal::ZERO;
        let mut count = 0u64;

        for (product_id, quantity) in &cart.items {
            let Some(product) = products
                .iter()
                .find(|p| p.id == *product_id && p.is_active)
            else {
                continue;
            };

            let unit_price = product.price_for(is_b2b);
            let line_total = unit_price * Decimal::from(*quantity);
            total += line_total;
            count += *quantity as u64;

            items.push(CartLine {
                product_id: product.id,
                name: product.name.clone(),
                sku: product.sku.clone(),
                image_url: product.image_url.clone(),
                unit_price,
                currency: product.currency.clone(),
                quantity: *quantity,
                line_total,
                available_stock: product.available_stock(),
            });
        }

        let currency = items.first().map(|l| l.currency.clone());

        Self {
            cart_id,
            items,
            total,
            count,
            currency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::tests::product;
    use rust_decimal_macros::dec;

    #[test]
    fn add_accumulates_and_floors_quantity() {
        let id = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.add(id, 2);
        cart.add(id, 0);
        assert_eq!(cart.items[&id], 3);
        assert_eq!(cart.count(), 3);
    }

    #[test]
    fn set_to_zero_removes_line() {
        let id = Uuid::new_v4();
        let mut cart = Cart::default();
        cart.add(id, 4);
        cart.set(id, 1);
        assert_eq!(cart.items[&id], 1);
        cart.set(id, 0);
        assert!(cart.is_empty());
        assert!(!cart.remove(id));
    }

    #[test]
    fn view_totals_skip_inactive_products() {
        let mut lamp = product(dec!(19.99));
        let mut desk = product(dec!(200));
        desk.is_active = false;
        lamp.b2b_price = Some(dec!(15));

        let mut cart = Cart::default();
        cart.add(lamp.id, 3);
        cart.add(desk.id, 1);

        let view = CartView::build(Uuid::new_v4(), &cart, &[lamp.clone(), desk.clone()], false);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.total, dec!(59.97));
        assert_eq!(view.count, 3);
        assert_eq!(view.currency.as_deref(), Some("EUR"));

        let partner = CartView::build(Uuid::new_v4(), &cart, &[lamp, desk], true);
        assert_eq!(partner.total, dec!(45));
    }
}
