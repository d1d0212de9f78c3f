//! Catalog domain types
//!
//! Products, categories and the pricing/stock rules attached to them.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use uuid::Uuid;

use crate::domain::slug::parse_slug;

/// Category entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

impl CreateCategoryRequest {
    /// Trimmed name and normalized slug, both required.
    pub fn validate(&self) -> Result<(String, String), String> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err("Category name is required".to_string());
        }
        if self.slug.trim().is_empty() {
            return Err("Category slug is required".to_string());
        }
        let slug = parse_slug(&self.slug)
            .ok_or_else(|| "Category slug must contain letters or digits".to_string())?;
        Ok((name.to_string(), slug))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateCategoryRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub sort_order: Option<i32>,
}

impl UpdateCategoryRequest {
    /// Normalized replacement slug, if one was sent.
    pub fn validate(&self) -> Result<Option<String>, String> {
        if self.name.as_deref().map_or(false, |n| n.trim().is_empty()) {
            return Err("Category name cannot be empty".to_string());
        }
        self.slug
            .as_deref()
            .map(|slug| parse_slug(slug).ok_or_else(|| "Category slug must contain letters or digits".to_string()))
            .transpose()
    }
}

/// Product entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: Option<String>,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    #[serde(skip_serializing)]
    pub cost_price: Option<Decimal>,
    pub b2b_price: Option<Decimal>,
    pub min_b2b_quantity: i32,
    pub currency: String,
    pub stock: i32,
    pub reserved: i32,
    pub min_stock: i32,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub gallery: Json<Vec<String>>,
    pub category_id: Option<Uuid>,
    pub is_active: bool,
    pub is_featured: bool,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Stock not held back by reservations, never negative.
    pub fn available_stock(&self) -> i32 {
        (self.stock - self.reserved).max(0)
    }

    pub fn is_in_stock(&self) -> bool {
        self.available_stock() > 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.min_stock > 0 && self.stock <= self.min_stock
    }

    pub fn has_discount(&self) -> bool {
        matches!(self.old_price, Some(old) if old > self.price)
    }

    /// Rounded percentage off `old_price`, 0 without a discount.
    pub fn discount_percent(&self) -> i32 {
        match self.old_price {
            Some(old) if old > self.price && !old.is_zero() => ((Decimal::ONE - self.price / old)
                * Decimal::ONE_HUNDRED)
            .round()
            .to_i32()
            .unwrap_or(0),
            _ => 0,
        }
    }

    /// Unit price for a buyer; partners get `b2b_price` when one is set.
    pub fn price_for(&self, is_b2b: bool) -> Decimal {
        match (is_b2b, self.b2b_price) {
            (true, Some(b2b)) => b2b,
            _ => self.price,
        }
    }
}

/// Product with derived storefront fields.
#[derive(Debug, Clone, Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub available_stock: i32,
    pub in_stock: bool,
    pub low_stock: bool,
    pub has_discount: bool,
    pub discount_percent: i32,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            available_stock: product.available_stock(),
            in_stock: product.is_in_stock(),
            low_stock: product.is_low_stock(),
            has_discount: product.has_discount(),
            discount_percent: product.discount_percent(),
            product,
        }
    }
}

/// Product priced for the buyer looking at it.
#[derive(Debug, Clone, Serialize)]
pub struct ShopProduct {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub unit_price: Decimal,
}

impl ShopProduct {
    pub fn new(product: Product, is_b2b: bool) -> Self {
        Self {
            unit_price: product.price_for(is_b2b),
            product: product.into(),
        }
    }
}

/// Admin view also exposes purchase cost.
#[derive(Debug, Clone, Serialize)]
pub struct AdminProductResponse {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub cost_price: Option<Decimal>,
}

impl From<Product> for AdminProductResponse {
    fn from(product: Product) -> Self {
        Self {
            cost_price: product.cost_price,
            product: product.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub old_price: Option<Decimal>,
    #[serde(default)]
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub b2b_price: Option<Decimal>,
    #[serde(default)]
    pub min_b2b_quantity: Option<i32>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub stock: Option<i32>,
    #[serde(default)]
    pub min_stock: Option<i32>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub gallery: Vec<String>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Product name is required".to_string());
        }
        validate_money("price", Some(self.price))?;
        validate_money("old_price", self.old_price)?;
        validate_money("cost_price", self.cost_price)?;
        validate_money("b2b_price", self.b2b_price)?;
        if self.stock.unwrap_or(0) < 0 || self.min_stock.unwrap_or(0) < 0 {
            return Err("Stock values cannot be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProductRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub old_price: Option<Decimal>,
    #[serde(default)]
    pub cost_price: Option<Decimal>,
    #[serde(default)]
    pub b2b_price: Option<Decimal>,
    #[serde(default)]
    pub min_b2b_quantity: Option<i32>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub min_stock: Option<i32>,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub gallery: Option<Vec<String>>,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.name, Some(n) if n.trim().is_empty()) {
            return Err("Product name cannot be empty".to_string());
        }
        validate_money("price", self.price)?;
        validate_money("old_price", self.old_price)?;
        validate_money("cost_price", self.cost_price)?;
        validate_money("b2b_price", self.b2b_price)?;
        if self.min_stock.unwrap_or(0) < 0 {
            return Err("Stock values cannot be negative".to_string());
        }
        Ok(())
    }
}

fn validate_money(field: &str, value: Option<Decimal>) -> Result<(), String> {
    match value {
        Some(v) if v.is_sign_negative() => Err(format!("{} cannot be negative", field)),
        _ => Ok(()),
    }
}

/// Query parameters for the storefront product grid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub featured: Option<bool>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn category_needs_name_and_usable_slug() {
        let ok: CreateCategoryRequest =
            serde_json::from_value(json!({"name": " Phones ", "slug": "Phones & Tablets"})).unwrap();
        assert_eq!(
            ok.validate().unwrap(),
            ("Phones".to_string(), "phones-tablets".to_string())
        );

        let missing: CreateCategoryRequest = serde_json::from_value(json!({"name": "Phones"})).unwrap();
        assert_eq!(missing.validate().unwrap_err(), "Category slug is required");

        let symbols: CreateCategoryRequest =
            serde_json::from_value(json!({"name": "!!!", "slug": "!!!"})).unwrap();
        assert!(symbols.validate().is_err());

        let rename: UpdateCategoryRequest = serde_json::from_value(json!({"slug": "???"})).unwrap();
        assert!(rename.validate().is_err());
        let untouched: UpdateCategoryRequest = serde_json::from_value(json!({"is_active": false})).unwrap();
        assert_eq!(untouched.validate().unwrap(), None);
    }

    pub(crate) fn product(price: Decimal) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Lamp".into(),
            sku: Some("LMP-1".into()),
            price,
            old_price: None,
            cost_price: None,
            b2b_price: None,
            min_b2b_quantity: 1,
            currency: "EUR".into(),
            stock: 10,
            reserved: 0,
            min_stock: 0,
            short_description: None,
            description: None,
            image_url: None,
            gallery: Json(vec![]),
            category_id: None,
            is_active: true,
            is_featured: false,
            meta_title: None,
            meta_description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn available_stock_never_negative() {
        let mut p = product(dec!(10));
        p.stock = 2;
        p.reserved = 5;
        assert_eq!(p.available_stock(), 0);
        assert!(!p.is_in_stock());
    }

    #[test]
    fn low_stock_requires_threshold() {
        let mut p = product(dec!(10));
        p.stock = 0;
        assert!(!p.is_low_stock());
        p.min_stock = 3;
        p.stock = 3;
        assert!(p.is_low_stock());
        p.stock = 4;
        assert!(!p.is_low_stock());
    }

    #[test]
    fn discount_percent_is_rounded() {
        let mut p = product(dec!(66.50));
        p.old_price = Some(dec!(100));
        assert!(p.has_discount());
        assert_eq!(p.discount_percent(), 34);

        p.old_price = Some(dec!(50));
        assert!(!p.has_discount());
        assert_eq!(p.discount_percent(), 0);
    }

    #[test]
    fn partners_get_b2b_price_when_set() {
        let mut p = product(dec!(120));
        assert_eq!(p.price_for(true), dec!(120));
        p.b2b_price = Some(dec!(95));
        assert_eq!(p.price_for(true), dec!(95));
        assert_eq!(p.price_for(false), dec!(120));
    }

    #[test]
    fn create_request_rejects_negative_prices() {
        let req: CreateProductRequest =
            serde_json::from_value(serde_json::json!({"name": "Desk", "price": -1.0})).unwrap();
        assert!(req.validate().is_err());

        let req: CreateProductRequest = serde_json::from_value(
            serde_json::json!({"name": "Desk", "price": 249.99, "stock": 4}),
        )
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.price, dec!(249.99));
    }
}
