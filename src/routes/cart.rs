//! Cart routes
//!
//! The cart lives in Redis under the id sent in `X-Cart-Id`. A request
//! without a usable id gets a fresh one, returned in the body and header.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::MaybeAuth;
use crate::domain::cart::{AddToCartRequest, Cart, CartView, UpdateCartItemRequest, CART_ID_HEADER};
use crate::domain::catalog::Product;
use crate::error::ApiError;
use crate::services::cache::keys;

/// Cart id from the request header, or a new one.
pub(crate) fn cart_id(headers: &HeaderMap) -> Uuid {
    headers
        .get(CART_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v.trim()).ok())
        .unwrap_or_else(Uuid::new_v4)
}

pub(crate) async fn load_cart(state: &AppState, cart_id: Uuid) -> Cart {
    state
        .cache
        .get::<Cart>(&keys::cart(&cart_id.to_string()))
        .await
        .unwrap_or_default()
}

pub(crate) async fn save_cart(state: &AppState, cart_id: Uuid, cart: &Cart) -> Result<(), ApiError> {
    let key = keys::cart(&cart_id.to_string());
    if cart.is_empty() {
        state.cache.delete(&key).await?;
    } else {
        state
            .cache
            .set_with_ttl(&key, cart, Duration::from_secs(state.settings.cart_ttl_seconds))
            .await?;
    }
    Ok(())
}

pub(crate) async fn cart_products(state: &AppState, cart: &Cart) -> Result<Vec<Product>, ApiError> {
    if cart.is_empty() {
        return Ok(Vec::new());
    }
    Ok(
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = ANY($1)")
            .bind(cart.product_ids())
            .fetch_all(&state.db)
            .await?,
    )
}

async fn respond(
    state: &AppState,
    cart_id: Uuid,
    cart: &Cart,
    is_b2b: bool,
) -> Result<impl IntoResponse, ApiError> {
    let products = cart_products(state, cart).await?;
    let view = CartView::build(cart_id, cart, &products, is_b2b);
    Ok((
        [(HeaderName::from_static(CART_ID_HEADER), cart_id.to_string())],
        DataResponse::new(view),
    ))
}

/// GET /cart
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let id = cart_id(&headers);
    let cart = load_cart(&state, id).await;
    respond(&state, id, &cart, auth.is_b2b()).await
}

/// POST /cart/items
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    headers: HeaderMap,
    Json(req): Json<AddToCartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let available: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1 AND is_active)")
            .bind(req.product_id)
            .fetch_one(&state.db)
            .await?;
    if !available {
        return Err(ApiError::not_found("Product not found"));
    }

    let id = cart_id(&headers);
    let mut cart = load_cart(&state, id).await;
    cart.add(req.product_id, req.quantity);
    save_cart(&state, id, &cart).await?;

    tracing::debug!(cart_id = %id, product_id = %req.product_id, "Cart item added");
    respond(&state, id, &cart, auth.is_b2b()).await
}

/// PUT /cart/items/:product_id
///
/// A quantity of zero or less removes the line.
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
    Json(req): Json<UpdateCartItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = cart_id(&headers);
    let mut cart = load_cart(&state, id).await;
    cart.set(product_id, req.quantity);
    save_cart(&state, id, &cart).await?;
    respond(&state, id, &cart, auth.is_b2b()).await
}

/// DELETE /cart/items/:product_id
pub async fn remove_item(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    headers: HeaderMap,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let id = cart_id(&headers);
    let mut cart = load_cart(&state, id).await;
    if !cart.remove(product_id) {
        return Err(ApiError::not_found("Product is not in the cart"));
    }
    save_cart(&state, id, &cart).await?;
    respond(&state, id, &cart, auth.is_b2b()).await
}

/// DELETE /cart
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let id = cart_id(&headers);
    let mut cart = load_cart(&state, id).await;
    cart.clear();
    save_cart(&state, id, &cart).await?;
    respond(&state, id, &cart, auth.is_b2b()).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn reuses_valid_cart_id_and_mints_otherwise() {
        let existing = Uuid::new_v4();
        let mut headers = HeaderMap::new();
        headers.insert(CART_ID_HEADER, HeaderValue::from_str(&existing.to_string()).unwrap());
        assert_eq!(cart_id(&headers), existing);

        headers.insert(CART_ID_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_ne!(cart_id(&headers), existing);
        assert_ne!(cart_id(&HeaderMap::new()), cart_id(&HeaderMap::new()));
    }
}
