//! Checkout routes
//!
//! Orders are created `pending` before redirecting to Stripe Checkout and
//! become `paid` from either the success redirect or the webhook, whichever
//! arrives first.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::{DataResponse, MessageResponse};
use crate::app::AppState;
use crate::auth::MaybeAuth;
use crate::domain::cart::{Cart, CartView, CART_ID_HEADER};
use crate::domain::clean;
use crate::domain::orders::{
    CheckoutRequest, CheckoutResponse, NewOrderLine, OrderDetail, OrderStatus,
};
use crate::error::ApiError;
use crate::routes::cart::{cart_id, cart_products, load_cart, save_cart};
use crate::services::orders::{self, NewOrder};
use crate::services::stripe::{
    to_minor_units, verify_signature, CheckoutLine, CheckoutSession, StripeEvent,
};
use crate::services::{accounts, settings};

const SESSION_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: String,
}

#[derive(Serialize)]
pub struct CheckoutResult {
    pub paid: bool,
    pub order: Option<OrderDetail>,
}

#[derive(Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

fn checkout_lines(view: &CartView) -> Vec<CheckoutLine> {
    view.items
        .iter()
        .map(|item| CheckoutLine {
            name: item.name.clone(),
            description: item.sku.clone(),
            image_url: item.image_url.clone(),
            currency: item.currency.clone(),
            unit_amount: to_minor_units(item.unit_price),
            quantity: item.quantity,
        })
        .collect()
}

fn order_lines(view: &CartView) -> Vec<NewOrderLine> {
    view.items
        .iter()
        .map(|item| NewOrderLine {
            product_id: item.product_id,
            product_name: item.name.clone(),
            sku: item.sku.clone(),
            price: item.unit_price,
            quantity: item.quantity,
            currency: item.currency.clone(),
        })
        .collect()
}

/// POST /checkout
///
/// Turn the cart into a `pending` order and open a Stripe Checkout Session.
pub async fn create_checkout(
    State(state): State<Arc<AppState>>,
    auth: MaybeAuth,
    headers: HeaderMap,
    body: Option<Json<CheckoutRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let is_b2b = auth.is_b2b();

    let id = cart_id(&headers);
    let cart = load_cart(&state, id).await;
    let products = cart_products(&state, &cart).await?;
    let view = CartView::build(id, &cart, &products, is_b2b);
    if view.items.is_empty() {
        return Err(ApiError::bad_request("Cart is empty"));
    }

    let stripe = state.stripe()?;

    let site = settings::site_settings(&state.db).await?;
    let minimum = site.min_order_for(is_b2b);
    if view.total < minimum {
        return Err(ApiError::bad_request(format!(
            "Minimum order amount is {} {}",
            minimum, site.default_currency
        )));
    }

    let user = match &auth.0 {
        Some(ctx) => accounts::find_user(&state.db, ctx.user_id).await?,
        None => None,
    };

    let new_order = NewOrder {
        user_id: user.as_ref().map(|u| u.id),
        company_id: user.as_ref().filter(|u| u.is_b2b()).and_then(|u| u.company_id),
        is_b2b,
        customer_name: clean(req.customer_name).or_else(|| user.as_ref().map(|u| u.full_name())),
        customer_email: clean(req.customer_email).or_else(|| user.as_ref().map(|u| u.email.clone())),
        customer_phone: clean(req.customer_phone).or_else(|| user.as_ref().and_then(|u| u.phone.clone())),
        currency: view
            .currency
            .clone()
            .unwrap_or_else(|| site.default_currency.clone()),
        lines: order_lines(&view),
    };
    let order = orders::create_order(&state.db, &new_order).await?;

    let base = &state.settings.public_base_url;
    let success_url = format!("{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}", base);
    let cancel_url = format!("{}/checkout/cancel", base);

    let session = match stripe
        .create_checkout_session(
            order.id,
            &checkout_lines(&view),
            &success_url,
            &cancel_url,
            order.customer_email.as_deref(),
        )
        .await
    {
        Ok(session) => session,
        Err(e) => {
            orders::set_status(&state.db, order.id, OrderStatus::Cancelled, None).await?;
            return Err(e);
        }
    };

    orders::attach_session(&state.db, order.id, &session.id).await?;
    let checkout_url = session
        .url
        .ok_or_else(|| ApiError::internal("Checkout session has no URL"))?;

    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(DataResponse::new(CheckoutResponse {
        order_id: order.id,
        order_number: order.order_number,
        checkout_url,
    }))
}

/// GET /checkout/success
///
/// Confirm a paid session after the Stripe redirect and empty the cart.
pub async fn checkout_success(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SuccessQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let stripe = state.stripe()?;
    let session = stripe.retrieve_session(&query.session_id).await?;

    let paid = session.is_paid();
    if paid {
        orders::mark_paid(&state.db, &session).await?;
        if headers.contains_key(CART_ID_HEADER) {
            save_cart(&state, cart_id(&headers), &Cart::default()).await?;
        }
    }

    let order_id: Option<uuid::Uuid> =
        sqlx::query_scalar("SELECT id FROM orders WHERE stripe_session_id = $1 OR id = $2 LIMIT 1")
            .bind(&session.id)
            .bind(session.order_id())
            .fetch_optional(&state.db)
            .await?;
    let order = match order_id {
        Some(id) => orders::fetch_detail(&state.db, id).await?,
        None => None,
    };

    // the webhook may have settled the order first
    let paid = order
        .as_ref()
        .map_or(paid, |d| d.order.status().is_paid_like());
    Ok(DataResponse::new(CheckoutResult { paid, order }))
}

/// GET /checkout/cancel
pub async fn checkout_cancel() -> impl IntoResponse {
    MessageResponse::with_code(
        "Payment was cancelled. Your cart has been kept.",
        "CHECKOUT_CANCELLED",
    )
}

/// POST /webhooks/stripe
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(secret) = state.settings.stripe_webhook_secret.as_deref() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok());
        verify_signature(&body, signature, secret, Utc::now().timestamp()).map_err(|e| {
            tracing::warn!(error = %e, "Rejected Stripe webhook");
            ApiError::bad_request("Invalid signature")
        })?;
    }

    let event: StripeEvent = serde_json::from_slice(&body)
        .map_err(|_| ApiError::bad_request("Invalid payload"))?;

    tracing::info!(event_id = %event.id, event_type = %event.kind, "Stripe webhook received");

    if event.kind == SESSION_COMPLETED {
        let session: CheckoutSession = serde_json::from_value(event.data.object)
            .map_err(|_| ApiError::bad_request("Invalid checkout session"))?;
        if session.is_paid() {
            orders::mark_paid(&state.db, &session).await?;
        }
    }

    Ok(Json(WebhookAck { received: true }))
}
