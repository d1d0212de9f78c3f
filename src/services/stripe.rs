//! Stripe Checkout over the REST API.
//!
//! Sessions are created with form-encoded requests and HTTP basic auth.
//! Webhooks are checked against the `Stripe-Signature` header
//! (`t=<unix>,v1=<hex hmac-sha256 of "t.payload">`).

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Seconds a webhook timestamp may differ from now.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

/// One product line of a Checkout Session
#[derive(Debug, Clone)]
pub struct CheckoutLine {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub currency: String,
    /// Price in minor units (cents)
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        matches!(self.payment_status.as_deref(), Some("paid" | "no_payment_required"))
    }

    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata.get("order_id").and_then(|id| id.parse().ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StripeEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    Missing,
    #[error("malformed Stripe-Signature header")]
    Malformed,
    #[error("timestamp outside tolerance")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

impl StripeClient {
    /// `None` when no secret key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        let Some(key) = settings.stripe_secret_key.as_deref() else {
            tracing::warn!("STRIPE_SECRET_KEY not set; checkout disabled");
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Some(Self {
            client,
            api_base: settings.stripe_api_base.trim_end_matches('/').to_string(),
            secret_key: key.to_string(),
        }))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<CheckoutSession, ApiError> {
        let response = request
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Stripe request failed");
                ApiError::unavailable("Payment provider unavailable")
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                ApiError::Internal(anyhow::anyhow!("Invalid Stripe response: {}", e))
            });
        }

        let message = response
            .json::<StripeErrorResponse>()
            .await
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| format!("Stripe error: {}", status));
        error!(status = %status, message = %message, "Stripe API error");

        if status.is_client_error() {
            Err(ApiError::BadRequest(format!("Payment error: {}", message)))
        } else {
            Err(ApiError::unavailable("Payment provider unavailable"))
        }
    }

    /// Create a `mode=payment` session for an order.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn create_checkout_session(
        &self,
        order_id: Uuid,
        lines: &[CheckoutLine],
        success_url: &str,
        cancel_url: &str,
        customer_email: Option<&str>,
    ) -> Result<CheckoutSession, ApiError> {
        let form = checkout_form(order_id, lines, success_url, cancel_url, customer_email);
        let request = self
            .client
            .post(format!("{}/checkout/sessions", self.api_base))
            .form(&form);
        self.send(request).await
    }

    #[instrument(skip(self))]
    pub async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession, ApiError> {
        if !is_session_id(session_id) {
            return Err(ApiError::bad_request("Invalid checkout session id"));
        }
        let request = self
            .client
            .get(format!("{}/checkout/sessions/{}", self.api_base, session_id));
        self.send(request).await
    }
}

/// Checkout Session ids look like `cs_test_a1B2...`; anything else never
/// reaches the request path.
pub fn is_session_id(id: &str) -> bool {
    id.len() <= 255
        && id
            .strip_prefix("cs_")
            .map_or(false, |rest| {
                !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            })
}

/// Form fields for a Checkout Session, in Stripe's bracket notation.
pub fn checkout_form(
    order_id: Uuid,
    lines: &[CheckoutLine],
    success_url: &str,
    cancel_url: &str,
    customer_email: Option<&str>,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("payment_method_types[0]".to_string(), "card".to_string()),
        ("success_url".to_string(), success_url.to_string()),
        ("cancel_url".to_string(), cancel_url.to_string()),
        ("client_reference_id".to_string(), order_id.to_string()),
        ("metadata[order_id]".to_string(), order_id.to_string()),
    ];
    if let Some(email) = customer_email {
        form.push(("customer_email".to_string(), email.to_string()));
    }

    for (i, line) in lines.iter().enumerate() {
        let p = format!("line_items[{}]", i);
        form.push((format!("{}[quantity]", p), line.quantity.to_string()));
        form.push((
            format!("{}[price_data][currency]", p),
            line.currency.to_lowercase(),
        ));
        form.push((
            format!("{}[price_data][unit_amount]", p),
            line.unit_amount.to_string(),
        ));
        form.push((
            format!("{}[price_data][product_data][name]", p),
            line.name.clone(),
        ));
        if let Some(desc) = line.description.as_deref().filter(|d| !d.is_empty()) {
            form.push((
                format!("{}[price_data][product_data][description]", p),
                desc.to_string(),
            ));
        }
        if let Some(image) = line.image_url.as_deref().filter(|u| !u.is_empty()) {
            form.push((
                format!("{}[price_data][product_data][images][0]", p),
                image.to_string(),
            ));
        }
    }
    form
}

/// Amount in cents, rounded half away from zero.
pub fn to_minor_units(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Check a `Stripe-Signature` header against the raw payload.
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = v.parse::<i64>().ok(),
            Some(("v1", v)) => signatures.push(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    let expected = sign(payload, timestamp, secret);
    if signatures.iter().any(|s| constant_time_eq(s.as_bytes(), expected.as_bytes())) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

fn sign(payload: &[u8], timestamp: i64, secret: &str) -> String {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return String::new();
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const SECRET: &str = "whsec_test";

    #[test]
    fn session_ids_are_checked_before_use() {
        assert!(is_session_id("cs_test_a1B2c3D4e5"));
        assert!(is_session_id("cs_live_XyZ_09"));
        assert!(!is_session_id("cs_"));
        assert!(!is_session_id("pi_3Nx"));
        assert!(!is_session_id("cs_test/../../charges"));
        assert!(!is_session_id("cs_test?expand[]=customer"));
        assert!(!is_session_id("cs_test%2F"));
    }

    #[tokio::test]
    async fn malformed_session_id_never_leaves_the_process() {
        let mut settings = Settings::for_tests();
        settings.stripe_secret_key = Some("sk_test_123".into());
        // nothing listens here; a request would fail with a transport error
        settings.stripe_api_base = "http://127.0.0.1:9/v1".into();
        let stripe = StripeClient::from_settings(&settings).unwrap().unwrap();

        let err = stripe.retrieve_session("cs_test/../customers").await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Invalid checkout session id"));
    }

    #[test]
    fn valid_signature_passes() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let header = format!("t=1700000000,v1={}", sign(payload, 1700000000, SECRET));
        assert_eq!(verify_signature(payload, Some(&header), SECRET, 1700000100), Ok(()));
    }

    #[test]
    fn signature_failures() {
        let payload = b"{}";
        let good = sign(payload, 1700000000, SECRET);

        assert_eq!(verify_signature(payload, None, SECRET, 1700000000), Err(SignatureError::Missing));
        assert_eq!(
            verify_signature(payload, Some("v1=abc"), SECRET, 1700000000),
            Err(SignatureError::Malformed)
        );
        let header = format!("t=1700000000,v1={}", good);
        assert_eq!(
            verify_signature(payload, Some(&header), SECRET, 1700000000 + 301),
            Err(SignatureError::Expired)
        );
        assert_eq!(
            verify_signature(b"{ }", Some(&header), SECRET, 1700000000),
            Err(SignatureError::Mismatch)
        );
        let rotated = format!("t=1700000000,v1=deadbeef,v1={}", good);
        assert_eq!(verify_signature(payload, Some(&rotated), SECRET, 1700000000), Ok(()));
    }

    #[test]
    fn minor_units_round_half_up() {
        assert_eq!(to_minor_units(dec!(19.99)), 1999);
        assert_eq!(to_minor_units(dec!(0.005)), 1);
        assert_eq!(to_minor_units(dec!(12)), 1200);
    }

    #[test]
    fn form_carries_order_metadata_and_lines() {
        let order_id = Uuid::new_v4();
        let lines = vec![CheckoutLine {
            name: "Lamp".into(),
            description: None,
            image_url: Some("https://img/lamp.png".into()),
            currency: "EUR".into(),
            unit_amount: 1999,
            quantity: 2,
        }];
        let form = checkout_form(order_id, &lines, "https://s/ok", "https://s/cancel", None);
        let get = |k: &str| form.iter().find(|(key, _)| key == k).map(|(_, v)| v.as_str());
        assert_eq!(get("mode"), Some("payment"));
        assert_eq!(get("metadata[order_id]"), Some(order_id.to_string().as_str()));
        assert_eq!(get("line_items[0][price_data][currency]"), Some("eur"));
        assert_eq!(get("line_items[0][price_data][unit_amount]"), Some("1999"));
        assert_eq!(get("line_items[0][price_data][product_data][images][0]"), Some("https://img/lamp.png"));
        assert_eq!(get("line_items[0][price_data][product_data][description]"), None);
    }

    #[test]
    fn session_paid_and_order_id() {
        let order_id = Uuid::new_v4();
        let session: CheckoutSession = serde_json::from_value(serde_json::json!({
            "id": "cs_1",
            "payment_status": "paid",
            "metadata": {"order_id": order_id.to_string()},
            "customer_details": {"email": "a@b.de", "name": null}
        }))
        .unwrap();
        assert!(session.is_paid());
        assert_eq!(session.order_id(), Some(order_id));
    }
}
