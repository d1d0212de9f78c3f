use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer, ExposeHeaders},
    limit::RequestBodyLimitLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::TokenService;
use crate::config::Settings;
use crate::domain::cart::CART_ID_HEADER;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{request_id_layer, REQUEST_ID_HEADER};
use crate::routes;
use crate::services::handelsregister::HandelsregisterChecker;
use crate::services::vat::VatChecker;
use crate::services::whois::WhoisChecker;
use crate::services::{AiClient, PartnerVerifier, RedisCache, StripeClient, VerificationJob};

/// Largest accepted request body (product and blog payloads).
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub settings: Settings,
    pub tokens: TokenService,
    pub cache: RedisCache,
    /// Language model client; `None` without an API key.
    pub ai: Option<AiClient>,
    /// `None` without a Stripe secret key.
    pub stripe: Option<StripeClient>,
    pub verification: VerificationJob,
}

impl AppState {
    pub fn new(db: PgPool, settings: Settings, cache: RedisCache) -> Result<Arc<Self>> {
        let tokens = TokenService::new(
            &settings.jwt_secret,
            settings.jwt_issuer.clone(),
            settings.jwt_ttl_seconds,
        );
        let ai = AiClient::from_settings(&settings)?;
        let stripe = StripeClient::from_settings(&settings)?;

        let verifier = PartnerVerifier::new(
            VatChecker::new(&settings)?,
            WhoisChecker::new(settings.whois_timeout_seconds),
            HandelsregisterChecker::new(&settings)?,
        );
        let verification = VerificationJob::new(db.clone(), verifier);

        Ok(Arc::new(Self {
            db,
            settings,
            tokens,
            cache,
            ai,
            stripe,
            verification,
        }))
    }

    pub fn ai(&self) -> ApiResult<&AiClient> {
        self.ai
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("AI assistant is not configured"))
    }

    pub fn stripe(&self) -> ApiResult<&StripeClient> {
        self.stripe
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("Payments are not configured"))
    }

    pub fn verifier(&self) -> &PartnerVerifier {
        self.verification.verifier()
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);

    // DEBUG spans keep INFO output to business events
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::DEBUG));

    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .nest("/api", routes::api_router())
        .merge(routes::root_router())
        // applied bottom-up: CORS answers preflights before an id is minted
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    let cart_header = HeaderName::from_static(CART_ID_HEADER);

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            REQUEST_ID_HEADER,
            cart_header.clone(),
            axum::http::header::CACHE_CONTROL,
            axum::http::header::IF_NONE_MATCH,
            axum::http::header::IF_MODIFIED_SINCE,
        ]))
        .expose_headers(ExposeHeaders::list([
            REQUEST_ID_HEADER,
            cart_header,
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    #[tokio::test]
    #[ignore = "needs a Redis server at REDIS_URL"]
    async fn oversized_body_is_rejected_with_a_request_id() {
        let settings = Settings::for_tests();
        let db = PgPoolOptions::new().connect_lazy(&settings.database_url).unwrap();
        let cache = RedisCache::new(&settings.redis_url, 60).await.unwrap();
        let app = create_app(AppState::new(db, settings, cache).unwrap());

        let request = Request::post("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, MAX_BODY_BYTES + 1)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }
}
