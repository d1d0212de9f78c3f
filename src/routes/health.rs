use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: ServiceHealth,
}

#[derive(Serialize)]
pub struct ServiceHealth {
    pub database: String,
    pub redis: String,
    pub ai: String,
    pub payments: String,
}

fn configured(present: bool) -> String {
    if present { "configured" } else { "disabled" }.to_string()
}

/// GET /health
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let (db_ok, redis_result) = tokio::join!(db::health_check(&state.db), state.cache.health_check());
    let redis_ok = redis_result.is_ok();

    let status = match (db_ok, redis_ok) {
        (true, true) => "healthy",
        // carts and caches are gone without redis, but the catalog still works
        (true, false) => "degraded",
        _ => "unhealthy",
    };

    let status_code = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let ok = |up: bool| if up { "ok" } else { "error" }.to_string();

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            services: ServiceHealth {
                database: ok(db_ok),
                redis: ok(redis_ok),
                ai: configured(state.ai.is_some()),
                payments: configured(state.stripe.is_some()),
            },
        }),
    )
}
