//! Storefront chatbot
//!
//! The system prompt is rebuilt per request from the AI settings, the shop's
//! own instructions and a plain-text catalog cached in Redis.

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::domain::ai::{catalog_context, ChatRequest, ChatResponse};
use crate::domain::catalog::{Category, Product};
use crate::error::{ApiError, ApiResult};
use crate::services::cache::keys;
use crate::services::settings;

const MAX_MESSAGE_CHARS: usize = 2000;

/// Catalog text for the prompt, from cache when possible.
async fn cached_catalog(state: &AppState) -> ApiResult<String> {
    let key = keys::catalog_context();
    if let Some(text) = state.cache.get::<String>(&key).await {
        return Ok(text);
    }

    let categories = sqlx::query_as::<_, Category>(
        "SELECT * FROM categories WHERE is_active ORDER BY sort_order, name",
    )
    .fetch_all(&state.db)
    .await?;
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE is_active ORDER BY name",
    )
    .fetch_all(&state.db)
    .await?;

    let text = catalog_context(&categories, &products);
    if let Err(e) = state.cache.set(&key, &text).await {
        tracing::warn!(error = %e, "Failed to cache catalog context");
    }
    Ok(text)
}

/// POST /chat
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::bad_request(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_CHARS
        )));
    }

    let ai = state.ai()?;
    let ai_settings = settings::ai_settings(&state.db).await?;
    if !ai_settings.chatbot_enabled {
        return Err(ApiError::forbidden("The assistant is disabled"));
    }

    let site = settings::site_settings(&state.db).await?;
    let catalog = cached_catalog(&state).await?;
    let system_prompt = ai_settings.chatbot_prompt(site.ai_instructions.as_deref(), &catalog);

    let answer = ai
        .chat(
            &system_prompt,
            message,
            ai_settings.chatbot_max_tokens.max(1) as u32,
            ai_settings.chatbot_temperature,
        )
        .await?;

    Ok(DataResponse::new(ChatResponse {
        message: answer,
        assistant: ai_settings.chatbot_name,
    }))
}
