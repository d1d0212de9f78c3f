//! Client for an OpenAI-compatible chat and image API.
//!
//! Provides:
//! - Chat completions for the storefront assistant
//! - JSON-mode completions for blog articles
//! - Image generation for article covers

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::config::Settings;
use crate::domain::blog::GeneratedArticle;
use crate::error::ApiError;

const ARTICLE_SYSTEM_PROMPT: &str = "You are an SEO copywriter for an online shop. \
Reply with a single JSON object with the keys: title, excerpt, content (HTML with \
<h2>/<h3>/<p>/<ul> tags), meta_title (max 60 chars), meta_description (max 160 chars), \
tags (array of strings).";

/// Client for the language model API.
#[derive(Clone)]
pub struct AiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    image_model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Error envelope returned by the API.
#[derive(Debug, Deserialize)]
struct AiErrorResponse {
    error: AiErrorBody,
}

#[derive(Debug, Deserialize)]
struct AiErrorBody {
    message: String,
}

impl AiClient {
    /// Create a client from settings; `None` when no API key is configured.
    pub fn from_settings(settings: &Settings) -> Result<Option<Self>> {
        match settings.openai_api_key.as_deref() {
            Some(key) => Self::new(
                &settings.openai_base_url,
                key,
                &settings.openai_model,
                &settings.openai_image_model,
                settings.ai_timeout_seconds,
            )
            .map(Some),
            None => {
                tracing::warn!("OPENAI_API_KEY not set; chatbot and blog generator disabled");
                Ok(None)
            }
        }
    }

    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        image_model: &str,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        tracing::info!(base_url = base_url, model = model, "AI client initialized");

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            image_model: image_model.to_string(),
        })
    }

    /// Make a POST request to the API.
    async fn post<T: Serialize, R: DeserializeOwned>(&self, path: &str, body: &T) -> Result<R, ApiError> {
        let url = format!("{}{}", self.base_url, path);

        debug!(url = %url, "AI request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "AI request failed");
                ApiError::unavailable("AI service unavailable")
            })?;

        let status = response.status();

        if status.is_success() {
            response.json::<R>().await.map_err(|e| {
                error!(error = %e, "Failed to parse AI response");
                ApiError::Internal(anyhow::anyhow!("Invalid AI response: {}", e))
            })
        } else {
            let message = response
                .json::<AiErrorResponse>()
                .await
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("AI service error: {}", status));

            match status {
                StatusCode::BAD_REQUEST => Err(ApiError::BadRequest(message)),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    error!("AI service authentication failed");
                    Err(ApiError::unavailable("AI service is misconfigured"))
                }
                StatusCode::TOO_MANY_REQUESTS => Err(ApiError::unavailable("AI service is busy, try again later")),
                _ => {
                    error!(status = %status, message = %message, "AI service error");
                    Err(ApiError::Internal(anyhow::anyhow!(message)))
                }
            }
        }
    }

    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f64,
        json_mode: bool,
    ) -> Result<String, ApiError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            max_tokens,
            temperature,
            response_format: json_mode.then_some(ResponseFormat { r#type: "json_object" }),
        };

        let response: ChatCompletionResponse = self.post("/chat/completions", &request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ApiError::internal("AI returned an empty answer"))
    }

    /// Answer a storefront visitor.
    #[instrument(skip(self, system_prompt, message))]
    pub async fn chat(
        &self,
        system_prompt: &str,
        message: &str,
        max_tokens: u32,
        temperature: f64,
    ) -> Result<String, ApiError> {
        self.complete(system_prompt, message, max_tokens, temperature, false)
            .await
    }

    /// Write a blog article for the given prompt.
    #[instrument(skip(self, prompt))]
    pub async fn generate_article(&self, prompt: &str) -> Result<GeneratedArticle, ApiError> {
        let raw = self
            .complete(ARTICLE_SYSTEM_PROMPT, prompt, 4000, 0.7, true)
            .await?;
        parse_article(&raw).map_err(|e| {
            error!(error = %e, "AI article is not valid JSON");
            ApiError::Internal(e)
        })
    }

    /// Generate a cover image and return its URL.
    #[instrument(skip(self, prompt))]
    pub async fn generate_image(&self, prompt: &str) -> Result<String, ApiError> {
        #[derive(Serialize)]
        struct Request<'a> {
            model: &'a str,
            prompt: &'a str,
            n: u8,
            size: &'static str,
        }

        #[derive(Deserialize)]
        struct Response {
            data: Vec<ImageData>,
        }

        #[derive(Deserialize)]
        struct ImageData {
            #[serde(default)]
            url: Option<String>,
        }

        let response: Response = self
            .post(
                "/images/generations",
                &Request {
                    model: &self.image_model,
                    prompt,
                    n: 1,
                    size: "1792x1024",
                },
            )
            .await?;

        response
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| ApiError::internal("AI returned no image"))
    }
}

/// Parse an article, tolerating a Markdown code fence around the JSON.
fn parse_article(raw: &str) -> Result<GeneratedArticle> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed);

    let article: GeneratedArticle =
        serde_json::from_str(body.trim()).context("Failed to parse generated article")?;
    anyhow::ensure!(!article.title.trim().is_empty(), "Generated article has no title");
    Ok(article)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_json_parses_with_and_without_fence() {
        let json = r#"{"title":"Smart lamps","content":"<p>Hi</p>","tags":["led"]}"#;
        let a = parse_article(json).unwrap();
        assert_eq!(a.title, "Smart lamps");
        assert_eq!(a.tags, vec!["led"]);

        let fenced = format!("```json\n{}\n```", json);
        assert_eq!(parse_article(&fenced).unwrap().content, "<p>Hi</p>");
    }

    #[test]
    fn article_without_title_is_rejected() {
        assert!(parse_article(r#"{"title":" ","content":"x"}"#).is_err());
        assert!(parse_article("not json").is_err());
    }

    #[test]
    fn client_is_absent_without_key() {
        let settings = Settings::for_tests();
        assert!(AiClient::from_settings(&settings).unwrap().is_none());
    }
}
