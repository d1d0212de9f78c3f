//! AI assistant settings and prompt assembly
//!
//! One `ai_settings` row configures both the storefront chatbot and the blog
//! writer. Prompts are plain text built here so they can be tested without a
//! model behind them.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use super::catalog::{Category, Product};

const CHAT_RULES: &str = "Important:
- Answer only questions about products from the catalog
- Do not invent products that are not listed
- Suggest relevant products
- Be polite and helpful";

const DEFAULT_ARTICLE_STRUCTURE: &str = "Article structure:
1. Catchy title containing the main keyword
2. Introduction (2-3 sentences on what the article covers)
3. Main part with H2 subheadings
4. Practical tips or examples
5. Conclusion with a call to action";

/// Singleton AI settings row
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AiSettings {
    pub chatbot_enabled: bool,
    pub chatbot_name: String,
    pub chatbot_system_prompt: String,
    pub chatbot_custom_instructions: Option<String>,
    pub chatbot_tone: String,
    pub chatbot_max_tokens: i32,
    pub chatbot_temperature: f64,
    pub chatbot_forbidden_topics: Option<String>,
    pub blogger_enabled: bool,
    pub blogger_name: String,
    pub blogger_style: String,
    pub blogger_language: String,
    pub blogger_default_keywords: Option<String>,
    pub blogger_seo_instructions: Option<String>,
    pub blogger_article_structure: Option<String>,
    pub blogger_min_words: i32,
    pub blogger_max_words: i32,
    pub auto_publish: bool,
    pub publish_time: String,
    pub generate_images: bool,
    pub image_style: String,
    pub updated_at: DateTime<Utc>,
}

impl AiSettings {
    /// System prompt for the storefront chatbot.
    ///
    /// `shop_instructions` are the free-text instructions from site settings;
    /// they are appended after the chatbot's own custom instructions.
    pub fn chatbot_prompt(&self, shop_instructions: Option<&str>, catalog: &str) -> String {
        let mut parts = vec![self.chatbot_system_prompt.trim().to_string()];

        let extra: Vec<&str> = [self.chatbot_custom_instructions.as_deref(), shop_instructions]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if !extra.is_empty() {
            parts.push(format!("Additional admin instructions:\n{}", extra.join("\n")));
        }

        if !catalog.is_empty() {
            parts.push(catalog.to_string());
        }

        if let Some(topics) = non_empty(&self.chatbot_forbidden_topics) {
            parts.push(format!("Topics you must not discuss:\n{}", topics));
        }

        parts.push(format!("Tone: {}", self.chatbot_tone));
        parts.push(CHAT_RULES.to_string());
        parts.join("\n\n")
    }

    /// User prompt asking the blog writer for an article on `topic`.
    pub fn blogger_prompt(&self, topic: &str, keywords: Option<&str>) -> String {
        let mut parts = vec![format!("Write a blog article on the topic: {}", topic)];

        match (keywords.map(str::trim).filter(|k| !k.is_empty()), non_empty(&self.blogger_default_keywords)) {
            (Some(k), _) => parts.push(format!("SEO keywords to use: {}", k)),
            (None, Some(k)) => parts.push(format!("General keywords: {}", k)),
            (None, None) => {}
        }

        if let Some(seo) = non_empty(&self.blogger_seo_instructions) {
            parts.push(format!("\nSEO instructions:\n{}", seo));
        }

        parts.push(format!("\nLanguage: {}", self.blogger_language));
        parts.push(format!("Style: {}", self.blogger_style));
        parts.push(format!(
            "Length: {}-{} words",
            self.blogger_min_words, self.blogger_max_words
        ));

        match non_empty(&self.blogger_article_structure) {
            Some(structure) => parts.push(format!("\nArticle structure:\n{}", structure)),
            None => parts.push(format!("\n{}", DEFAULT_ARTICLE_STRUCTURE)),
        }

        parts.join("\n")
    }

    pub fn image_prompt(&self, title: &str) -> String {
        format!("Blog cover illustration for \"{}\", {}", title, self.image_style)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Plain-text catalog grouped by category, with uncategorized products last.
pub fn catalog_context(categories: &[Category], products: &[Product]) -> String {
    let mut out = String::from("Product catalog:\n");

    for category in categories {
        let _ = writeln!(out, "\nCategory: {}", category.name);
        for p in products.iter().filter(|p| p.category_id == Some(category.id)) {
            let _ = write!(out, "  - {}: {} {}", p.name, p.price, p.currency);
            if let Some(short) = p.short_description.as_deref().filter(|s| !s.is_empty()) {
                let _ = write!(out, " ({})", short);
            }
            out.push('\n');
        }
    }

    let known: Vec<_> = categories.iter().map(|c| c.id).collect();
    let others: Vec<&Product> = products
        .iter()
        .filter(|p| p.category_id.map_or(true, |id| !known.contains(&id)))
        .collect();
    if !others.is_empty() {
        out.push_str("\nOther products:\n");
        for p in others {
            let _ = writeln!(out, "  - {}: {} {}", p.name, p.price, p.currency);
        }
    }

    out
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub message: String,
    pub assistant: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAiSettingsRequest {
    #[serde(default)]
    pub chatbot_enabled: Option<bool>,
    #[serde(default)]
    pub chatbot_name: Option<String>,
    #[serde(default)]
    pub chatbot_system_prompt: Option<String>,
    #[serde(default)]
    pub chatbot_custom_instructions: Option<String>,
    #[serde(default)]
    pub chatbot_tone: Option<String>,
    #[serde(default)]
    pub chatbot_max_tokens: Option<i32>,
    #[serde(default)]
    pub chatbot_temperature: Option<f64>,
    #[serde(default)]
    pub chatbot_forbidden_topics: Option<String>,
    #[serde(default)]
    pub blogger_enabled: Option<bool>,
    #[serde(default)]
    pub blogger_name: Option<String>,
    #[serde(default)]
    pub blogger_style: Option<String>,
    #[serde(default)]
    pub blogger_language: Option<String>,
    #[serde(default)]
    pub blogger_default_keywords: Option<String>,
    #[serde(default)]
    pub blogger_seo_instructions: Option<String>,
    #[serde(default)]
    pub blogger_article_structure: Option<String>,
    #[serde(default)]
    pub blogger_min_words: Option<i32>,
    #[serde(default)]
    pub blogger_max_words: Option<i32>,
    #[serde(default)]
    pub auto_publish: Option<bool>,
    #[serde(default)]
    pub publish_time: Option<String>,
    #[serde(default)]
    pub generate_images: Option<bool>,
    #[serde(default)]
    pub image_style: Option<String>,
}

impl UpdateAiSettingsRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(tokens) = self.chatbot_max_tokens {
            if !(1..=4000).contains(&tokens) {
                return Err("chatbot_max_tokens must be between 1 and 4000".into());
            }
        }
        if let Some(t) = self.chatbot_temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err("chatbot_temperature must be between 0 and 2".into());
            }
        }
        if let (Some(min), Some(max)) = (self.blogger_min_words, self.blogger_max_words) {
            if min > max {
                return Err("blogger_min_words must not exceed blogger_max_words".into());
            }
        }
        if let Some(lang) = self.blogger_language.as_deref() {
            if !matches!(lang, "uk" | "en" | "de") {
                return Err("blogger_language must be one of uk, en, de".into());
            }
        }
        if let Some(time) = self.publish_time.as_deref() {
            NaiveTime::parse_from_str(time, "%H:%M")
                .map_err(|_| "publish_time must be HH:MM".to_string())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::tests::product;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn settings() -> AiSettings {
        AiSettings {
            chatbot_enabled: true,
            chatbot_name: "Assistant".into(),
            chatbot_system_prompt: "You are a shop consultant.".into(),
            chatbot_custom_instructions: Some("Mention free shipping.".into()),
            chatbot_tone: "friendly".into(),
            chatbot_max_tokens: 500,
            chatbot_temperature: 0.7,
            chatbot_forbidden_topics: Some("politics".into()),
            blogger_enabled: true,
            blogger_name: "AI Blogger".into(),
            blogger_style: "informative".into(),
            blogger_language: "uk".into(),
            blogger_default_keywords: Some("smart home".into()),
            blogger_seo_instructions: None,
            blogger_article_structure: None,
            blogger_min_words: 500,
            blogger_max_words: 1500,
            auto_publish: false,
            publish_time: "10:00".into(),
            generate_images: false,
            image_style: "photorealistic".into(),
            updated_at: Utc::now(),
        }
    }

    fn category(name: &str) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: name.to_lowercase(),
            description: None,
            image_url: None,
            is_active: true,
            sort_order: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn catalog_groups_by_category() {
        let lamps = category("Lamps");
        let mut lamp = product(dec!(19.99));
        lamp.name = "Desk lamp".into();
        lamp.category_id = Some(lamps.id);
        lamp.short_description = Some("LED".into());
        let mut loose = product(dec!(5));
        loose.name = "Sticker".into();
        loose.category_id = None;

        let text = catalog_context(&[lamps], &[lamp, loose]);
        assert!(text.contains("Category: Lamps\n  - Desk lamp: 19.99 EUR (LED)\n"));
        assert!(text.contains("Other products:\n  - Sticker: 5 EUR\n"));
    }

    #[test]
    fn chatbot_prompt_includes_every_section() {
        let prompt = settings().chatbot_prompt(Some("Speak Ukrainian."), "Product catalog:\n");
        assert!(prompt.starts_with("You are a shop consultant."));
        assert!(prompt.contains("Mention free shipping.\nSpeak Ukrainian."));
        assert!(prompt.contains("Topics you must not discuss:\npolitics"));
        assert!(prompt.contains("Tone: friendly"));
        assert!(prompt.contains("Do not invent products"));
    }

    #[test]
    fn blogger_prompt_prefers_explicit_keywords() {
        let s = settings();
        let with = s.blogger_prompt("Smart bulbs", Some("led, wifi"));
        assert!(with.contains("SEO keywords to use: led, wifi"));
        assert!(!with.contains("General keywords"));

        let without = s.blogger_prompt("Smart bulbs", None);
        assert!(without.contains("General keywords: smart home"));
        assert!(without.contains("Length: 500-1500 words"));
        assert!(without.contains("5. Conclusion with a call to action"));
    }

    #[test]
    fn update_validation() {
        let ok = UpdateAiSettingsRequest {
            publish_time: Some("09:30".into()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_time = UpdateAiSettingsRequest {
            publish_time: Some("25:00".into()),
            ..Default::default()
        };
        assert!(bad_time.validate().is_err());

        let bad_words = UpdateAiSettingsRequest {
            blogger_min_words: Some(900),
            blogger_max_words: Some(300),
            ..Default::default()
        };
        assert!(bad_words.validate().is_err());
    }
}
