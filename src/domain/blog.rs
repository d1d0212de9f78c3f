//! Blog domain types
//!
//! Posts (manual or AI-written) and the weekly content plan that feeds the
//! generator.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{parse_text, text_of};

/// Topics accepted per weekly plan.
pub const MAX_PLAN_TOPICS: usize = 7;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Published,
    Archived,
}

impl Default for PostStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

/// Blog post entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BlogPost {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub title_en: Option<String>,
    pub excerpt_en: Option<String>,
    pub content_en: Option<String>,
    pub title_de: Option<String>,
    pub excerpt_de: Option<String>,
    pub content_de: Option<String>,
    pub featured_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub tags: Option<String>,
    pub category: Option<String>,
    pub status: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub is_ai_generated: bool,
    pub ai_topic: Option<String>,
    pub blog_plan_id: Option<Uuid>,
    pub views: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn status(&self) -> PostStatus {
        parse_text(&self.status).unwrap_or_default()
    }

    pub fn tag_list(&self) -> Vec<String> {
        split_tags(self.tags.as_deref().unwrap_or_default())
    }

    /// Title/excerpt/content in `lang` (`uk`, `en`, `de`), falling back to
    /// the primary language for missing translations.
    pub fn localized(&self, lang: &str) -> LocalizedPost {
        let (title, excerpt, content) = match lang {
            "en" => (&self.title_en, &self.excerpt_en, &self.content_en),
            "de" => (&self.title_de, &self.excerpt_de, &self.content_de),
            _ => (&None, &None, &None),
        };
        LocalizedPost {
            title: title.clone().unwrap_or_else(|| self.title.clone()),
            excerpt: excerpt.clone().or_else(|| self.excerpt.clone()),
            content: content.clone().unwrap_or_else(|| self.content.clone()),
        }
    }
}

pub fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct LocalizedPost {
    pub title: String,
    pub excerpt: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicPostResponse {
    pub id: Uuid,
    pub slug: String,
    #[serde(flatten)]
    pub text: LocalizedPost,
    pub featured_image: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub views: i32,
}

impl PublicPostResponse {
    pub fn new(post: BlogPost, lang: &str) -> Self {
        Self {
            text: post.localized(lang),
            tags: post.tag_list(),
            id: post.id,
            slug: post.slug,
            featured_image: post.featured_image,
            meta_title: post.meta_title,
            meta_description: post.meta_description,
            meta_keywords: post.meta_keywords,
            category: post.category,
            publish_date: post.publish_date,
            views: post.views,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlogQuery {
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub title_en: Option<String>,
    #[serde(default)]
    pub excerpt_en: Option<String>,
    #[serde(default)]
    pub content_en: Option<String>,
    #[serde(default)]
    pub title_de: Option<String>,
    #[serde(default)]
    pub excerpt_de: Option<String>,
    #[serde(default)]
    pub content_de: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub meta_keywords: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub publish_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub title_en: Option<String>,
    #[serde(default)]
    pub excerpt_en: Option<String>,
    #[serde(default)]
    pub content_en: Option<String>,
    #[serde(default)]
    pub title_de: Option<String>,
    #[serde(default)]
    pub excerpt_de: Option<String>,
    #[serde(default)]
    pub content_de: Option<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub meta_keywords: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub publish_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminPostFilter {
    #[serde(default)]
    pub status: Option<PostStatus>,
}

/// Article fields the language model is asked to return as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratePostRequest {
    pub topic: String,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub additional_instructions: Option<String>,
    /// Overrides the auto-publish AI setting for this article.
    #[serde(default)]
    pub publish: Option<bool>,
    #[serde(default)]
    pub generate_image: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Generated,
    Published,
}

impl Default for PlanStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

/// Planned article for a given day
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BlogPlan {
    pub id: Uuid,
    pub plan_date: NaiveDate,
    pub topic: String,
    pub keywords: Option<String>,
    pub status: String,
    pub blog_post_id: Option<Uuid>,
    pub additional_instructions: Option<String>,
    pub target_audience: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlogPlan {
    pub fn status(&self) -> PlanStatus {
        parse_text(&self.status).unwrap_or_default()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status() == PlanStatus::Pending && self.plan_date < today
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BlogPlanResponse {
    #[serde(flatten)]
    pub plan: BlogPlan,
    pub is_overdue: bool,
}

impl BlogPlanResponse {
    pub fn new(plan: BlogPlan, today: NaiveDate) -> Self {
        Self {
            is_overdue: plan.is_overdue(today),
            plan,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlanTopic {
    pub topic: String,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub additional_instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWeeklyPlanRequest {
    pub topics: Vec<PlanTopic>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
}

/// One plan date per topic, starting at `start`; extra topics beyond a week
/// are dropped and blank topics skipped.
pub fn weekly_plan_dates(topics: &[PlanTopic], start: NaiveDate) -> Vec<(NaiveDate, &PlanTopic)> {
    topics
        .iter()
        .filter(|t| !t.topic.trim().is_empty())
        .take(MAX_PLAN_TOPICS)
        .enumerate()
        .map(|(i, t)| (start + Duration::days(i as i64), t))
        .collect()
}

/// Monday..=Sunday of the week containing `day`.
pub fn week_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = day - Duration::days(day.weekday().num_days_from_monday() as i64);
    (monday, monday + Duration::days(6))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(status: &str, publish_date: Option<DateTime<Utc>>) -> BlogPost {
        BlogPost {
            id: Uuid::new_v4(),
            title: "Привіт".into(),
            slug: "pryvit".into(),
            excerpt: Some("Коротко".into()),
            content: "Текст".into(),
            title_en: Some("Hello".into()),
            excerpt_en: None,
            content_en: Some("Text".into()),
            title_de: None,
            excerpt_de: None,
            content_de: None,
            featured_image: None,
            meta_title: None,
            meta_description: None,
            meta_keywords: None,
            tags: Some("ai, shop,, gadgets ".into()),
            category: None,
            status: status.into(),
            publish_date,
            is_ai_generated: false,
            ai_topic: None,
            blog_plan_id: None,
            views: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn localized_falls_back_to_primary_language() {
        let p = post("published", None);
        let en = p.localized("en");
        assert_eq!(en.title, "Hello");
        assert_eq!(en.excerpt.as_deref(), Some("Коротко"));
        let de = p.localized("de");
        assert_eq!(de.title, "Привіт");
        assert_eq!(de.content, "Текст");
    }

    #[test]
    fn tags_are_split_and_trimmed() {
        assert_eq!(post("draft", None).tag_list(), vec!["ai", "shop", "gadgets"]);
    }

    #[test]
    fn week_runs_monday_to_sunday() {
        let wednesday = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let (start, end) = week_bounds(wednesday);
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 3, 10).unwrap());
        assert_eq!(end, NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());
    }

    #[test]
    fn weekly_plan_takes_at_most_seven_topics() {
        let topics: Vec<PlanTopic> = (0..9)
            .map(|i| PlanTopic {
                topic: if i == 1 { " ".into() } else { format!("Topic {}", i) },
                keywords: None,
                target_audience: None,
                additional_instructions: None,
            })
            .collect();
        let start = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let plan = weekly_plan_dates(&topics, start);
        assert_eq!(plan.len(), 7);
        assert_eq!(plan[0].1.topic, "Topic 0");
        assert_eq!(plan[1].1.topic, "Topic 2");
        assert_eq!(plan[6].0, NaiveDate::from_ymd_opt(2025, 3, 16).unwrap());
    }

    #[test]
    fn overdue_only_when_pending_and_past() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let mut plan = BlogPlan {
            id: Uuid::new_v4(),
            plan_date: today - Duration::days(1),
            topic: "x".into(),
            keywords: None,
            status: "pending".into(),
            blog_post_id: None,
            additional_instructions: None,
            target_audience: None,
            created_at: Utc::now(),
        };
        assert!(plan.is_overdue(today));
        plan.status = "generated".into();
        assert!(!plan.is_overdue(today));
    }
}
