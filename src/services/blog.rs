//! AI blog writer and slug allocation.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::ai::AiSettings;
use crate::domain::blog::{
    week_bounds, weekly_plan_dates, BlogPlan, BlogPost, CreateWeeklyPlanRequest,
    GeneratePostRequest, PlanStatus, PostStatus,
};
use crate::domain::slug::{slugify, with_suffix};
use crate::error::ApiResult;
use crate::services::ai_client::AiClient;

const MAX_SLUG_ATTEMPTS: u32 = 100;

/// Slug from `source` that no other post uses.
pub async fn unique_slug(db: &PgPool, source: &str, exclude: Option<Uuid>) -> sqlx::Result<String> {
    let base = slugify(source);
    for attempt in 1..=MAX_SLUG_ATTEMPTS {
        let candidate = with_suffix(&base, attempt);
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM blog_posts WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(&candidate)
        .bind(exclude)
        .fetch_one(db)
        .await?;
        if !taken {
            return Ok(candidate);
        }
    }
    Ok(format!("{}-{}", base, Uuid::new_v4().simple()))
}

/// What to write about.
#[derive(Debug, Clone, Default)]
pub struct ArticleBrief {
    pub topic: String,
    pub keywords: Option<String>,
    pub additional_instructions: Option<String>,
    pub publish: Option<bool>,
    pub generate_image: Option<bool>,
    pub plan_id: Option<Uuid>,
}

impl From<&BlogPlan> for ArticleBrief {
    fn from(plan: &BlogPlan) -> Self {
        let non_blank = |text: &Option<String>| {
            text.as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        };
        let instructions = [
            non_blank(&plan.additional_instructions),
            non_blank(&plan.target_audience).map(|a| format!("Target audience: {}", a)),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join("\n");

        Self {
            topic: plan.topic.clone(),
            keywords: plan.keywords.clone(),
            additional_instructions: (!instructions.is_empty()).then_some(instructions),
            plan_id: Some(plan.id),
            ..Default::default()
        }
    }
}

impl From<&GeneratePostRequest> for ArticleBrief {
    fn from(req: &GeneratePostRequest) -> Self {
        Self {
            topic: req.topic.trim().to_string(),
            keywords: req.keywords.clone(),
            additional_instructions: req.additional_instructions.clone(),
            publish: req.publish,
            generate_image: req.generate_image,
            plan_id: None,
        }
    }
}

pub fn article_prompt(settings: &AiSettings, brief: &ArticleBrief) -> String {
    let mut prompt = settings.blogger_prompt(&brief.topic, brief.keywords.as_deref());
    if let Some(extra) = brief
        .additional_instructions
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        prompt.push_str("\n\nAdditional instructions:\n");
        prompt.push_str(extra);
    }
    prompt
}

/// Write an article with the model and store it as a post.
#[instrument(skip(db, ai, settings, brief), fields(topic = %brief.topic))]
pub async fn write_post(
    db: &PgPool,
    ai: &AiClient,
    settings: &AiSettings,
    brief: &ArticleBrief,
) -> ApiResult<BlogPost> {
    let article = ai.generate_article(&article_prompt(settings, brief)).await?;

    let featured_image = if brief.generate_image.unwrap_or(settings.generate_images) {
        match ai.generate_image(&settings.image_prompt(&article.title)).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "Cover image generation failed");
                None
            }
        }
    } else {
        None
    };

    let publish = brief.publish.unwrap_or(settings.auto_publish);
    let status = if publish {
        PostStatus::Published
    } else {
        PostStatus::Draft
    };
    let slug = unique_slug(db, &article.title, None).await?;
    let tags = (!article.tags.is_empty()).then(|| article.tags.join(", "));

    let mut tx = db.begin().await?;
    let post = sqlx::query_as::<_, BlogPost>(
        r#"
        INSERT INTO blog_posts
            (id, title, slug, excerpt, content, featured_image, meta_title, meta_description,
             meta_keywords, tags, status, publish_date, is_ai_generated, ai_topic, blog_plan_id,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, TRUE, $13, $14, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&article.title)
    .bind(&slug)
    .bind(&article.excerpt)
    .bind(&article.content)
    .bind(&featured_image)
    .bind(&article.meta_title)
    .bind(&article.meta_description)
    .bind(&brief.keywords)
    .bind(&tags)
    .bind(status.to_string())
    .bind(publish.then(Utc::now))
    .bind(&brief.topic)
    .bind(brief.plan_id)
    .fetch_one(&mut *tx)
    .await?;

    if let Some(plan_id) = brief.plan_id {
        let plan_status = if publish {
            PlanStatus::Published
        } else {
            PlanStatus::Generated
        };
        sqlx::query("UPDATE blog_plans SET status = $2, blog_post_id = $3 WHERE id = $1")
            .bind(plan_id)
            .bind(plan_status.to_string())
            .bind(post.id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;

    info!(post_id = %post.id, slug = %post.slug, status = %post.status, "Blog post generated");
    Ok(post)
}

/// Store one plan per topic on consecutive days from `start`.
pub async fn create_weekly_plan(
    db: &PgPool,
    req: &CreateWeeklyPlanRequest,
    start: NaiveDate,
) -> sqlx::Result<Vec<BlogPlan>> {
    let mut tx = db.begin().await?;
    let mut plans = Vec::new();
    for (date, topic) in weekly_plan_dates(&req.topics, start) {
        let plan = sqlx::query_as::<_, BlogPlan>(
            r#"
            INSERT INTO blog_plans
                (id, plan_date, topic, keywords, status, additional_instructions, target_audience, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(date)
        .bind(topic.topic.trim())
        .bind(&topic.keywords)
        .bind(PlanStatus::Pending.to_string())
        .bind(&topic.additional_instructions)
        .bind(&topic.target_audience)
        .fetch_one(&mut *tx)
        .await?;
        plans.push(plan);
    }
    tx.commit().await?;
    info!(plans = plans.len(), start = %start, "Weekly blog plan created");
    Ok(plans)
}

/// Plans of the week containing `day`.
pub async fn week_plans(db: &PgPool, day: NaiveDate) -> sqlx::Result<Vec<BlogPlan>> {
    let (monday, sunday) = week_bounds(day);
    sqlx::query_as::<_, BlogPlan>(
        "SELECT * FROM blog_plans WHERE plan_date BETWEEN $1 AND $2 ORDER BY plan_date, created_at",
    )
    .bind(monday)
    .bind(sunday)
    .fetch_all(db)
    .await
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanRunResult {
    pub plan_id: Uuid,
    pub topic: String,
    pub post_id: Option<Uuid>,
    pub error: Option<String>,
}

/// Generate posts for every pending plan dated `today` or earlier.
pub async fn generate_due(
    db: &PgPool,
    ai: &AiClient,
    settings: &AiSettings,
    today: NaiveDate,
) -> ApiResult<Vec<PlanRunResult>> {
    let plans = sqlx::query_as::<_, BlogPlan>(
        "SELECT * FROM blog_plans WHERE status = $1 AND plan_date <= $2 ORDER BY plan_date",
    )
    .bind(PlanStatus::Pending.to_string())
    .bind(today)
    .fetch_all(db)
    .await?;

    let mut results = Vec::with_capacity(plans.len());
    for plan in &plans {
        let outcome = write_post(db, ai, settings, &ArticleBrief::from(plan)).await;
        results.push(match outcome {
            Ok(post) => PlanRunResult {
                plan_id: plan.id,
                topic: plan.topic.clone(),
                post_id: Some(post.id),
                error: None,
            },
            Err(e) => {
                warn!(plan_id = %plan.id, error = %e, "Planned post failed");
                PlanRunResult {
                    plan_id: plan.id,
                    topic: plan.topic.clone(),
                    post_id: None,
                    error: Some(e.to_string()),
                }
            }
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> BlogPlan {
        BlogPlan {
            id: Uuid::new_v4(),
            plan_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            topic: "Smart lamps".into(),
            keywords: Some("led, wifi".into()),
            status: "pending".into(),
            blog_post_id: None,
            additional_instructions: Some("Mention energy savings".into()),
            target_audience: Some("students".into()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn brief_from_plan_merges_audience() {
        let brief = ArticleBrief::from(&plan());
        assert_eq!(brief.topic, "Smart lamps");
        assert_eq!(
            brief.additional_instructions.as_deref(),
            Some("Mention energy savings\nTarget audience: students")
        );
        assert!(brief.plan_id.is_some());
        assert_eq!(brief.publish, None);
    }

    #[test]
    fn brief_from_request_keeps_overrides() {
        let req = GeneratePostRequest {
            topic: "  Robot vacuums ".into(),
            keywords: None,
            additional_instructions: None,
            publish: Some(false),
            generate_image: Some(true),
        };
        let brief = ArticleBrief::from(&req);
        assert_eq!(brief.topic, "Robot vacuums");
        assert_eq!(brief.publish, Some(false));
        assert_eq!(brief.generate_image, Some(true));
        assert_eq!(brief.plan_id, None);
    }

    #[test]
    fn brief_without_extras() {
        let mut p = plan();
        p.additional_instructions = None;
        p.target_audience = Some("  ".into());
        assert_eq!(ArticleBrief::from(&p).additional_instructions, None);

        p.additional_instructions = Some(" Keep it short ".into());
        assert_eq!(
            ArticleBrief::from(&p).additional_instructions.as_deref(),
            Some("Keep it short")
        );
    }
}
