//! Singleton settings rows (site and AI), created with defaults on first use.

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::domain::ai::{AiSettings, UpdateAiSettingsRequest};
use crate::domain::clean;
use crate::domain::site::{SiteSettings, UpdateSiteSettingsRequest};

pub async fn site_settings(db: &PgPool) -> sqlx::Result<SiteSettings> {
    sqlx::query("INSERT INTO site_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
        .execute(db)
        .await?;
    sqlx::query_as::<_, SiteSettings>("SELECT * FROM site_settings WHERE id = 1")
        .fetch_one(db)
        .await
}

pub async fn ai_settings(db: &PgPool) -> sqlx::Result<AiSettings> {
    sqlx::query("INSERT INTO ai_settings (id) VALUES (1) ON CONFLICT (id) DO NOTHING")
        .execute(db)
        .await?;
    sqlx::query_as::<_, AiSettings>("SELECT * FROM ai_settings WHERE id = 1")
        .fetch_one(db)
        .await
}

/// `SET col = $n` for each provided field. Text fields given as blank
/// strings are cleared.
macro_rules! set_fields {
    ($qb:expr, $req:expr; values: [$($v:ident),* $(,)?]; text: [$($t:ident),* $(,)?]) => {{
        $(
            if let Some(value) = $req.$v.clone() {
                $qb.push(concat!(", ", stringify!($v), " = ")).push_bind(value);
            }
        )*
        $(
            if let Some(value) = $req.$t.clone() {
                $qb.push(concat!(", ", stringify!($t), " = ")).push_bind(clean(Some(value)));
            }
        )*
    }};
}

pub async fn update_site_settings(
    db: &PgPool,
    req: &UpdateSiteSettingsRequest,
) -> sqlx::Result<SiteSettings> {
    site_settings(db).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE site_settings SET updated_at = NOW()");
    set_fields!(qb, req;
        values: [
            site_name, default_currency, products_per_page, min_order_amount,
            b2b_enabled, b2b_registration_open, b2b_auto_approve, b2b_min_order_amount,
        ];
        text: [
            site_tagline, logo_url, favicon_url, hero_subtitle, about_title, about_text,
            blog_title, blog_excerpt, social_telegram, social_whatsapp, social_instagram,
            social_facebook, social_youtube, social_tiktok, ai_instructions, contact_email,
            contact_phone, contact_address, working_hours, google_maps_url, meta_title,
            meta_description, meta_keywords, google_analytics_id, facebook_pixel_id,
            shipping_info, admin_company_name, admin_company_legal_name, admin_vat_number,
            admin_company_address, admin_company_city, admin_company_postal_code,
            admin_company_country_code, admin_handelsregister_id, admin_company_email,
            admin_company_phone, admin_company_website,
        ]
    );
    qb.push(" WHERE id = 1 RETURNING *");

    qb.build_query_as::<SiteSettings>().fetch_one(db).await
}

pub async fn update_ai_settings(
    db: &PgPool,
    req: &UpdateAiSettingsRequest,
) -> sqlx::Result<AiSettings> {
    ai_settings(db).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE ai_settings SET updated_at = NOW()");
    set_fields!(qb, req;
        values: [
            chatbot_enabled, chatbot_name, chatbot_system_prompt, chatbot_tone,
            chatbot_max_tokens, chatbot_temperature, blogger_enabled, blogger_name,
            blogger_style, blogger_language, blogger_min_words, blogger_max_words,
            auto_publish, publish_time, generate_images, image_style,
        ];
        text: [
            chatbot_custom_instructions, chatbot_forbidden_topics, blogger_default_keywords,
            blogger_seo_instructions, blogger_article_structure,
        ]
    );
    qb.push(" WHERE id = 1 RETURNING *");

    qb.build_query_as::<AiSettings>().fetch_one(db).await
}
