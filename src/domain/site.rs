//! Site settings and contact messages

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::accounts::validate_email;

/// Singleton storefront settings row
#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
pub struct SiteSettings {
    pub site_name: String,
    pub site_tagline: Option<String>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub hero_subtitle: Option<String>,
    pub about_title: Option<String>,
    pub about_text: Option<String>,
    pub blog_title: Option<String>,
    pub blog_excerpt: Option<String>,
    pub social_telegram: Option<String>,
    pub social_whatsapp: Option<String>,
    pub social_instagram: Option<String>,
    pub social_facebook: Option<String>,
    pub social_youtube: Option<String>,
    pub social_tiktok: Option<String>,
    pub ai_instructions: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_address: Option<String>,
    pub working_hours: Option<String>,
    pub google_maps_url: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub google_analytics_id: Option<String>,
    pub facebook_pixel_id: Option<String>,
    pub default_currency: String,
    pub products_per_page: i32,
    pub min_order_amount: Decimal,
    pub shipping_info: Option<String>,
    pub b2b_enabled: bool,
    pub b2b_registration_open: bool,
    pub b2b_auto_approve: bool,
    pub b2b_min_order_amount: Decimal,
    pub admin_company_name: Option<String>,
    pub admin_company_legal_name: Option<String>,
    pub admin_vat_number: Option<String>,
    pub admin_company_address: Option<String>,
    pub admin_company_city: Option<String>,
    pub admin_company_postal_code: Option<String>,
    pub admin_company_country_code: Option<String>,
    pub admin_handelsregister_id: Option<String>,
    pub admin_company_email: Option<String>,
    pub admin_company_phone: Option<String>,
    pub admin_company_website: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SiteSettings {
    /// Minimum cart total for checkout, depending on the customer kind.
    pub fn min_order_for(&self, is_b2b: bool) -> Decimal {
        if is_b2b {
            self.b2b_min_order_amount
        } else {
            self.min_order_amount
        }
    }

    pub fn b2b_signup_allowed(&self) -> bool {
        self.b2b_enabled && self.b2b_registration_open
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SocialLinks {
    pub telegram: Option<String>,
    pub whatsapp: Option<String>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub youtube: Option<String>,
    pub tiktok: Option<String>,
}

/// What the storefront may see; analytics ids are public by nature, the AI
/// instructions and admin company details are not.
#[derive(Debug, Clone, Serialize)]
pub struct PublicSiteSettings {
    pub site_name: String,
    pub site_tagline: Option<String>,
    pub logo_url: Option<String>,
    pub favicon_url: Option<String>,
    pub hero_subtitle: Option<String>,
    pub about_title: Option<String>,
    pub about_text: Option<String>,
    pub blog_title: Option<String>,
    pub blog_excerpt: Option<String>,
    pub social: SocialLinks,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_address: Option<String>,
    pub working_hours: Option<String>,
    pub google_maps_url: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub google_analytics_id: Option<String>,
    pub facebook_pixel_id: Option<String>,
    pub default_currency: String,
    pub products_per_page: i32,
    pub min_order_amount: Decimal,
    pub shipping_info: Option<String>,
    pub b2b_enabled: bool,
    pub b2b_registration_open: bool,
}

impl From<SiteSettings> for PublicSiteSettings {
    fn from(s: SiteSettings) -> Self {
        let b2b_registration_open = s.b2b_signup_allowed();
        Self {
            social: SocialLinks {
                telegram: s.social_telegram,
                whatsapp: s.social_whatsapp,
                instagram: s.social_instagram,
                facebook: s.social_facebook,
                youtube: s.social_youtube,
                tiktok: s.social_tiktok,
            },
            b2b_registration_open,
            site_name: s.site_name,
            site_tagline: s.site_tagline,
            logo_url: s.logo_url,
            favicon_url: s.favicon_url,
            hero_subtitle: s.hero_subtitle,
            about_title: s.about_title,
            about_text: s.about_text,
            blog_title: s.blog_title,
            blog_excerpt: s.blog_excerpt,
            contact_email: s.contact_email,
            contact_phone: s.contact_phone,
            contact_address: s.contact_address,
            working_hours: s.working_hours,
            google_maps_url: s.google_maps_url,
            meta_title: s.meta_title,
            meta_description: s.meta_description,
            meta_keywords: s.meta_keywords,
            google_analytics_id: s.google_analytics_id,
            facebook_pixel_id: s.facebook_pixel_id,
            default_currency: s.default_currency,
            products_per_page: s.products_per_page,
            min_order_amount: s.min_order_amount,
            shipping_info: s.shipping_info,
            b2b_enabled: s.b2b_enabled,
        }
    }
}

/// Partial update; absent fields keep their value, empty strings clear.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateSiteSettingsRequest {
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub site_tagline: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub hero_subtitle: Option<String>,
    #[serde(default)]
    pub about_title: Option<String>,
    #[serde(default)]
    pub about_text: Option<String>,
    #[serde(default)]
    pub blog_title: Option<String>,
    #[serde(default)]
    pub blog_excerpt: Option<String>,
    #[serde(default)]
    pub social_telegram: Option<String>,
    #[serde(default)]
    pub social_whatsapp: Option<String>,
    #[serde(default)]
    pub social_instagram: Option<String>,
    #[serde(default)]
    pub social_facebook: Option<String>,
    #[serde(default)]
    pub social_youtube: Option<String>,
    #[serde(default)]
    pub social_tiktok: Option<String>,
    #[serde(default)]
    pub ai_instructions: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_address: Option<String>,
    #[serde(default)]
    pub working_hours: Option<String>,
    #[serde(default)]
    pub google_maps_url: Option<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub meta_keywords: Option<String>,
    #[serde(default)]
    pub google_analytics_id: Option<String>,
    #[serde(default)]
    pub facebook_pixel_id: Option<String>,
    #[serde(default)]
    pub default_currency: Option<String>,
    #[serde(default)]
    pub products_per_page: Option<i32>,
    #[serde(default)]
    pub min_order_amount: Option<Decimal>,
    #[serde(default)]
    pub shipping_info: Option<String>,
    #[serde(default)]
    pub b2b_enabled: Option<bool>,
    #[serde(default)]
    pub b2b_registration_open: Option<bool>,
    #[serde(default)]
    pub b2b_auto_approve: Option<bool>,
    #[serde(default)]
    pub b2b_min_order_amount: Option<Decimal>,
    #[serde(default)]
    pub admin_company_name: Option<String>,
    #[serde(default)]
    pub admin_company_legal_name: Option<String>,
    #[serde(default)]
    pub admin_vat_number: Option<String>,
    #[serde(default)]
    pub admin_company_address: Option<String>,
    #[serde(default)]
    pub admin_company_city: Option<String>,
    #[serde(default)]
    pub admin_company_postal_code: Option<String>,
    #[serde(default)]
    pub admin_company_country_code: Option<String>,
    #[serde(default)]
    pub admin_handelsregister_id: Option<String>,
    #[serde(default)]
    pub admin_company_email: Option<String>,
    #[serde(default)]
    pub admin_company_phone: Option<String>,
    #[serde(default)]
    pub admin_company_website: Option<String>,
}

impl UpdateSiteSettingsRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = self.site_name.as_deref() {
            if name.trim().is_empty() {
                return Err("site_name must not be empty".into());
            }
        }
        if let Some(per_page) = self.products_per_page {
            if !(1..=100).contains(&per_page) {
                return Err("products_per_page must be between 1 and 100".into());
            }
        }
        for amount in [self.min_order_amount, self.b2b_min_order_amount].into_iter().flatten() {
            if amount < Decimal::ZERO {
                return Err("minimum order amounts must not be negative".into());
            }
        }
        if let Some(currency) = self.default_currency.as_deref() {
            if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err("default_currency must be a 3-letter code".into());
            }
        }
        if let Some(code) = self.admin_company_country_code.as_deref() {
            if !code.is_empty() && code.len() != 2 {
                return Err("admin_company_country_code must have 2 letters".into());
            }
        }
        Ok(())
    }
}

/// Message from the contact form
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub replied_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl CreateContactRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() || self.email.trim().is_empty() || self.message.trim().is_empty() {
            return Err("Name, email and message are required".into());
        }
        validate_email(self.email.trim())?;
        if self.message.len() > 5000 {
            return Err("Message is too long".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactListFilter {
    #[serde(default)]
    pub unread: Option<bool>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ContactStats {
    pub total: i64,
    pub unread: i64,
    pub today: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn contact(name: &str, email: &str, message: &str) -> CreateContactRequest {
        CreateContactRequest {
            name: name.into(),
            email: email.into(),
            phone: None,
            subject: None,
            message: message.into(),
        }
    }

    #[test]
    fn contact_requires_name_email_and_message() {
        assert!(contact("Olena", "olena@example.com", "Hi").validate().is_ok());
        assert!(contact("", "olena@example.com", "Hi").validate().is_err());
        assert!(contact("Olena", "olena@example.com", "  ").validate().is_err());
        assert!(contact("Olena", "not-an-email", "Hi").validate().is_err());
    }

    #[test]
    fn public_view_reports_whether_partners_can_sign_up() {
        let site = SiteSettings {
            site_name: "SmartShop".into(),
            ai_instructions: Some("internal".into()),
            b2b_enabled: false,
            b2b_registration_open: true,
            ..Default::default()
        };
        let public = PublicSiteSettings::from(site.clone());
        assert_eq!(public.site_name, "SmartShop");
        assert!(!public.b2b_registration_open);
        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("ai_instructions").is_none());

        let open = PublicSiteSettings::from(SiteSettings {
            b2b_enabled: true,
            ..site
        });
        assert!(open.b2b_enabled && open.b2b_registration_open);
    }

    #[test]
    fn settings_update_bounds() {
        let ok = UpdateSiteSettingsRequest {
            products_per_page: Some(24),
            default_currency: Some("UAH".into()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let negative = UpdateSiteSettingsRequest {
            b2b_min_order_amount: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(negative.validate().is_err());

        let blank_name = UpdateSiteSettingsRequest {
            site_name: Some(" ".into()),
            ..Default::default()
        };
        assert!(blank_name.validate().is_err());
    }
}
