//! Account domain types
//!
//! Users (B2C customers, B2B partners, staff) and partner companies.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use std::fmt;
use uuid::Uuid;

use super::{parse_text, text_of};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_B2B_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Customer,
    Partner,
    Manager,
    Admin,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Customer
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

impl UserRole {
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Admin | Self::Manager)
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub is_verified: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company_id: Option<Uuid>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> UserRole {
        parse_text(&self.role).unwrap_or_default()
    }

    /// Partner role with a linked company.
    pub fn is_b2b(&self) -> bool {
        self.role() == UserRole::Partner && self.company_id.is_some()
    }

    /// "First Last", either part alone, or the e-mail local part.
    pub fn full_name(&self) -> String {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if parts.is_empty() {
            self.email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string()
        } else {
            parts.join(" ")
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    #[serde(flatten)]
    pub user: User,
    pub full_name: String,
    pub is_b2b: bool,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            is_b2b: user.is_b2b(),
            user,
        }
    }
}

/// Lowercase and trim so lookups are case-insensitive.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err("A valid email address is required".to_string()),
    }
}

pub fn validate_new_password(
    password: &str,
    confirmation: Option<&str>,
    min_len: usize,
) -> Result<(), String> {
    if password.chars().count() < min_len {
        return Err(format!(
            "Password must be at least {} characters long",
            min_len
        ));
    }
    if let Some(confirm) = confirmation {
        if confirm != password {
            return Err("Passwords do not match".to_string());
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterB2bRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub company_name: String,
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub vat_number: Option<String>,
    #[serde(default)]
    pub vat_country: Option<String>,
    #[serde(default)]
    pub handelsregister_id: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

impl RegisterB2bRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_email(&self.email)?;
        validate_new_password(
            &self.password,
            self.password_confirm.as_deref(),
            MIN_B2B_PASSWORD_LEN,
        )?;
        if self.company_name.trim().is_empty() {
            return Err("Company name is required".to_string());
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("Contact first and last name are required".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    Pending,
    Verified,
    Rejected,
    Suspended,
}

impl Default for CompanyStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for CompanyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

/// Partner company entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub legal_name: Option<String>,
    pub vat_number: Option<String>,
    pub vat_country: Option<String>,
    pub vat_verified: bool,
    pub vat_verified_at: Option<DateTime<Utc>>,
    pub vat_data: Option<Json<Value>>,
    pub handelsregister_id: Option<String>,
    pub hr_data: Option<Json<Value>>,
    pub website: Option<String>,
    pub domain: Option<String>,
    pub whois_data: Option<Json<Value>>,
    pub whois_checked_at: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub contact_person: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub credit_limit: Decimal,
    pub payment_terms: i32,
    pub discount_percent: Decimal,
    pub status: String,
    pub rejection_reason: Option<String>,
    pub reliability_score: i32,
    pub reliability_level: String,
    pub last_verification_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub last_verification_data: Option<Json<Value>>,
    pub is_whois_verified: bool,
    pub is_hr_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Company {
    pub fn status(&self) -> CompanyStatus {
        parse_text(&self.status).unwrap_or_default()
    }

    pub fn is_verified(&self) -> bool {
        self.status() == CompanyStatus::Verified
    }

    /// VAT number with its country prefix, as VIES expects it.
    pub fn full_vat_number(&self) -> Option<String> {
        let number = self.vat_number.as_deref()?.trim();
        if number.is_empty() {
            return None;
        }
        match self.vat_country.as_deref().map(str::trim) {
            Some(country) if !country.is_empty() => {
                let country = country.to_uppercase();
                if number.to_uppercase().starts_with(&country) {
                    Some(number.to_string())
                } else {
                    Some(format!("{}{}", country, number))
                }
            }
            _ => Some(number.to_string()),
        }
    }

    pub fn full_address(&self) -> String {
        [
            self.address.as_deref(),
            self.postal_code.as_deref(),
            self.city.as_deref(),
            self.country.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyResponse {
    #[serde(flatten)]
    pub company: Company,
    pub full_vat_number: Option<String>,
    pub full_address: String,
}

impl From<Company> for CompanyResponse {
    fn from(company: Company) -> Self {
        Self {
            full_vat_number: company.full_vat_number(),
            full_address: company.full_address(),
            company,
        }
    }
}

/// Fields a partner may edit from the cabinet.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOwnCompanyRequest {
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// Fields staff may edit on a partner.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminUpdateCompanyRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub legal_name: Option<String>,
    #[serde(default)]
    pub vat_number: Option<String>,
    #[serde(default)]
    pub vat_country: Option<String>,
    #[serde(default)]
    pub handelsregister_id: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub credit_limit: Option<Decimal>,
    #[serde(default)]
    pub payment_terms: Option<i32>,
    #[serde(default)]
    pub discount_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyDecisionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyListFilter {
    #[serde(default)]
    pub status: Option<CompanyStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: Option<&str>, last: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "olena@example.com".into(),
            password_hash: String::new(),
            role: "customer".into(),
            is_active: true,
            is_verified: false,
            first_name: first.map(Into::into),
            last_name: last.map(Into::into),
            phone: None,
            company_id: None,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn company() -> Company {
        Company {
            id: Uuid::new_v4(),
            name: "Muster GmbH".into(),
            legal_name: None,
            vat_number: Some("123456789".into()),
            vat_country: Some("de".into()),
            vat_verified: false,
            vat_verified_at: None,
            vat_data: None,
            handelsregister_id: None,
            hr_data: None,
            website: None,
            domain: None,
            whois_data: None,
            whois_checked_at: None,
            address: Some("Hauptstr. 1".into()),
            city: Some("Berlin".into()),
            postal_code: Some("10115".into()),
            country: None,
            country_code: Some("DE".into()),
            contact_person: None,
            contact_email: None,
            contact_phone: None,
            credit_limit: Decimal::ZERO,
            payment_terms: 0,
            discount_percent: Decimal::ZERO,
            status: "pending".into(),
            rejection_reason: None,
            reliability_score: 0,
            reliability_level: "critical".into(),
            last_verification_at: None,
            last_verification_data: None,
            is_whois_verified: false,
            is_hr_verified: false,
            verified_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn full_name_falls_back_to_email_local_part() {
        assert_eq!(user(Some("Olena"), Some("Koval")).full_name(), "Olena Koval");
        assert_eq!(user(None, Some("Koval")).full_name(), "Koval");
        assert_eq!(user(None, None).full_name(), "olena");
    }

    #[test]
    fn b2b_requires_partner_role_and_company() {
        let mut u = user(None, None);
        u.role = "partner".into();
        assert!(!u.is_b2b());
        u.company_id = Some(Uuid::new_v4());
        assert!(u.is_b2b());
        assert!(!u.role().is_staff());
    }

    #[test]
    fn password_rules() {
        assert!(validate_new_password("12345", None, MIN_PASSWORD_LEN).is_err());
        assert!(validate_new_password("123456", Some("123457"), MIN_PASSWORD_LEN).is_err());
        assert!(validate_new_password("123456", Some("123456"), MIN_PASSWORD_LEN).is_ok());
        assert!(validate_new_password("1234567", None, MIN_B2B_PASSWORD_LEN).is_err());
    }

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Shop@Example.COM "), "shop@example.com");
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("a@b.de").is_ok());
    }

    #[test]
    fn vat_number_gets_country_prefix_once() {
        let mut c = company();
        assert_eq!(c.full_vat_number().as_deref(), Some("DE123456789"));
        c.vat_number = Some("de123456789".into());
        assert_eq!(c.full_vat_number().as_deref(), Some("de123456789"));
        c.vat_number = None;
        assert_eq!(c.full_vat_number(), None);
    }

    #[test]
    fn full_address_skips_empty_parts() {
        let c = company();
        assert_eq!(c.full_address(), "Hauptstr. 1, 10115, Berlin");
    }
}
