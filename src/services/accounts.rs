//! Account registration, login and the bootstrap admin.

use anyhow::Context;
use chrono::Utc;
use sqlx::{PgConnection, PgPool};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{hash_password, verify_password};
use crate::config::Settings;
use crate::db;
use crate::domain::accounts::{
    normalize_email, validate_email, validate_new_password, ChangePasswordRequest, Company,
    CompanyStatus, LoginRequest, RegisterB2bRequest, RegisterRequest, UpdateProfileRequest, User,
    UserRole, MIN_B2B_PASSWORD_LEN, MIN_PASSWORD_LEN,
};
use crate::domain::clean;
use crate::domain::site::SiteSettings;
use crate::domain::verification::{
    AlertKind, AlertSeverity, CheckStatus, CheckType, VatCheckResult,
};
use crate::error::{ApiError, ApiResult};
use crate::services::partners;
use crate::services::vat::{parse_vat_number, VatChecker};
use crate::services::whois::extract_domain;

pub async fn find_user(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

async fn find_by_email(conn: &mut PgConnection, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(&mut *conn)
        .await
}

#[allow(clippy::too_many_arguments)]
async fn insert_user(
    conn: &mut PgConnection,
    email: &str,
    password: &str,
    role: UserRole,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    company_id: Option<Uuid>,
) -> ApiResult<User> {
    if find_by_email(&mut *conn, email).await?.is_some() {
        return Err(ApiError::conflict("A user with this email already exists"));
    }
    let password_hash = hash_password(password)?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users
            (id, email, password_hash, role, is_active, first_name, last_name, phone, company_id,
             created_at, updated_at)
        VALUES ($1, $2, $3, $4, TRUE, $5, $6, $7, $8, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(role.to_string())
    .bind(first_name)
    .bind(last_name)
    .bind(phone)
    .bind(company_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        // a concurrent registration won the race
        if db::is_unique_violation(&e) {
            ApiError::conflict("A user with this email already exists")
        } else {
            e.into()
        }
    })?;
    Ok(user)
}

/// Register a retail customer.
#[instrument(skip(db, req))]
pub async fn register_customer(db: &PgPool, req: &RegisterRequest) -> ApiResult<User> {
    validate_email(&req.email).map_err(ApiError::BadRequest)?;
    validate_new_password(&req.password, req.password_confirm.as_deref(), MIN_PASSWORD_LEN)
        .map_err(ApiError::BadRequest)?;

    let email = normalize_email(&req.email);
    let mut conn = db.acquire().await?;
    let user = insert_user(
        &mut conn,
        &email,
        &req.password,
        UserRole::Customer,
        clean(req.first_name.clone()),
        clean(req.last_name.clone()),
        clean(req.phone.clone()),
        None,
    )
    .await?;

    info!(user_id = %user.id, "Customer registered");
    Ok(user)
}

/// Country the VAT number belongs to: the one given explicitly, else the
/// number's own prefix, else the company's country.
pub fn vat_country(
    vat_number: Option<&str>,
    explicit: Option<&str>,
    country_code: Option<&str>,
) -> Option<String> {
    let given = |c: Option<&str>| {
        c.map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_uppercase)
    };
    given(explicit)
        .or_else(|| {
            vat_number
                .map(|n| parse_vat_number(n).0)
                .filter(|c| !c.is_empty())
        })
        .or_else(|| given(country_code))
}

/// Company status after registration: verified only when auto-approve is on
/// and VIES confirmed the VAT number.
pub fn initial_company_status(auto_approve: bool, vat: Option<&VatCheckResult>) -> CompanyStatus {
    match vat {
        Some(check) if auto_approve && check.valid => CompanyStatus::Verified,
        _ => CompanyStatus::Pending,
    }
}

/// Register a partner and its company, checking the VAT number first.
#[instrument(skip(db, vat, site, req), fields(company = %req.company_name))]
pub async fn register_partner(
    db: &PgPool,
    vat: &VatChecker,
    site: &SiteSettings,
    req: &RegisterB2bRequest,
) -> ApiResult<(User, Company)> {
    if !site.b2b_signup_allowed() {
        return Err(ApiError::forbidden("B2B registration is closed"));
    }
    req.validate().map_err(ApiError::BadRequest)?;

    let email = normalize_email(&req.email);
    let vat_number = clean(req.vat_number.clone());
    let vat_country = vat_country(
        vat_number.as_deref(),
        req.vat_country.as_deref(),
        req.country_code.as_deref(),
    );

    let vat_check = match vat_number.as_deref() {
        Some(number) => Some(vat.check_with_country(number, vat_country.as_deref()).await),
        None => None,
    };
    let vat_valid = vat_check.as_ref().map_or(false, |c| c.valid);
    let status = initial_company_status(site.b2b_auto_approve, vat_check.as_ref());

    let legal_name = clean(req.legal_name.clone())
        .or_else(|| vat_check.as_ref().and_then(|c| c.name.clone()));
    let address = clean(req.address.clone())
        .or_else(|| vat_check.as_ref().and_then(|c| c.address.clone()));
    let website = clean(req.website.clone());
    let domain = website
        .as_deref()
        .map(extract_domain)
        .filter(|d| !d.is_empty());
    let vat_data = vat_check
        .as_ref()
        .and_then(|c| serde_json::to_value(c).ok());
    let contact_person = format!("{} {}", req.first_name.trim(), req.last_name.trim());
    let now = Utc::now();

    let mut tx = db.begin().await?;
    if find_by_email(&mut tx, &email).await?.is_some() {
        return Err(ApiError::conflict("A user with this email already exists"));
    }

    let company = sqlx::query_as::<_, Company>(
        r#"
        INSERT INTO companies
            (id, name, legal_name, vat_number, vat_country, vat_verified, vat_verified_at, vat_data,
             handelsregister_id, website, domain, address, city, postal_code, country, country_code,
             contact_person, contact_email, contact_phone, status, verified_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19,
                $20, $21, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.company_name.trim())
    .bind(&legal_name)
    .bind(&vat_number)
    .bind(&vat_country)
    .bind(vat_valid)
    .bind(vat_valid.then_some(now))
    .bind(vat_data.clone().map(sqlx::types::Json))
    .bind(clean(req.handelsregister_id.clone()))
    .bind(&website)
    .bind(&domain)
    .bind(&address)
    .bind(clean(req.city.clone()))
    .bind(clean(req.postal_code.clone()))
    .bind(clean(req.country.clone()))
    .bind(clean(req.country_code.clone()).map(|c| c.to_uppercase()))
    .bind(&contact_person)
    .bind(&email)
    .bind(clean(req.phone.clone()))
    .bind(status.to_string())
    .bind((status == CompanyStatus::Verified).then_some(now))
    .fetch_one(&mut *tx)
    .await?;

    let user = insert_user(
        &mut tx,
        &email,
        &req.password,
        UserRole::Partner,
        Some(req.first_name.trim().to_string()),
        Some(req.last_name.trim().to_string()),
        clean(req.phone.clone()),
        Some(company.id),
    )
    .await?;

    if let Some(check) = &vat_check {
        let check_status = if check.error.is_some() && !check.valid {
            CheckStatus::Failed
        } else {
            CheckStatus::Success
        };
        partners::log_check(
            &mut *tx,
            company.id,
            CheckType::Vat,
            check_status,
            Some(check.valid),
            Some(serde_json::json!({ "vat_number": vat_number, "country": vat_country })),
            vat_data,
            check.error.as_deref(),
            None,
        )
        .await?;
    }

    let message = match status {
        CompanyStatus::Verified => "Registered and approved automatically",
        _ => "Registered and waiting for approval",
    };
    partners::create_alert(
        &mut *tx,
        Some(company.id),
        AlertKind::NewPartner,
        AlertSeverity::Info,
        &format!("New partner: {}", company.name),
        Some(message),
        None,
    )
    .await?;

    tx.commit().await?;

    info!(
        user_id = %user.id,
        company_id = %company.id,
        status = %company.status,
        vat_valid = vat_valid,
        "Partner registered"
    );
    Ok((user, company))
}

/// Check credentials and stamp `last_login`.
#[instrument(skip(db, req))]
pub async fn login(db: &PgPool, req: &LoginRequest) -> ApiResult<User> {
    let email = normalize_email(&req.email);
    let mut conn = db.acquire().await?;
    let user = find_by_email(&mut conn, &email).await?;

    let Some(user) = user.filter(|u| verify_password(&req.password, &u.password_hash)) else {
        warn!("Failed login attempt");
        return Err(ApiError::Unauthorized("Invalid email or password".to_string()));
    };
    if !user.is_active {
        return Err(ApiError::forbidden("Account is disabled"));
    }

    let user = sqlx::query_as::<_, User>(
        "UPDATE users SET last_login = NOW() WHERE id = $1 RETURNING *",
    )
    .bind(user.id)
    .fetch_one(&mut *conn)
    .await?;

    info!(user_id = %user.id, role = %user.role, "User logged in");
    Ok(user)
}

pub async fn update_profile(db: &PgPool, user_id: Uuid, req: &UpdateProfileRequest) -> ApiResult<User> {
    sqlx::query_as::<_, User>(
        r#"
        UPDATE users
        SET first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            phone = COALESCE($4, phone),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(clean(req.first_name.clone()))
    .bind(clean(req.last_name.clone()))
    .bind(clean(req.phone.clone()))
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("User not found"))
}

#[instrument(skip(db, req))]
pub async fn change_password(db: &PgPool, user_id: Uuid, req: &ChangePasswordRequest) -> ApiResult<()> {
    let user = find_user(db, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }
    let min_len = if user.is_b2b() {
        MIN_B2B_PASSWORD_LEN
    } else {
        MIN_PASSWORD_LEN
    };
    validate_new_password(&req.new_password, Some(&req.confirm_password), min_len)
        .map_err(ApiError::BadRequest)?;

    sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(hash_password(&req.new_password)?)
        .execute(db)
        .await?;
    info!(user_id = %user_id, "Password changed");
    Ok(())
}

/// Create the admin from `ADMIN_EMAIL`/`ADMIN_PASSWORD` when there is none.
pub async fn bootstrap_admin(db: &PgPool, settings: &Settings) -> anyhow::Result<()> {
    let (Some(email), Some(password)) = (&settings.admin_email, &settings.admin_password) else {
        return Ok(());
    };

    let has_admin: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = $1)")
        .bind(UserRole::Admin.to_string())
        .fetch_one(db)
        .await
        .context("Failed to look up admin users")?;
    if has_admin {
        return Ok(());
    }

    let email = normalize_email(email);
    let hash = hash_password(password)?;
    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, role, is_active, is_verified, created_at, updated_at)
        VALUES ($1, $2, $3, $4, TRUE, TRUE, NOW(), NOW())
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role, updated_at = NOW()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(hash)
    .bind(UserRole::Admin.to_string())
    .execute(db)
    .await
    .context("Failed to create bootstrap admin")?;

    info!(email = %email, "Bootstrap admin created");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vat(valid: bool) -> VatCheckResult {
        VatCheckResult {
            valid,
            country_code: "DE".into(),
            vat_number: "123456789".into(),
            ..Default::default()
        }
    }

    #[test]
    fn vat_country_comes_from_the_number_prefix() {
        assert_eq!(vat_country(Some("DE123456789"), None, Some("AT")).as_deref(), Some("DE"));
        assert_eq!(vat_country(Some("de 123 456 789"), None, None).as_deref(), Some("DE"));
        assert_eq!(vat_country(Some("123456789"), None, Some("at")).as_deref(), Some("AT"));
        assert_eq!(vat_country(Some("DE123456789"), Some(" nl "), Some("AT")).as_deref(), Some("NL"));
        assert_eq!(vat_country(None, None, None), None);
    }

    #[test]
    fn company_is_approved_only_with_valid_vat_and_auto_approve() {
        assert_eq!(initial_company_status(true, Some(&vat(true))), CompanyStatus::Verified);
        assert_eq!(initial_company_status(true, Some(&vat(false))), CompanyStatus::Pending);
        assert_eq!(initial_company_status(false, Some(&vat(true))), CompanyStatus::Pending);
        assert_eq!(initial_company_status(true, None), CompanyStatus::Pending);
    }
}
