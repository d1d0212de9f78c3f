//! Authentication routes
//!
//! Local accounts with argon2 password hashes; every successful register or
//! login returns a signed access token.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::accounts::{
    CompanyResponse, LoginRequest, RegisterB2bRequest, RegisterRequest, TokenResponse, User,
    UserResponse,
};
use crate::domain::verification::{CheckVatRequest, VatCheckResult};
use crate::error::{ApiError, ApiResult};
use crate::services::cache::keys;
use crate::services::partners;
use crate::services::vat::parse_vat_number;
use crate::services::{accounts, settings};

#[derive(Serialize)]
pub struct PartnerRegistration {
    #[serde(flatten)]
    pub session: TokenResponse,
    pub company: CompanyResponse,
}

#[derive(Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
    pub company: Option<CompanyResponse>,
}

fn token_response(state: &AppState, user: User) -> ApiResult<TokenResponse> {
    let access_token = state.tokens.issue(&user)?;
    Ok(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.tokens.ttl_seconds(),
        user: user.into(),
    })
}

/// `COUNTRY` + digits, the form VAT results are cached under.
fn normalized_vat(raw: &str, country_code: Option<&str>) -> String {
    let (prefix, number) = parse_vat_number(raw);
    match country_code.map(str::trim).filter(|c| !c.is_empty()) {
        Some(country) => {
            let country = country.to_uppercase();
            let number = if prefix.is_empty() {
                number.strip_prefix(country.as_str()).unwrap_or(&number).to_string()
            } else {
                number
            };
            format!("{}{}", country, number)
        }
        None => format!("{}{}", prefix, number),
    }
}

/// POST /auth/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = accounts::register_customer(&state.db, &req).await?;
    Ok(Created(token_response(&state, user)?))
}

/// POST /auth/register/b2b
///
/// Create a partner company and its first user. The VAT number is checked
/// against VIES before anything is written.
pub async fn register_b2b(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterB2bRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let site = settings::site_settings(&state.db).await?;
    let (user, company) =
        accounts::register_partner(&state.db, state.verifier().vat(), &site, &req).await?;

    Ok(Created(PartnerRegistration {
        session: token_response(&state, user)?,
        company: company.into(),
    }))
}

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = accounts::login(&state.db, &req).await?;
    Ok(DataResponse::new(token_response(&state, user)?))
}

/// GET /me
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = accounts::find_user(&state.db, auth.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| ApiError::Unauthorized("Account no longer exists".into()))?;

    let company = match user.company_id {
        Some(id) => partners::fetch_company(&state.db, id).await?.map(Into::into),
        None => None,
    };

    Ok(DataResponse::new(MeResponse {
        user: user.into(),
        company,
    }))
}

/// POST /auth/check-vat
///
/// Live VIES lookup for the registration form. Definitive answers are cached.
pub async fn check_vat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckVatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let raw = req.vat_number.trim();
    if raw.is_empty() {
        return Err(ApiError::bad_request("VAT number is required"));
    }

    let full = normalized_vat(raw, req.country_code.as_deref());
    let key = keys::vat(&full);
    if let Some(cached) = state.cache.get::<VatCheckResult>(&key).await {
        return Ok(DataResponse::new(cached));
    }

    let result = state
        .verifier()
        .vat()
        .check_with_country(raw, req.country_code.as_deref())
        .await;

    // only definitive answers are worth keeping
    if result.error.is_none() {
        if let Err(e) = state.cache.set(&key, &result).await {
            tracing::warn!(error = %e, "Failed to cache VAT result");
        }
    }

    Ok(DataResponse::new(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vat_cache_key_is_normalized() {
        assert_eq!(normalized_vat("de 123 456 789", None), "DE123456789");
        assert_eq!(normalized_vat("123456789", Some("de")), "DE123456789");
        assert_eq!(normalized_vat("DE123456789", Some("DE")), "DE123456789");
    }
}
