//! Customer cabinet
//!
//! Consumers see their own orders. Partner accounts see every order of their
//! company, and only once the company has been verified.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, MessageResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::domain::accounts::{
    ChangePasswordRequest, Company, CompanyResponse, UpdateOwnCompanyRequest,
    UpdateProfileRequest, UserResponse,
};
use crate::domain::clean;
use crate::domain::orders::Order;
use crate::error::ApiError;
use crate::routes::admin::PAID_STATUSES;
use crate::services::{accounts, orders, partners};

const RECENT_ORDERS: i64 = 5;

/// Orders visible to the caller: the whole company for partners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderScope {
    User(Uuid),
    Company(Uuid),
}

impl OrderScope {
    fn of(auth: &AuthContext) -> Self {
        match auth.company_id {
            Some(company_id) if auth.is_b2b() => Self::Company(company_id),
            _ => Self::User(auth.user_id),
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Self::User(_) => "user_id",
            Self::Company(_) => "company_id",
        }
    }

    fn id(&self) -> Uuid {
        match self {
            Self::User(id) | Self::Company(id) => *id,
        }
    }
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderTotals {
    pub orders_count: i64,
    pub total_spent: Decimal,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CabinetSummary {
    Customer {
        user: UserResponse,
        #[serde(flatten)]
        totals: OrderTotals,
        recent_orders: Vec<Order>,
    },
    Partner {
        user: UserResponse,
        company: CompanyResponse,
        #[serde(flatten)]
        totals: OrderTotals,
        recent_orders: Vec<Order>,
    },
    /// Partner whose company is still under review.
    PartnerPending {
        user: UserResponse,
        company: CompanyResponse,
        message: String,
    },
}

async fn own_company(state: &AppState, auth: &AuthContext) -> Result<Company, ApiError> {
    let company_id = auth
        .company_id
        .ok_or_else(|| ApiError::not_found("No company linked to this account"))?;
    partners::fetch_company(&state.db, company_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))
}

/// Partners of an unverified company cannot use the cabinet yet.
fn ensure_verified(company: &Company) -> Result<(), ApiError> {
    if company.is_verified() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Company verification is pending"))
    }
}

async fn order_totals(state: &AppState, scope: OrderScope) -> Result<OrderTotals, ApiError> {
    let totals = sqlx::query_as::<_, OrderTotals>(&format!(
        r#"
        SELECT COUNT(*) AS orders_count,
               COALESCE(SUM(amount) FILTER (WHERE status IN {paid}), 0) AS total_spent
        FROM orders WHERE {column} = $1
        "#,
        paid = PAID_STATUSES,
        column = scope.column()
    ))
    .bind(scope.id())
    .fetch_one(&state.db)
    .await?;
    Ok(totals)
}

async fn recent_orders(state: &AppState, scope: OrderScope, limit: i64, offset: i64) -> Result<Vec<Order>, ApiError> {
    let orders = sqlx::query_as::<_, Order>(&format!(
        "SELECT * FROM orders WHERE {} = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        scope.column()
    ))
    .bind(scope.id())
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.db)
    .await?;
    Ok(orders)
}

/// GET /cabinet
pub async fn summary(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = accounts::find_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let scope = OrderScope::of(&auth);
    let summary = match scope {
        OrderScope::Company(_) => {
            let company = own_company(&state, &auth).await?;
            if company.is_verified() {
                CabinetSummary::Partner {
                    user: user.into(),
                    company: company.into(),
                    totals: order_totals(&state, scope).await?,
                    recent_orders: recent_orders(&state, scope, RECENT_ORDERS, 0).await?,
                }
            } else {
                CabinetSummary::PartnerPending {
                    user: user.into(),
                    company: company.into(),
                    message: "Your company is being verified. We will e-mail you once it is approved."
                        .to_string(),
                }
            }
        }
        OrderScope::User(_) => CabinetSummary::Customer {
            user: user.into(),
            totals: order_totals(&state, scope).await?,
            recent_orders: recent_orders(&state, scope, RECENT_ORDERS, 0).await?,
        },
    };
    Ok(DataResponse::new(summary))
}

/// GET /cabinet/orders
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let scope = OrderScope::of(&auth);
    if let OrderScope::Company(_) = scope {
        ensure_verified(&own_company(&state, &auth).await?)?;
    }

    let totals = order_totals(&state, scope).await?;
    let orders = recent_orders(&state, scope, pagination.limit(), pagination.offset()).await?;
    Ok(Paginated::new(orders, &pagination, totals.orders_count))
}

/// GET /cabinet/orders/:id
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let detail = orders::fetch_detail(&state.db, id)
        .await?
        .filter(|d| match OrderScope::of(&auth) {
            OrderScope::User(user_id) => d.order.user_id == Some(user_id),
            OrderScope::Company(company_id) => d.order.company_id == Some(company_id),
        })
        .ok_or_else(|| ApiError::not_found("Order not found"))?;
    Ok(DataResponse::new(detail))
}

/// PUT /cabinet/profile
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = accounts::update_profile(&state.db, auth.user_id, &req).await?;
    Ok(DataResponse::new(UserResponse::from(user)))
}

/// POST /cabinet/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    accounts::change_password(&state.db, auth.user_id, &req).await?;
    Ok(MessageResponse::new("Password changed"))
}

/// GET /cabinet/company
pub async fn get_company(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let company = own_company(&state, &auth).await?;
    Ok(DataResponse::new(CompanyResponse::from(company)))
}

/// PUT /cabinet/company
///
/// Legal data (name, VAT, register number) is only editable by staff.
pub async fn update_company(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<UpdateOwnCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !auth.is_b2b() {
        return Err(ApiError::forbidden("Only partner accounts can edit a company"));
    }
    let company = own_company(&state, &auth).await?;

    let updated = sqlx::query_as::<_, Company>(
        r#"
        UPDATE companies SET
            contact_person = COALESCE($2, contact_person),
            contact_phone = COALESCE($3, contact_phone),
            address = COALESCE($4, address),
            city = COALESCE($5, city),
            postal_code = COALESCE($6, postal_code),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(company.id)
    .bind(clean(req.contact_person))
    .bind(clean(req.contact_phone))
    .bind(clean(req.address))
    .bind(clean(req.city))
    .bind(clean(req.postal_code))
    .fetch_one(&state.db)
    .await?;

    tracing::info!(company_id = %company.id, user_id = %auth.user_id, "Company contact data updated");
    Ok(DataResponse::new(CompanyResponse::from(updated)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;

    fn auth(role: &str, company_id: Option<Uuid>) -> AuthContext {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            aud: "smartshop".into(),
            iss: "smartshop".into(),
            iat: 0,
            exp: 0,
            email: "buyer@example.com".into(),
            role: role.into(),
            company_id,
        };
        AuthContext::from_claims(&claims).unwrap()
    }

    #[test]
    fn partners_see_company_orders() {
        let company = Uuid::new_v4();
        let partner = auth("partner", Some(company));
        assert_eq!(OrderScope::of(&partner), OrderScope::Company(company));
        assert_eq!(OrderScope::of(&partner).column(), "company_id");
    }

    #[test]
    fn customers_see_their_own_orders() {
        let customer = auth("customer", None);
        assert_eq!(OrderScope::of(&customer), OrderScope::User(customer.user_id));

        // a company link alone does not widen the scope
        let stray = auth("customer", Some(Uuid::new_v4()));
        assert_eq!(OrderScope::of(&stray).column(), "user_id");
    }
}
