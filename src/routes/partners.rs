//! B2B partner administration
//!
//! Company review (approve, reject, suspend), on-demand verification, the
//! admin alert inbox and the scheduled verification job.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, MessageResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireStaff;
use crate::domain::accounts::{
    AdminUpdateCompanyRequest, Company, CompanyDecisionRequest, CompanyListFilter,
    CompanyResponse, CompanyStatus, User, UserResponse,
};
use crate::domain::clean;
use crate::domain::verification::{
    AdminAlert, AlertKind, AlertListFilter, CheckType, ResolveAlertRequest, VerificationLog,
    VerificationReport, VerificationRunReport,
};
use crate::error::ApiError;
use crate::services::partners;
use crate::services::whois::extract_domain;

const COMPANY_LOG_LIMIT: i64 = 50;

#[derive(Serialize)]
pub struct CompanyDetailResponse {
    pub company: CompanyResponse,
    pub users: Vec<UserResponse>,
    pub logs: Vec<VerificationLog>,
    pub alerts: Vec<AdminAlert>,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub company: CompanyResponse,
    pub report: VerificationReport,
    pub alerts_created: Vec<AlertKind>,
    pub summary: String,
}

#[derive(Serialize)]
pub struct UnreadCount {
    pub unread: i64,
    pub critical: i64,
}

async fn company_or_404(state: &AppState, id: Uuid) -> Result<Company, ApiError> {
    partners::fetch_company(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Company not found"))
}

// =============================================================================
// Companies
// =============================================================================

/// GET /admin/companies
pub async fn list_companies(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<CompanyListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = filter.status.map(|s| s.to_string());

    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM companies WHERE ($1::TEXT IS NULL OR status = $1)",
    )
    .bind(&status)
    .fetch_one(&state.db)
    .await?;

    let companies = sqlx::query_as::<_, Company>(
        r#"
        SELECT * FROM companies
        WHERE ($1::TEXT IS NULL OR status = $1)
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&status)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    let data = companies.into_iter().map(CompanyResponse::from).collect();
    Ok(Paginated::new(data, &pagination, total))
}

/// GET /admin/companies/:id
pub async fn get_company(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let company = company_or_404(&state, id).await?;

    let users = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE company_id = $1 ORDER BY created_at",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    let logs = sqlx::query_as::<_, VerificationLog>(
        "SELECT * FROM verification_logs WHERE company_id = $1 ORDER BY checked_at DESC LIMIT $2",
    )
    .bind(id)
    .bind(COMPANY_LOG_LIMIT)
    .fetch_all(&state.db)
    .await?;

    let alerts = sqlx::query_as::<_, AdminAlert>(
        "SELECT * FROM admin_alerts WHERE company_id = $1 AND NOT is_resolved ORDER BY created_at DESC",
    )
    .bind(id)
    .fetch_all(&state.db)
    .await?;

    Ok(DataResponse::new(CompanyDetailResponse {
        company: company.into(),
        users: users.into_iter().map(Into::into).collect(),
        logs,
        alerts,
    }))
}

/// PATCH /admin/companies/:id
pub async fn update_company(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<AdminUpdateCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.as_deref().map_or(false, |n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("Company name cannot be empty"));
    }
    if req.payment_terms.map_or(false, |t| t < 0) {
        return Err(ApiError::bad_request("Payment terms cannot be negative"));
    }
    if req
        .discount_percent
        .map_or(false, |d| d.is_sign_negative() || d > Decimal::ONE_HUNDRED)
    {
        return Err(ApiError::bad_request("Discount must be between 0 and 100"));
    }

    let website = clean(req.website.clone());
    let domain = website.as_deref().map(extract_domain).filter(|d| !d.is_empty());

    let company = sqlx::query_as::<_, Company>(
        r#"
        UPDATE companies SET
            name = COALESCE($2, name),
            legal_name = COALESCE($3, legal_name),
            vat_number = COALESCE($4, vat_number),
            vat_country = COALESCE($5, vat_country),
            handelsregister_id = COALESCE($6, handelsregister_id),
            website = COALESCE($7, website),
            domain = COALESCE($8, domain),
            city = COALESCE($9, city),
            country_code = COALESCE($10, country_code),
            credit_limit = COALESCE($11, credit_limit),
            payment_terms = COALESCE($12, payment_terms),
            discount_percent = COALESCE($13, discount_percent),
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(clean(req.legal_name))
    .bind(clean(req.vat_number))
    .bind(clean(req.vat_country).map(|c| c.to_uppercase()))
    .bind(clean(req.handelsregister_id))
    .bind(&website)
    .bind(&domain)
    .bind(clean(req.city))
    .bind(clean(req.country_code).map(|c| c.to_uppercase()))
    .bind(req.credit_limit)
    .bind(req.payment_terms)
    .bind(req.discount_percent)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Company not found"))?;

    tracing::info!(company_id = %id, admin_id = %staff.user_id, "Company updated");
    Ok(DataResponse::new(CompanyResponse::from(company)))
}

/// POST /admin/companies/:id/verify
///
/// Run VAT, WHOIS and register checks now and store the result.
pub async fn verify_company(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let company = company_or_404(&state, id).await?;

    let input = partners::verification_input(&company);
    let previous = partners::previous_report(&company);
    let report = state.verifier().verify(&input, previous.as_ref()).await;
    let alerts_created = partners::apply_report(&state.db, &company, &report, CheckType::Full).await?;

    tracing::info!(
        company_id = %id,
        admin_id = %staff.user_id,
        score = report.reliability_score,
        "Company verified on demand"
    );

    let company = company_or_404(&state, id).await?;
    Ok(DataResponse::new(VerifyResponse {
        company: company.into(),
        summary: report.summary.clone(),
        report,
        alerts_created,
    }))
}

async fn set_company_status(
    state: &AppState,
    id: Uuid,
    status: CompanyStatus,
    reason: Option<String>,
) -> Result<Company, ApiError> {
    sqlx::query_as::<_, Company>(
        r#"
        UPDATE companies SET
            status = $2,
            rejection_reason = $3,
            verified_at = CASE WHEN $2 = 'verified' THEN NOW() ELSE verified_at END,
            updated_at = NOW()
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status.to_string())
    .bind(reason)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Company not found"))
}

/// POST /admin/companies/:id/approve
pub async fn approve_company(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let company = set_company_status(&state, id, CompanyStatus::Verified, None).await?;
    tracing::info!(company_id = %id, admin_id = %staff.user_id, "Company approved");
    Ok(DataResponse::new(CompanyResponse::from(company)))
}

/// POST /admin/companies/:id/reject
pub async fn reject_company(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
    Json(req): Json<CompanyDecisionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = clean(req.reason).ok_or_else(|| ApiError::bad_request("A reason is required"))?;
    let company = set_company_status(&state, id, CompanyStatus::Rejected, Some(reason)).await?;
    tracing::info!(company_id = %id, admin_id = %staff.user_id, "Company rejected");
    Ok(DataResponse::new(CompanyResponse::from(company)))
}

/// POST /admin/companies/:id/suspend
pub async fn suspend_company(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
    body: Option<Json<CompanyDecisionRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = body.and_then(|Json(r)| clean(r.reason));
    let company = set_company_status(&state, id, CompanyStatus::Suspended, reason).await?;
    tracing::info!(company_id = %id, admin_id = %staff.user_id, "Company suspended");
    Ok(DataResponse::new(CompanyResponse::from(company)))
}

// =============================================================================
// Alerts
// =============================================================================

/// GET /admin/alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Query(filter): Query<AlertListFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let severity = filter.severity.map(|s| s.to_string());
    let unresolved = filter.unresolved.unwrap_or(false);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM admin_alerts
        WHERE (NOT $1 OR NOT is_resolved)
          AND ($2::TEXT IS NULL OR severity = $2)
          AND ($3::UUID IS NULL OR company_id = $3)
        "#,
    )
    .bind(unresolved)
    .bind(&severity)
    .bind(filter.company_id)
    .fetch_one(&state.db)
    .await?;

    let alerts = sqlx::query_as::<_, AdminAlert>(
        r#"
        SELECT * FROM admin_alerts
        WHERE (NOT $1 OR NOT is_resolved)
          AND ($2::TEXT IS NULL OR severity = $2)
          AND ($3::UUID IS NULL OR company_id = $3)
        ORDER BY is_resolved, created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(unresolved)
    .bind(&severity)
    .bind(filter.company_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Paginated::new(alerts, &pagination, total))
}

/// GET /admin/alerts/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    let (unread, critical): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COUNT(*) FILTER (WHERE NOT is_read),
            COUNT(*) FILTER (WHERE NOT is_read AND severity = 'critical')
        FROM admin_alerts
        "#,
    )
    .fetch_one(&state.db)
    .await?;

    Ok(DataResponse::new(UnreadCount { unread, critical }))
}

/// POST /admin/alerts/:id/read
pub async fn mark_alert_read(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = sqlx::query("UPDATE admin_alerts SET is_read = TRUE WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    if updated.rows_affected() == 0 {
        return Err(ApiError::not_found("Alert not found"));
    }
    Ok(MessageResponse::new("Alert marked as read"))
}

/// POST /admin/alerts/:id/resolve
pub async fn resolve_alert(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
    Path(id): Path<Uuid>,
    body: Option<Json<ResolveAlertRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let note = body.and_then(|Json(r)| clean(r.note));
    let alert = sqlx::query_as::<_, AdminAlert>(
        r#"
        UPDATE admin_alerts SET
            is_read = TRUE,
            is_resolved = TRUE,
            resolved_by = $2,
            resolved_at = $3,
            resolution_note = $4
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(staff.user_id)
    .bind(Utc::now())
    .bind(note)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Alert not found"))?;

    tracing::info!(alert_id = %id, admin_id = %staff.user_id, "Alert resolved");
    Ok(DataResponse::new(alert))
}

// =============================================================================
// Scheduled verification
// =============================================================================

/// POST /admin/verification/run
pub async fn run_verification(
    State(state): State<Arc<AppState>>,
    staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!(admin_id = %staff.user_id, "Manual verification run requested");
    match state.verification.run().await? {
        Some(report) => Ok(DataResponse::new(report)),
        None => Err(ApiError::conflict("A verification run is already in progress")),
    }
}

/// GET /admin/verification/last-run
pub async fn last_run(
    State(state): State<Arc<AppState>>,
    _staff: RequireStaff,
) -> Result<impl IntoResponse, ApiError> {
    #[derive(Serialize)]
    struct LastRun {
        running: bool,
        report: Option<VerificationRunReport>,
    }

    Ok(DataResponse::new(LastRun {
        running: state.verification.is_running(),
        report: state.verification.last_run(),
    }))
}
