//! Persistence of partner verification results: company flags, check logs
//! and admin alerts.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::accounts::Company;
use crate::domain::verification::{
    AlertKind, AlertSeverity, CheckStatus, CheckType, VerificationInput, VerificationReport,
};
use crate::services::partner_verifier::MAX_SCORE_DROP;

/// Score at which a combined check counts as passed in the log.
pub const PASSING_SCORE: i32 = 50;

/// Verifier input from the stored company.
pub fn verification_input(company: &Company) -> VerificationInput {
    VerificationInput {
        company_name: company.name.clone(),
        vat_number: company.full_vat_number(),
        website: company.website.clone().or_else(|| company.domain.clone()),
        hr_number: company.handelsregister_id.clone(),
        country_code: company.country_code.clone(),
        city: company.city.clone(),
    }
}

/// Report stored by the last run, if it still deserializes.
pub fn previous_report(company: &Company) -> Option<VerificationReport> {
    company
        .last_verification_data
        .as_ref()
        .and_then(|Json(v)| serde_json::from_value(v.clone()).ok())
}

fn to_json<T: Serialize>(value: &T) -> Json<Value> {
    Json(serde_json::to_value(value).unwrap_or(Value::Null))
}

pub async fn fetch_company(db: &PgPool, id: Uuid) -> sqlx::Result<Option<Company>> {
    sqlx::query_as::<_, Company>("SELECT * FROM companies WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// Append a verification log entry.
#[allow(clippy::too_many_arguments)]
pub async fn log_check<'e, E>(
    executor: E,
    company_id: Uuid,
    check_type: CheckType,
    status: CheckStatus,
    is_valid: Option<bool>,
    request_data: Option<Value>,
    response_data: Option<Value>,
    error_message: Option<&str>,
    changes: Option<&str>,
) -> sqlx::Result<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query(
        r#"
        INSERT INTO verification_logs
            (id, company_id, check_type, status, is_valid, request_data, response_data,
             error_message, changes_detected, changes_description, checked_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW())
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(company_id)
    .bind(check_type.to_string())
    .bind(status.to_string())
    .bind(is_valid)
    .bind(request_data.map(Json))
    .bind(response_data.map(Json))
    .bind(error_message)
    .bind(changes.is_some())
    .bind(changes)
    .execute(executor)
    .await?;
    Ok(())
}

/// Insert an admin alert and return its id.
pub async fn create_alert<'e, E>(
    executor: E,
    company_id: Option<Uuid>,
    kind: AlertKind,
    severity: AlertSeverity,
    title: &str,
    message: Option<&str>,
    data: Option<Value>,
) -> sqlx::Result<Uuid>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO admin_alerts (id, company_id, alert_type, severity, title, message, data, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        "#,
    )
    .bind(id)
    .bind(company_id)
    .bind(kind.to_string())
    .bind(severity.to_string())
    .bind(title)
    .bind(message)
    .bind(data.map(Json))
    .execute(executor)
    .await?;
    Ok(id)
}

/// Write a report onto the company: score, level and the per-check flags.
async fn store_report(
    tx: &mut Transaction<'_, Postgres>,
    company_id: Uuid,
    report: &VerificationReport,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE companies
        SET reliability_score = $2, reliability_level = $3,
            last_verification_at = NOW(), last_verification_data = $4, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(company_id)
    .bind(report.reliability_score)
    .bind(report.reliability_level.to_string())
    .bind(to_json(report))
    .execute(&mut **tx)
    .await?;

    if let Some(vat) = &report.vat_result {
        sqlx::query(
            r#"
            UPDATE companies
            SET vat_verified = $2,
                vat_verified_at = CASE WHEN $2 THEN NOW() ELSE vat_verified_at END,
                vat_data = CASE WHEN $2 THEN $3 ELSE vat_data END
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(vat.valid)
        .bind(to_json(vat))
        .execute(&mut **tx)
        .await?;
    }

    if let Some(whois) = &report.whois_result {
        sqlx::query(
            r#"
            UPDATE companies
            SET is_whois_verified = $2,
                whois_checked_at = CASE WHEN $2 THEN NOW() ELSE whois_checked_at END,
                whois_data = CASE WHEN $2 THEN $3 ELSE whois_data END
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(whois.valid)
        .bind(to_json(whois))
        .execute(&mut **tx)
        .await?;
    }

    if let Some(hr) = &report.hr_result {
        sqlx::query(
            r#"
            UPDATE companies
            SET is_hr_verified = $2, hr_data = CASE WHEN $2 THEN $3 ELSE hr_data END
            WHERE id = $1
            "#,
        )
        .bind(company_id)
        .bind(hr.valid)
        .bind(to_json(hr))
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

/// Title used for alerts raised by a verification run.
pub fn alert_title(automatic: bool, company_name: &str, message: &str) -> String {
    if automatic {
        format!("[Auto] {}: {}", company_name, message)
    } else {
        format!("{}: {}", company_name, message)
    }
}

/// Persist a finished verification: company update, log and alerts.
///
/// A drop of more than 20 points from the stored score raises an alert
/// unless the report already carries one. Returns the kinds of alerts
/// created.
#[instrument(skip(db, company, report), fields(company_id = %company.id))]
pub async fn apply_report(
    db: &PgPool,
    company: &Company,
    report: &VerificationReport,
    check_type: CheckType,
) -> sqlx::Result<Vec<AlertKind>> {
    let automatic = check_type == CheckType::DailyAuto;
    let old_score = company.reliability_score;
    let mut tx = db.begin().await?;

    store_report(&mut tx, company.id, report).await?;

    let changes = (!report.changes.is_empty())
        .then(|| serde_json::to_string(&report.changes).unwrap_or_default());
    log_check(
        &mut *tx,
        company.id,
        check_type,
        CheckStatus::Success,
        Some(report.reliability_score >= PASSING_SCORE),
        Some(request_summary(&verification_input(company))),
        Some(to_json(report).0),
        None,
        changes.as_deref(),
    )
    .await?;

    let mut created = Vec::new();
    for alert in &report.alerts {
        create_alert(
            &mut *tx,
            Some(company.id),
            alert.kind,
            alert.severity,
            &alert_title(automatic, &company.name, &alert.message),
            Some(&alert.message),
            Some(to_json(report).0),
        )
        .await?;
        created.push(alert.kind);
    }

    let already_flagged = created.contains(&AlertKind::ReliabilityDropped);
    if old_score > 0 && report.reliability_score < old_score - MAX_SCORE_DROP && !already_flagged {
        let message = format!(
            "Score dropped from {} to {}",
            old_score, report.reliability_score
        );
        create_alert(
            &mut *tx,
            Some(company.id),
            AlertKind::ReliabilityDropped,
            AlertSeverity::Critical,
            &alert_title(automatic, &company.name, "Reliability dropped"),
            Some(&message),
            None,
        )
        .await?;
        created.push(AlertKind::ReliabilityDropped);
    }

    tx.commit().await?;

    info!(
        score = report.reliability_score,
        old_score = old_score,
        alerts = created.len(),
        checked_at = %Utc::now(),
        "Verification stored"
    );
    Ok(created)
}

/// Request data recorded in the verification log.
pub fn request_summary(input: &VerificationInput) -> Value {
    serde_json::json!({
        "company_name": input.company_name,
        "vat_number": input.vat_number,
        "website": input.website,
        "hr_number": input.hr_number,
        "country_code": input.country_code,
        "city": input.city,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_alert_titles() {
        assert_eq!(
            alert_title(true, "Muster GmbH", "Domain owner has changed"),
            "[Auto] Muster GmbH: Domain owner has changed"
        );
        assert_eq!(alert_title(false, "Muster GmbH", "x"), "Muster GmbH: x");
    }

    #[test]
    fn request_summary_lists_inputs() {
        let input = VerificationInput {
            company_name: "Muster GmbH".into(),
            vat_number: Some("DE123456789".into()),
            ..Default::default()
        };
        let v = request_summary(&input);
        assert_eq!(v["vat_number"], "DE123456789");
        assert!(v["website"].is_null());
    }
}
