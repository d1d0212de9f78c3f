//! Periodic re-verification of partner companies.

use chrono::Utc;
use futures::{stream, StreamExt};
use parking_lot::Mutex;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::domain::accounts::Company;
use crate::domain::verification::{
    CheckStatus, CheckType, CompanyRunDetail, VerificationRunReport,
};
use crate::services::partner_verifier::PartnerVerifier;
use crate::services::partners;

/// Companies verified at the same time.
const CONCURRENCY: usize = 4;

#[derive(Clone)]
pub struct VerificationJob {
    db: PgPool,
    verifier: PartnerVerifier,
    last_run: Arc<Mutex<Option<VerificationRunReport>>>,
    running: Arc<AtomicBool>,
}

impl VerificationJob {
    pub fn new(db: PgPool, verifier: PartnerVerifier) -> Self {
        Self {
            db,
            verifier,
            last_run: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn verifier(&self) -> &PartnerVerifier {
        &self.verifier
    }

    pub fn last_run(&self) -> Option<VerificationRunReport> {
        self.last_run.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Verify every pending or verified company once.
    ///
    /// Returns `Ok(None)` when a run is already in progress.
    pub async fn run(&self) -> anyhow::Result<Option<VerificationRunReport>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Verification run already in progress");
            return Ok(None);
        }
        let result = self.run_inner().await;
        self.running.store(false, Ordering::SeqCst);

        let report = result?;
        *self.last_run.lock() = Some(report.clone());
        Ok(Some(report))
    }

    async fn run_inner(&self) -> anyhow::Result<VerificationRunReport> {
        let started = Utc::now();
        let companies = sqlx::query_as::<_, Company>(
            "SELECT * FROM companies WHERE status IN ('verified', 'pending') ORDER BY created_at",
        )
        .fetch_all(&self.db)
        .await?;

        info!(companies = companies.len(), "Starting partner verification run");

        let details: Vec<CompanyRunDetail> = stream::iter(companies)
            .map(|company| async move { self.check_company(&company).await })
            .buffer_unordered(CONCURRENCY)
            .collect()
            .await;

        let finished = Utc::now();
        let report = VerificationRunReport {
            started_at: Some(started),
            finished_at: Some(finished),
            duration_seconds: (finished - started).num_milliseconds() as f64 / 1000.0,
            checked: details.iter().filter(|d| d.success).count(),
            alerts_created: details.iter().map(|d| d.alerts.len()).sum(),
            errors: details.iter().filter(|d| !d.success).count(),
            details,
        };

        info!(
            checked = report.checked,
            alerts = report.alerts_created,
            errors = report.errors,
            duration_seconds = report.duration_seconds,
            "Partner verification run finished"
        );
        Ok(report)
    }

    async fn check_company(&self, company: &Company) -> CompanyRunDetail {
        let input = partners::verification_input(company);
        let previous = partners::previous_report(company);
        let report = self.verifier.verify(&input, previous.as_ref()).await;

        let mut detail = CompanyRunDetail {
            company_id: company.id,
            company_name: company.name.clone(),
            success: false,
            new_score: None,
            alerts: Vec::new(),
            error: None,
        };

        match partners::apply_report(&self.db, company, &report, CheckType::DailyAuto).await {
            Ok(alerts) => {
                detail.success = true;
                detail.new_score = Some(report.reliability_score);
                detail.alerts = alerts.iter().map(ToString::to_string).collect();
            }
            Err(e) => {
                error!(company_id = %company.id, error = %e, "Failed to store verification");
                let message = e.to_string();
                if let Err(log_err) = partners::log_check(
                    &self.db,
                    company.id,
                    CheckType::DailyAuto,
                    CheckStatus::Error,
                    Some(false),
                    None,
                    None,
                    Some(&message),
                    None,
                )
                .await
                {
                    error!(company_id = %company.id, error = %log_err, "Failed to log verification error");
                }
                detail.error = Some(message);
            }
        }
        detail
    }

    /// Run every `interval` until the process exits.
    pub async fn run_every(self, interval: Duration) {
        info!(interval_secs = interval.as_secs(), "Partner verification job scheduled");
        let mut ticker = tokio::time::interval(interval);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if let Err(e) = self.run().await {
                error!(error = %e, "Partner verification run failed");
            }
        }
    }
}
