//! Partner verification results, verification logs and admin alerts.
//!
//! Check results are stored as JSON on the company row and read back on the
//! next run to detect changes, so every result type round-trips through serde.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use std::fmt;
use uuid::Uuid;

use super::text_of;

/// VIES lookup outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VatCheckResult {
    pub valid: bool,
    pub country_code: String,
    pub vat_number: String,
    pub request_date: Option<DateTime<Utc>>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub error: Option<String>,
    /// VIES could not be reached or answered with a server error.
    #[serde(default)]
    pub lookup_failed: bool,
}

/// Fields pulled out of a raw WHOIS response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoisRecord {
    pub creation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub registrar: Option<String>,
    pub registrant_name: Option<String>,
    pub registrant_org: Option<String>,
    pub registrant_country: Option<String>,
    pub status: Vec<String>,
    pub name_servers: Vec<String>,
}

/// WHOIS domain check outcome
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoisResult {
    pub valid: bool,
    pub domain: String,
    pub tld: String,
    pub creation_date: Option<NaiveDate>,
    pub expiration_date: Option<NaiveDate>,
    pub age_days: Option<i64>,
    pub registrar: Option<String>,
    pub registrant_name: Option<String>,
    pub registrant_org: Option<String>,
    pub registrant_country: Option<String>,
    #[serde(default)]
    pub status: Vec<String>,
    #[serde(default)]
    pub name_servers: Vec<String>,
    pub is_active: bool,
    pub is_expired: bool,
    pub reliability_score: i32,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub error: Option<String>,
    /// No WHOIS answer came back (connection error or timeout).
    #[serde(default)]
    pub lookup_failed: bool,
    pub checked_at: Option<DateTime<Utc>>,
}

impl WhoisResult {
    /// Organisation, or person when no organisation is published.
    pub fn registrant(&self) -> Option<&str> {
        self.registrant_org
            .as_deref()
            .or(self.registrant_name.as_deref())
            .filter(|s| !s.is_empty())
    }
}

/// Registrant vs company comparison
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrantMatch {
    pub matches: bool,
    pub name_match: bool,
    pub country_match: bool,
    pub confidence: i32,
    pub details: String,
}

/// Parsed `HRB 12345 B` style register number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrNumber {
    pub register_type: String,
    pub number: String,
    pub suffix: Option<String>,
}

impl fmt::Display for HrNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.register_type, self.number)?;
        if let Some(suffix) = &self.suffix {
            write!(f, " {}", suffix)?;
        }
        Ok(())
    }
}

/// Online register search hit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegisterSearchResult {
    pub found: bool,
    pub source: Option<String>,
    pub results_count: usize,
    pub first_result: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub lookup_failed: bool,
}

/// Handelsregister number verification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrVerification {
    pub valid: bool,
    pub hr_number: String,
    pub parsed: Option<HrNumber>,
    pub court: Option<String>,
    pub company_type: Option<String>,
    pub status: String,
    pub online: Option<RegisterSearchResult>,
    pub reliability_score: i32,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub error: Option<String>,
}

/// German company register check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HrCheckResult {
    pub valid: bool,
    pub company_name: String,
    pub is_german: bool,
    pub company_type: Option<String>,
    /// Full name of the legal form, e.g. "Gesellschaft mit beschränkter Haftung".
    #[serde(default)]
    pub legal_form: Option<String>,
    pub hr_verification: Option<HrVerification>,
    pub reliability_score: i32,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub checked_at: Option<DateTime<Utc>>,
}

impl HrCheckResult {
    /// The online register search ran and failed.
    pub fn lookup_failed(&self) -> bool {
        self.hr_verification
            .as_ref()
            .and_then(|v| v.online.as_ref())
            .map_or(false, |o| o.lookup_failed)
    }

    pub fn lookup_error(&self) -> Option<&str> {
        self.hr_verification
            .as_ref()
            .and_then(|v| v.online.as_ref())
            .and_then(|o| o.error.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReliabilityLevel {
    Critical,
    Low,
    Medium,
    High,
}

impl ReliabilityLevel {
    pub const HIGH_THRESHOLD: i32 = 80;
    pub const MEDIUM_THRESHOLD: i32 = 50;
    pub const LOW_THRESHOLD: i32 = 20;

    pub fn from_score(score: i32) -> Self {
        if score >= Self::HIGH_THRESHOLD {
            Self::High
        } else if score >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else if score >= Self::LOW_THRESHOLD {
            Self::Low
        } else {
            Self::Critical
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High reliability",
            Self::Medium => "Medium reliability",
            Self::Low => "Low reliability",
            Self::Critical => "Critical reliability",
        }
    }
}

impl Default for ReliabilityLevel {
    fn default() -> Self {
        Self::Critical
    }
}

impl fmt::Display for ReliabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

impl Default for AlertSeverity {
    fn default() -> Self {
        Self::Info
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    VatInvalid,
    VatChanged,
    DomainExpired,
    DomainOwnerChanged,
    DomainNew,
    HrNotFound,
    ReliabilityDropped,
    NewPartner,
    VerificationFailed,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

/// Alert raised by a verification run, before it is persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAlert {
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub message: String,
    pub severity: AlertSeverity,
}

/// Field that differs from the previous run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedChange {
    #[serde(rename = "type")]
    pub kind: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Combined VAT + WHOIS + register verification
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub company_name: String,
    pub verified_at: Option<DateTime<Utc>>,
    pub reliability_score: i32,
    pub reliability_level: ReliabilityLevel,
    pub vat_result: Option<VatCheckResult>,
    pub whois_result: Option<WhoisResult>,
    pub hr_result: Option<HrCheckResult>,
    #[serde(default)]
    pub registrant_match: Option<RegistrantMatch>,
    pub is_german: bool,
    #[serde(default)]
    pub alerts: Vec<ReportAlert>,
    #[serde(default)]
    pub changes: Vec<DetectedChange>,
    pub summary: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl VerificationReport {
    pub fn critical_alerts(&self) -> usize {
        self.alerts
            .iter()
            .filter(|a| a.severity == AlertSeverity::Critical)
            .count()
    }
}

/// Inputs for a full verification run
#[derive(Debug, Clone, Default)]
pub struct VerificationInput {
    pub company_name: String,
    pub vat_number: Option<String>,
    pub website: Option<String>,
    pub hr_number: Option<String>,
    pub country_code: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckType {
    Vat,
    Whois,
    Handelsregister,
    Full,
    DailyAuto,
}

impl fmt::Display for CheckType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Success,
    Failed,
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text_of(self))
    }
}

/// Verification log entry
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VerificationLog {
    pub id: Uuid,
    pub company_id: Uuid,
    pub check_type: String,
    pub status: String,
    pub is_valid: Option<bool>,
    pub request_data: Option<Json<Value>>,
    pub response_data: Option<Json<Value>>,
    pub error_message: Option<String>,
    pub changes_detected: bool,
    pub changes_description: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Admin alert entity
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AdminAlert {
    pub id: Uuid,
    pub company_id: Option<Uuid>,
    pub alert_type: String,
    pub severity: String,
    pub title: String,
    pub message: Option<String>,
    pub data: Option<Json<Value>>,
    pub is_read: bool,
    pub is_resolved: bool,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertListFilter {
    #[serde(default)]
    pub unresolved: Option<bool>,
    #[serde(default)]
    pub severity: Option<AlertSeverity>,
    #[serde(default)]
    pub company_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolveAlertRequest {
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckVatRequest {
    pub vat_number: String,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// Summary of one verification job run
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerificationRunReport {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub checked: usize,
    pub alerts_created: usize,
    pub errors: usize,
    pub details: Vec<CompanyRunDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompanyRunDetail {
    pub company_id: Uuid,
    pub company_name: String,
    pub success: bool,
    pub new_score: Option<i32>,
    pub alerts: Vec<String>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliability_levels_follow_thresholds() {
        assert_eq!(ReliabilityLevel::from_score(100), ReliabilityLevel::High);
        assert_eq!(ReliabilityLevel::from_score(80), ReliabilityLevel::High);
        assert_eq!(ReliabilityLevel::from_score(79), ReliabilityLevel::Medium);
        assert_eq!(ReliabilityLevel::from_score(50), ReliabilityLevel::Medium);
        assert_eq!(ReliabilityLevel::from_score(20), ReliabilityLevel::Low);
        assert_eq!(ReliabilityLevel::from_score(19), ReliabilityLevel::Critical);
    }

    #[test]
    fn report_survives_json_storage() {
        let report = VerificationReport {
            company_name: "Muster GmbH".into(),
            reliability_score: 64,
            reliability_level: ReliabilityLevel::Medium,
            alerts: vec![ReportAlert {
                kind: AlertKind::DomainNew,
                message: "Domain is new".into(),
                severity: AlertSeverity::Warning,
            }],
            ..Default::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["alerts"][0]["type"], "domain_new");
        assert_eq!(json["reliability_level"], "medium");
        let back: VerificationReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn hr_number_display() {
        let hr = HrNumber {
            register_type: "HRB".into(),
            number: "123456".into(),
            suffix: Some("B".into()),
        };
        assert_eq!(hr.to_string(), "HRB 123456 B");
    }
}
