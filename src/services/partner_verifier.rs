//! Combined partner verification: VAT, WHOIS and the German register.
//!
//! Lookups run through the individual checkers; [`build_report`] turns their
//! results into a weighted reliability score, alerts and the changes since
//! the previous run.

use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::verification::{
    AlertKind, AlertSeverity, DetectedChange, HrCheckResult, ReliabilityLevel, ReportAlert,
    VatCheckResult, VerificationInput, VerificationReport, WhoisResult,
};
use crate::services::handelsregister::HandelsregisterChecker;
use crate::services::vat::VatChecker;
use crate::services::whois::{compare_registrant, WhoisChecker};

pub const VAT_WEIGHT: i32 = 40;
pub const WHOIS_WEIGHT: i32 = 30;
pub const HR_WEIGHT: i32 = 30;

/// Points a score may fall between runs before an alert is raised.
pub const MAX_SCORE_DROP: i32 = 20;

/// Domains younger than this are flagged.
const NEW_DOMAIN_DAYS: i64 = 90;
const EXPIRED_DOMAIN_PENALTY: i32 = 30;

pub fn is_german(country_code: Option<&str>, vat_number: Option<&str>) -> bool {
    country_code.map_or(false, |c| c.trim().eq_ignore_ascii_case("DE"))
        || vat_number.map_or(false, |v| v.trim().to_uppercase().starts_with("DE"))
}

fn alert(kind: AlertKind, severity: AlertSeverity, message: impl Into<String>) -> ReportAlert {
    ReportAlert {
        kind,
        message: message.into(),
        severity,
    }
}

fn lookup_failed(check: &str, error: Option<&str>) -> ReportAlert {
    alert(
        AlertKind::VerificationFailed,
        AlertSeverity::Warning,
        format!("{} check failed: {}", check, error.unwrap_or("no response")),
    )
}

/// Assemble the report from whichever checks ran.
pub fn build_report(
    input: &VerificationInput,
    vat: Option<VatCheckResult>,
    whois: Option<WhoisResult>,
    hr: Option<HrCheckResult>,
    previous: Option<&VerificationReport>,
) -> VerificationReport {
    let german = is_german(input.country_code.as_deref(), input.vat_number.as_deref());
    let mut report = VerificationReport {
        company_name: input.company_name.clone(),
        verified_at: Some(Utc::now()),
        is_german: german,
        ..Default::default()
    };
    // (score, weight) of every check that ran
    let mut scored: Vec<(i32, i32)> = Vec::new();

    // A check that never reached its registry raises an alert and is left
    // out of the score.
    match &vat {
        Some(vat) if vat.lookup_failed => {
            report.alerts.push(lookup_failed("VAT", vat.error.as_deref()))
        }
        Some(vat) if vat.valid => {
            scored.push((100, VAT_WEIGHT));
            if let Some(prev) = previous.and_then(|p| p.vat_result.as_ref()) {
                if prev.name != vat.name {
                    report.changes.push(DetectedChange {
                        kind: "vat_name_changed".to_string(),
                        old: prev.name.clone(),
                        new: vat.name.clone(),
                    });
                    report.alerts.push(alert(
                        AlertKind::VatChanged,
                        AlertSeverity::Warning,
                        "Company name registered for the VAT number has changed",
                    ));
                }
            }
        }
        Some(vat) => {
            scored.push((0, VAT_WEIGHT));
            report.alerts.push(alert(
                AlertKind::VatInvalid,
                AlertSeverity::Critical,
                format!(
                    "VAT number is invalid: {}",
                    vat.error.as_deref().unwrap_or("unknown reason")
                ),
            ));
            report.recommendations.push("Check the VAT number".to_string());
        }
        None => report
            .recommendations
            .push("Ask the partner for a VAT number".to_string()),
    }

    match &whois {
        Some(whois) if whois.lookup_failed => {
            report.alerts.push(lookup_failed("WHOIS", whois.error.as_deref()))
        }
        Some(whois) if whois.valid => {
            let mut score = whois.reliability_score;
            if whois.is_expired {
                report.alerts.push(alert(
                    AlertKind::DomainExpired,
                    AlertSeverity::Critical,
                    "Company domain has expired",
                ));
                score = (score - EXPIRED_DOMAIN_PENALTY).max(0);
            }
            if whois.age_days.map_or(false, |age| age < NEW_DOMAIN_DAYS) {
                report.alerts.push(alert(
                    AlertKind::DomainNew,
                    AlertSeverity::Warning,
                    format!("Domain is new (< {} days)", NEW_DOMAIN_DAYS),
                ));
            }
            if let Some(prev) = previous.and_then(|p| p.whois_result.as_ref()) {
                if let (Some(old), Some(new)) = (prev.registrant(), whois.registrant()) {
                    if old != new {
                        report.changes.push(DetectedChange {
                            kind: "whois_owner_changed".to_string(),
                            old: Some(old.to_string()),
                            new: Some(new.to_string()),
                        });
                        report.alerts.push(alert(
                            AlertKind::DomainOwnerChanged,
                            AlertSeverity::Critical,
                            "Domain owner has changed",
                        ));
                    }
                }
            }
            let registrant =
                compare_registrant(whois, &input.company_name, input.country_code.as_deref());
            if whois.registrant().is_some() && !registrant.matches {
                report
                    .recommendations
                    .push("Domain registrant differs from the company, confirm ownership".to_string());
            }
            report.registrant_match = Some(registrant);
            scored.push((score, WHOIS_WEIGHT));
        }
        Some(_) => {
            scored.push((0, WHOIS_WEIGHT));
            report
                .recommendations
                .push("Check the company domain".to_string());
        }
        None => report
            .recommendations
            .push("Ask the partner for the company website".to_string()),
    }

    if german {
        match &hr {
            Some(hr) if hr.valid => scored.push((hr.reliability_score, HR_WEIGHT)),
            Some(_) => {
                scored.push((0, HR_WEIGHT));
                if input.hr_number.as_deref().map_or(false, |h| !h.trim().is_empty()) {
                    report.alerts.push(alert(
                        AlertKind::HrNotFound,
                        AlertSeverity::Warning,
                        "Handelsregister number could not be confirmed",
                    ));
                } else {
                    report.recommendations.push(
                        "German companies should provide a Handelsregister number".to_string(),
                    );
                }
            }
            None => {}
        }
        if let Some(hr) = hr.as_ref().filter(|hr| hr.lookup_failed()) {
            report
                .alerts
                .push(lookup_failed("Handelsregister", hr.lookup_error()));
        }
    }

    let total_weight: i32 = scored.iter().map(|(_, w)| w).sum();
    if total_weight > 0 {
        let weighted: i32 = scored.iter().map(|(s, w)| s * w).sum();
        report.reliability_score = weighted / total_weight;
    }
    report.reliability_level = ReliabilityLevel::from_score(report.reliability_score);

    if let Some(prev) = previous {
        if report.reliability_score < prev.reliability_score - MAX_SCORE_DROP {
            report.alerts.push(alert(
                AlertKind::ReliabilityDropped,
                AlertSeverity::Critical,
                format!(
                    "Reliability dropped from {} to {}",
                    prev.reliability_score, report.reliability_score
                ),
            ));
        }
    }

    report.vat_result = vat;
    report.whois_result = whois;
    report.hr_result = if german { hr } else { None };
    report.summary = summary(&report);
    report
}

/// One-line human summary, parts joined by ` | `.
pub fn summary(report: &VerificationReport) -> String {
    let mark = |ok: bool| if ok { "✓" } else { "✗" };
    let mut parts = vec![format!(
        "{} ({}/100)",
        report.reliability_level.label(),
        report.reliability_score
    )];

    if let Some(vat) = &report.vat_result {
        parts.push(format!("VAT: {}", mark(vat.valid)));
    }
    if let Some(whois) = &report.whois_result {
        match whois.age_days {
            Some(age) if whois.valid => parts.push(format!("Domain: ✓ ({} days)", age)),
            _ => parts.push(format!("Domain: {}", mark(whois.valid))),
        }
    }
    if report.is_german {
        if let Some(hr) = &report.hr_result {
            parts.push(format!("HR: {}", mark(hr.valid)));
        }
    }
    let critical = report.critical_alerts();
    if critical > 0 {
        parts.push(format!("{} critical alerts", critical));
    }

    parts.join(" | ")
}

#[derive(Clone)]
pub struct PartnerVerifier {
    vat: VatChecker,
    whois: WhoisChecker,
    hr: HandelsregisterChecker,
}

impl PartnerVerifier {
    pub fn new(vat: VatChecker, whois: WhoisChecker, hr: HandelsregisterChecker) -> Self {
        Self { vat, whois, hr }
    }

    pub fn vat(&self) -> &VatChecker {
        &self.vat
    }

    /// Run every applicable lookup and build the report.
    #[instrument(skip(self, input, previous), fields(company = %input.company_name))]
    pub async fn verify(
        &self,
        input: &VerificationInput,
        previous: Option<&VerificationReport>,
    ) -> VerificationReport {
        let vat_number = input.vat_number.as_deref().filter(|v| !v.trim().is_empty());
        let website = input.website.as_deref().filter(|w| !w.trim().is_empty());
        let german = is_german(input.country_code.as_deref(), vat_number);

        let vat_check = async {
            match vat_number {
                Some(v) => Some(self.vat.check_full(v).await),
                None => None,
            }
        };
        let whois_check = async {
            match website {
                Some(w) => Some(self.whois.check_domain(w).await),
                None => None,
            }
        };
        let hr_check = async {
            if german {
                Some(
                    self.hr
                        .check_company(
                            &input.company_name,
                            input.hr_number.as_deref(),
                            input.city.as_deref(),
                            vat_number,
                        )
                        .await,
                )
            } else {
                None
            }
        };
        let (vat, whois, hr) = tokio::join!(vat_check, whois_check, hr_check);

        let report = build_report(input, vat, whois, hr, previous);
        info!(
            score = report.reliability_score,
            level = %report.reliability_level,
            alerts = report.alerts.len(),
            "Partner verified"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::verification::{HrVerification, RegisterSearchResult};

    fn input() -> VerificationInput {
        VerificationInput {
            company_name: "Muster GmbH".into(),
            vat_number: Some("DE123456789".into()),
            website: Some("muster.de".into()),
            hr_number: Some("HRB 123456 B".into()),
            country_code: Some("DE".into()),
            city: Some("Berlin".into()),
        }
    }

    fn vat(valid: bool, name: &str) -> VatCheckResult {
        VatCheckResult {
            valid,
            country_code: "DE".into(),
            vat_number: "123456789".into(),
            name: Some(name.into()),
            error: (!valid).then(|| "VAT number is invalid".to_string()),
            ..Default::default()
        }
    }

    fn whois(score: i32, age: i64, org: &str) -> WhoisResult {
        WhoisResult {
            valid: true,
            domain: "muster.de".into(),
            age_days: Some(age),
            registrant_org: Some(org.into()),
            reliability_score: score,
            ..Default::default()
        }
    }

    fn hr(valid: bool, score: i32) -> HrCheckResult {
        HrCheckResult {
            valid,
            company_name: "Muster GmbH".into(),
            is_german: true,
            reliability_score: score,
            ..Default::default()
        }
    }

    #[test]
    fn weighted_score_over_checks_that_ran() {
        let r = build_report(
            &input(),
            Some(vat(true, "MUSTER GMBH")),
            Some(whois(70, 1000, "Muster GmbH")),
            Some(hr(true, 80)),
            None,
        );
        // (100*40 + 70*30 + 80*30) / 100
        assert_eq!(r.reliability_score, 85);
        assert_eq!(r.reliability_level, ReliabilityLevel::High);
        assert!(r.alerts.is_empty());
        assert_eq!(r.summary, "High reliability (85/100) | VAT: ✓ | Domain: ✓ (1000 days) | HR: ✓");
    }

    #[test]
    fn non_german_company_skips_register() {
        let mut i = input();
        i.vat_number = Some("ATU12345678".into());
        i.country_code = Some("AT".into());
        let r = build_report(&i, Some(vat(true, "X")), None, Some(hr(false, 0)), None);
        assert!(!r.is_german);
        assert!(r.hr_result.is_none());
        assert_eq!(r.reliability_score, 100);
        assert_eq!(r.recommendations, vec!["Ask the partner for the company website"]);
    }

    #[test]
    fn invalid_vat_and_expired_domain_raise_critical_alerts() {
        let mut w = whois(60, 30, "Muster GmbH");
        w.is_expired = true;
        let r = build_report(&input(), Some(vat(false, "")), Some(w), Some(hr(false, 10)), None);

        let kinds: Vec<AlertKind> = r.alerts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                AlertKind::VatInvalid,
                AlertKind::DomainExpired,
                AlertKind::DomainNew,
                AlertKind::HrNotFound
            ]
        );
        // (0*40 + 30*30 + 0*30) / 100
        assert_eq!(r.reliability_score, 9);
        assert_eq!(r.reliability_level, ReliabilityLevel::Critical);
        assert_eq!(r.critical_alerts(), 2);
        assert!(r.summary.ends_with("2 critical alerts"));
    }

    #[test]
    fn changes_against_previous_run() {
        let previous = build_report(
            &input(),
            Some(vat(true, "MUSTER GMBH")),
            Some(whois(70, 1000, "Muster GmbH")),
            Some(hr(true, 80)),
            None,
        );
        let current = build_report(
            &input(),
            Some(vat(true, "NEUE GMBH")),
            Some(whois(70, 1000, "Someone Else Ltd")),
            Some(hr(false, 0)),
            Some(&previous),
        );

        let changes: Vec<&str> = current.changes.iter().map(|c| c.kind.as_str()).collect();
        assert_eq!(changes, vec!["vat_name_changed", "whois_owner_changed"]);
        assert_eq!(current.changes[1].old.as_deref(), Some("Muster GmbH"));
        // 85 -> 61 is more than a 20 point drop
        assert_eq!(current.reliability_score, 61);
        assert!(current.alerts.iter().any(|a| a.kind == AlertKind::ReliabilityDropped));
        assert!(current.alerts.iter().any(|a| a.kind == AlertKind::DomainOwnerChanged));
    }

    #[test]
    fn foreign_registrant_is_flagged() {
        let r = build_report(&input(), None, Some(whois(70, 1000, "Muster GmbH")), None, None);
        assert!(r.registrant_match.as_ref().map_or(false, |m| m.name_match));
        assert!(r.recommendations.iter().all(|s| !s.contains("registrant")));

        let r = build_report(&input(), None, Some(whois(70, 1000, "Domains Ltd")), None, None);
        assert_eq!(r.registrant_match.map(|m| m.matches), Some(false));
        assert!(r.recommendations.iter().any(|s| s.contains("registrant")));
    }

    #[test]
    fn nothing_to_check() {
        let i = VerificationInput {
            company_name: "Solo".into(),
            ..Default::default()
        };
        let r = build_report(&i, None, None, None, None);
        assert_eq!(r.reliability_score, 0);
        assert_eq!(r.recommendations.len(), 2);
        assert_eq!(r.summary, "Critical reliability (0/100)");
    }

    #[test]
    fn unreachable_registries_raise_verification_failed() {
        let vat = VatCheckResult {
            error: Some("VIES request timed out".into()),
            lookup_failed: true,
            ..Default::default()
        };
        let whois = WhoisResult {
            domain: "muster.de".into(),
            error: Some("Could not fetch WHOIS data".into()),
            lookup_failed: true,
            ..Default::default()
        };
        let mut hr = hr(true, 80);
        hr.hr_verification = Some(HrVerification {
            valid: true,
            online: Some(RegisterSearchResult {
                error: Some("Search error: connection refused".into()),
                lookup_failed: true,
                ..Default::default()
            }),
            ..Default::default()
        });

        let r = build_report(&input(), Some(vat), Some(whois), Some(hr), None);
        let failed: Vec<_> = r
            .alerts
            .iter()
            .filter(|a| a.kind == AlertKind::VerificationFailed)
            .collect();
        assert_eq!(failed.len(), 3);
        assert!(failed.iter().all(|a| a.severity == AlertSeverity::Warning));
        assert_eq!(failed[0].message, "VAT check failed: VIES request timed out");
        assert!(r.alerts.iter().all(|a| a.kind != AlertKind::VatInvalid));
        // only the register check produced a score
        assert_eq!(r.reliability_score, 80);
    }

    #[test]
    fn invalid_vat_is_not_a_lookup_failure() {
        let r = build_report(&input(), Some(vat(false, "X")), None, None, None);
        assert!(r.alerts.iter().any(|a| a.kind == AlertKind::VatInvalid));
        assert!(r.alerts.iter().all(|a| a.kind != AlertKind::VerificationFailed));
    }

    #[test]
    fn german_detection() {
        assert!(is_german(Some("de"), None));
        assert!(is_german(None, Some("de123")));
        assert!(!is_german(Some("AT"), Some("ATU1")));
    }
}
