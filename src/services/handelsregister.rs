//! German commercial register (Handelsregister) checks.
//!
//! The official register has no public API, so a register number is scored
//! on its format, the court derived from the company's city and the legal
//! form in the name, plus an optional hit on a public company search page.

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::domain::verification::{HrCheckResult, HrNumber, HrVerification, RegisterSearchResult};

/// Minimum format score for a register number to count as valid.
pub const HR_VALID_THRESHOLD: i32 = 30;

/// Legal forms, multi-word ones first.
const COMPANY_TYPES: &[(&str, &str)] = &[
    ("GmbH & Co. KG", "GmbH & Compagnie Kommanditgesellschaft"),
    ("GmbH", "Gesellschaft mit beschränkter Haftung"),
    ("OHG", "Offene Handelsgesellschaft"),
    ("e.K.", "eingetragener Kaufmann"),
    ("AG", "Aktiengesellschaft"),
    ("KG", "Kommanditgesellschaft"),
    ("UG", "Unternehmergesellschaft (haftungsbeschränkt)"),
    ("eG", "eingetragene Genossenschaft"),
    ("SE", "Societas Europaea"),
];

/// City fragment to register court (Amtsgericht).
const COURTS: &[(&str, &str)] = &[
    ("berlin", "Berlin (Charlottenburg)"),
    ("munich", "München"),
    ("münchen", "München"),
    ("hamburg", "Hamburg"),
    ("frankfurt", "Frankfurt am Main"),
    ("cologne", "Köln"),
    ("köln", "Köln"),
    ("dusseldorf", "Düsseldorf"),
    ("düsseldorf", "Düsseldorf"),
    ("stuttgart", "Stuttgart"),
    ("hannover", "Hannover"),
    ("leipzig", "Leipzig"),
    ("dresden", "Dresden"),
    ("nuremberg", "Nürnberg"),
    ("nürnberg", "Nürnberg"),
    ("essen", "Essen"),
    ("dortmund", "Dortmund"),
    ("bremen", "Bremen"),
    ("bonn", "Bonn"),
];

static HR_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^(HR[AB])\s*(\d+)\s*([A-Z])?$",
        r"^(HR[AB])\s*(\d+)\s+([A-Z])\s*\(",
        r"^()(\d+)\s*([A-Z])?$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse `HRB 123456 B`, `HRA12345`, `HRB 1234 B (Amtsgericht ...)` or a
/// bare number (assumed HRB).
pub fn parse_hr_number(input: &str) -> Option<HrNumber> {
    let hr = collapse_whitespace(&input.to_uppercase());
    if hr.is_empty() {
        return None;
    }

    HR_PATTERNS.iter().find_map(|re| {
        let caps = re.captures(&hr)?;
        let register_type = caps
            .get(1)
            .map(|m| m.as_str())
            .filter(|t| !t.is_empty())
            .unwrap_or("HRB");
        Some(HrNumber {
            register_type: register_type.to_string(),
            number: caps.get(2)?.as_str().to_string(),
            suffix: caps.get(3).map(|m| m.as_str().to_string()),
        })
    })
}

/// Legal form abbreviation found as a whole word in the company name.
pub fn detect_company_type(company_name: &str) -> Option<&'static str> {
    let upper = collapse_whitespace(&company_name.to_uppercase());
    let tokens: Vec<&str> = upper
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')'))
        .filter(|t| !t.is_empty())
        .collect();

    COMPANY_TYPES.iter().map(|(abbr, _)| *abbr).find(|abbr| {
        let wanted = abbr.to_uppercase();
        if wanted.contains(' ') {
            upper.contains(&wanted) || upper.contains(&wanted.replace(". ", " "))
        } else {
            tokens.iter().any(|t| *t == wanted)
        }
    })
}

pub fn company_type_name(abbr: &str) -> Option<&'static str> {
    COMPANY_TYPES
        .iter()
        .find(|(a, _)| *a == abbr)
        .map(|(_, full)| *full)
}

pub fn court_for_city(city: &str) -> Option<&'static str> {
    let city = city.to_lowercase();
    COURTS
        .iter()
        .find(|(key, _)| city.contains(key))
        .map(|(_, court)| *court)
}

/// Format score for a parsed number.
pub fn score_hr_number(
    parsed: &HrNumber,
    court: Option<&str>,
    company_type: Option<&str>,
    online_found: Option<bool>,
) -> (i32, Vec<String>) {
    let mut warnings = Vec::new();
    // parsed format 20, known register type 10
    let mut score = 20 + 10;

    if parsed.number.len() >= 4 {
        score += 15;
    } else {
        warnings.push("Short register number".to_string());
    }
    if parsed.suffix.is_some() {
        score += 5;
    }
    if court.is_some() {
        score += 15;
    } else {
        warnings.push("Registration court (Amtsgericht) is not known".to_string());
    }
    if company_type.is_some() {
        score += 15;
    } else {
        warnings.push("Legal form could not be determined".to_string());
    }
    match online_found {
        Some(true) => score += 20,
        Some(false) => warnings.push("Company not found in public sources".to_string()),
        None => {}
    }

    (score.min(100), warnings)
}

/// Count of `div.result` entries and the text of the first one.
pub fn parse_search_results(html: &str) -> (usize, Option<String>) {
    let Ok(selector) = Selector::parse("div.result") else {
        return (0, None);
    };
    let document = Html::parse_document(html);
    let results: Vec<_> = document.select(&selector).collect();
    let first = results.first().map(|el| {
        let text = el
            .text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        text.chars().take(200).collect()
    });
    (results.len(), first)
}

#[derive(Clone)]
pub struct HandelsregisterChecker {
    client: Client,
    search_url: String,
    online_search: bool,
}

impl HandelsregisterChecker {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (compatible; SmartShop partner check)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            search_url: settings.handelsregister_search_url.clone(),
            online_search: settings.handelsregister_online_search,
        })
    }

    /// Search a public company directory by name.
    #[instrument(skip(self))]
    pub async fn search_company_online(&self, company_name: &str) -> RegisterSearchResult {
        let mut result = RegisterSearchResult::default();

        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", company_name)])
            .header("Accept-Language", "de-DE,de;q=0.9,en;q=0.8")
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(html) => {
                    let (count, first) = parse_search_results(&html);
                    result.found = count > 0;
                    result.results_count = count;
                    result.first_result = first;
                    if result.found {
                        result.source = Some("northdata".to_string());
                    }
                }
                Err(e) => {
                    result.error = Some(format!("Search error: {}", e));
                    result.lookup_failed = true;
                }
            },
            Ok(resp) => {
                debug!(status = %resp.status(), "Register search returned no page");
            }
            Err(e) => {
                warn!(error = %e, "Register search failed");
                result.error = Some(format!("Search error: {}", e));
                result.lookup_failed = true;
            }
        }
        result
    }

    pub async fn verify_hr_number(
        &self,
        hr_number: &str,
        company_name: Option<&str>,
        court: Option<&str>,
    ) -> HrVerification {
        let mut result = HrVerification {
            hr_number: hr_number.to_string(),
            court: court.map(str::to_string),
            status: "unknown".to_string(),
            ..Default::default()
        };

        let Some(parsed) = parse_hr_number(hr_number) else {
            result.error = Some("Invalid Handelsregister number format".to_string());
            result
                .warnings
                .push("Expected format: HRB 123456 or HRA 123456".to_string());
            return result;
        };

        result.hr_number = parsed.to_string();
        result.company_type = company_name
            .and_then(detect_company_type)
            .map(str::to_string);

        let online = match company_name {
            Some(name) if self.online_search => Some(self.search_company_online(name).await),
            _ => None,
        };
        let (score, warnings) = score_hr_number(
            &parsed,
            court,
            result.company_type.as_deref(),
            online.as_ref().map(|o| o.found),
        );

        if online.as_ref().map_or(false, |o| o.found) {
            result.status = "found".to_string();
        }
        result.parsed = Some(parsed);
        result.online = online;
        result.reliability_score = score;
        result.warnings = warnings;
        result.valid = score >= HR_VALID_THRESHOLD;
        if result.valid {
            result.status = "verified_format".to_string();
        }
        result
    }

    /// Full check of a (possibly) German company.
    #[instrument(skip(self))]
    pub async fn check_company(
        &self,
        company_name: &str,
        hr_number: Option<&str>,
        city: Option<&str>,
        vat_number: Option<&str>,
    ) -> HrCheckResult {
        let company_type = detect_company_type(company_name);
        let is_german = company_type.is_some()
            || vat_number.map_or(false, |v| v.trim().to_uppercase().starts_with("DE"));

        let mut result = HrCheckResult {
            company_name: company_name.to_string(),
            is_german,
            company_type: company_type.map(str::to_string),
            legal_form: company_type.and_then(company_type_name).map(str::to_string),
            checked_at: Some(Utc::now()),
            ..Default::default()
        };

        match hr_number.map(str::trim).filter(|h| !h.is_empty()) {
            Some(hr) => {
                let court = city.and_then(court_for_city);
                let verification = self.verify_hr_number(hr, Some(company_name), court).await;
                result.reliability_score = verification.reliability_score;
                result.valid = verification.valid;
                result.hr_verification = Some(verification);
            }
            None => {
                result.recommendations.push(
                    "Provide a Handelsregister number for full verification".to_string(),
                );
                if is_german {
                    result.reliability_score = 20;
                    result.recommendations.push(
                        "Company looks German but no register number was given".to_string(),
                    );
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_numbers() {
        let hr = parse_hr_number("hrb 123456 b").unwrap();
        assert_eq!(hr.to_string(), "HRB 123456 B");
        assert_eq!(parse_hr_number("HRA12345").unwrap().register_type, "HRA");
        let with_court = parse_hr_number("HRB 98765 B (Amtsgericht Berlin)").unwrap();
        assert_eq!(with_court.suffix.as_deref(), Some("B"));
        let bare = parse_hr_number("  4711 ").unwrap();
        assert_eq!((bare.register_type.as_str(), bare.number.as_str()), ("HRB", "4711"));
        assert!(parse_hr_number("XYZ 123").is_none());
        assert!(parse_hr_number("").is_none());
    }

    #[test]
    fn detects_legal_form_by_whole_word() {
        assert_eq!(detect_company_type("Muster GmbH & Co. KG"), Some("GmbH & Co. KG"));
        assert_eq!(detect_company_type("Muster GmbH"), Some("GmbH"));
        assert_eq!(detect_company_type("Siemens AG"), Some("AG"));
        assert_eq!(detect_company_type("Start UG (haftungsbeschränkt)"), Some("UG"));
        assert_eq!(detect_company_type("Hans Meier e.K."), Some("e.K."));
        // "AG" inside a word is not a legal form
        assert_eq!(detect_company_type("Agrarhandel Nord"), None);
        assert_eq!(company_type_name("AG"), Some("Aktiengesellschaft"));
    }

    #[test]
    fn courts_from_city() {
        assert_eq!(court_for_city("Berlin-Mitte"), Some("Berlin (Charlottenburg)"));
        assert_eq!(court_for_city("München"), Some("München"));
        assert_eq!(court_for_city("Frankfurt"), Some("Frankfurt am Main"));
        assert_eq!(court_for_city("Kyiv"), None);
    }

    #[test]
    fn format_score() {
        let hr = parse_hr_number("HRB 123456 B").unwrap();
        let (score, warnings) = score_hr_number(&hr, Some("Berlin"), Some("GmbH"), Some(true));
        assert_eq!(score, 100);
        assert!(warnings.is_empty());

        let short = parse_hr_number("HRA 12").unwrap();
        let (score, warnings) = score_hr_number(&short, None, None, None);
        assert_eq!(score, 30);
        assert_eq!(warnings.len(), 3);
    }

    #[test]
    fn search_page_parsing() {
        let html = r#"<html><body>
            <div class="result"><a>Muster GmbH</a> <span>Berlin HRB 123456</span></div>
            <div class="result">Other</div>
            <div class="ad">x</div></body></html>"#;
        let (count, first) = parse_search_results(html);
        assert_eq!(count, 2);
        assert_eq!(first.as_deref(), Some("Muster GmbH Berlin HRB 123456"));
        assert_eq!(parse_search_results("<p>nothing</p>"), (0, None));
    }

    #[tokio::test]
    async fn check_without_register_number() {
        let checker = HandelsregisterChecker::new(&Settings::for_tests()).unwrap();
        let r = checker.check_company("Muster GmbH", None, Some("Berlin"), None).await;
        assert!(r.is_german);
        assert_eq!(r.reliability_score, 20);
        assert_eq!(r.recommendations.len(), 2);

        let r = checker
            .check_company("Muster GmbH", Some("HRB 123456 B"), Some("Berlin"), None)
            .await;
        let v = r.hr_verification.unwrap();
        assert!(v.valid);
        assert_eq!(v.status, "verified_format");
        assert_eq!(v.reliability_score, 80);
    }
}
