//! EU VAT number checks against the VIES REST API.
//!
//! Lookups never fail the caller: every problem ends up in
//! [`VatCheckResult::error`].

use anyhow::{Context, Result};
use backoff::ExponentialBackoffBuilder;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::config::Settings;
use crate::domain::verification::VatCheckResult;

/// Per-country VAT formats, including the country prefix.
static VAT_PATTERNS: Lazy<HashMap<&'static str, Regex>> = Lazy::new(|| {
    [
        ("AT", r"^ATU\d{8}$"),
        ("BE", r"^BE0?\d{9,10}$"),
        ("BG", r"^BG\d{9,10}$"),
        ("CY", r"^CY\d{8}[A-Z]$"),
        ("CZ", r"^CZ\d{8,10}$"),
        ("DE", r"^DE\d{9}$"),
        ("DK", r"^DK\d{8}$"),
        ("EE", r"^EE\d{9}$"),
        ("EL", r"^EL\d{9}$"),
        ("ES", r"^ES[A-Z0-9]\d{7}[A-Z0-9]$"),
        ("FI", r"^FI\d{8}$"),
        ("FR", r"^FR[A-Z0-9]{2}\d{9}$"),
        ("HR", r"^HR\d{11}$"),
        ("HU", r"^HU\d{8}$"),
        ("IE", r"^IE\d{7}[A-Z]{1,2}$"),
        ("IT", r"^IT\d{11}$"),
        ("LT", r"^LT(\d{9}|\d{12})$"),
        ("LU", r"^LU\d{8}$"),
        ("LV", r"^LV\d{11}$"),
        ("MT", r"^MT\d{8}$"),
        ("NL", r"^NL\d{9}B\d{2}$"),
        ("PL", r"^PL\d{10}$"),
        ("PT", r"^PT\d{9}$"),
        ("RO", r"^RO\d{2,10}$"),
        ("SE", r"^SE\d{12}$"),
        ("SI", r"^SI\d{8}$"),
        ("SK", r"^SK\d{10}$"),
        ("XI", r"^XI\d{9}$"),
    ]
    .into_iter()
    .filter_map(|(country, pattern)| Regex::new(pattern).ok().map(|re| (country, re)))
    .collect()
});

pub fn is_vies_country(country: &str) -> bool {
    VAT_PATTERNS.contains_key(country)
}

fn clean_vat(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.'))
        .collect::<String>()
        .to_uppercase()
}

/// Split `DE 123-456.789` into `("DE", "123456789")`; the country is empty
/// when the number has no known prefix.
pub fn parse_vat_number(raw: &str) -> (String, String) {
    let vat = clean_vat(raw);
    match vat.get(..2) {
        Some(prefix) if is_vies_country(prefix) => (prefix.to_string(), vat[2..].to_string()),
        _ => (String::new(), vat),
    }
}

/// Format check for a number without its country prefix.
pub fn validate_format(country: &str, number: &str) -> bool {
    VAT_PATTERNS
        .get(country)
        .map_or(false, |re| re.is_match(&format!("{}{}", country, number)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ViesResponse {
    #[serde(default)]
    is_valid: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    address: Option<String>,
}

/// VIES publishes `---` when a member state withholds the value.
fn published(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "---")
}

enum Attempt {
    Done(ViesResponse),
    Status(StatusCode),
}

#[derive(Clone)]
pub struct VatChecker {
    client: Client,
    api_url: String,
    enabled: bool,
}

impl VatChecker {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: settings.vies_api_url.trim_end_matches('/').to_string(),
            enabled: settings.vat_check_enabled,
        })
    }

    /// Check a number, using `country_code` when given, else its prefix.
    pub async fn check_with_country(&self, vat_number: &str, country_code: Option<&str>) -> VatCheckResult {
        match country_code.map(str::trim).filter(|c| !c.is_empty()) {
            Some(country) => self.check(country, vat_number).await,
            None => self.check_full(vat_number).await,
        }
    }

    /// Check a number that carries its country prefix.
    pub async fn check_full(&self, full_vat_number: &str) -> VatCheckResult {
        let (country, number) = parse_vat_number(full_vat_number);
        if country.is_empty() {
            return VatCheckResult {
                vat_number: full_vat_number.to_string(),
                request_date: Some(Utc::now()),
                error: Some("Could not determine the country from the VAT number".to_string()),
                ..Default::default()
            };
        }
        self.check(&country, &number).await
    }

    #[instrument(skip(self))]
    pub async fn check(&self, country_code: &str, vat_number: &str) -> VatCheckResult {
        let country = country_code.trim().to_uppercase();
        let mut number = clean_vat(vat_number);
        if number.starts_with(&country) {
            number = number[country.len()..].to_string();
        }

        let mut result = VatCheckResult {
            country_code: country.clone(),
            vat_number: number.clone(),
            request_date: Some(Utc::now()),
            ..Default::default()
        };

        if !is_vies_country(&country) {
            result.error = Some(format!("Country {} is not supported by VIES", country));
            return result;
        }
        if !validate_format(&country, &number) {
            result.error = Some("Invalid VAT number format".to_string());
            return result;
        }
        if !self.enabled {
            result.error = Some("VAT checking is disabled".to_string());
            return result;
        }

        match self.query(&country, &number).await {
            Ok(Attempt::Done(data)) => {
                result.valid = data.is_valid;
                result.name = published(data.name);
                result.address = published(data.address);
                if !result.valid {
                    result.error = Some("VAT number is invalid".to_string());
                }
            }
            Ok(Attempt::Status(StatusCode::BAD_REQUEST)) => {
                result.error = Some("Invalid VAT number format".to_string());
            }
            Ok(Attempt::Status(StatusCode::NOT_FOUND)) => {
                result.error = Some("VAT number not found".to_string());
            }
            Ok(Attempt::Status(status)) => {
                result.error = Some(format!("VIES API error: {}", status.as_u16()));
                result.lookup_failed = status.is_server_error();
            }
            Err(e) if e.is_timeout() => {
                result.error = Some("VIES request timed out".to_string());
                result.lookup_failed = true;
            }
            Err(e) => {
                result.error = Some(format!("Connection error: {}", e));
                result.lookup_failed = true;
            }
        }

        debug!(country = %country, valid = result.valid, "VIES check finished");
        result
    }

    /// GET the VIES record, retrying connection failures and 5xx answers.
    async fn query(&self, country: &str, number: &str) -> Result<Attempt, reqwest::Error> {
        let url = format!("{}/{}/vat/{}", self.api_url, country, number);
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_max_elapsed_time(Some(Duration::from_secs(10)))
            .build();

        backoff::future::retry(policy, || async {
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) if e.is_connect() => {
                    warn!(error = %e, "VIES connection failed, retrying");
                    return Err(backoff::Error::transient(e));
                }
                Err(e) => return Err(backoff::Error::permanent(e)),
            };

            let status = response.status();
            if status == StatusCode::OK {
                return match response.json::<ViesResponse>().await {
                    Ok(data) => Ok(Attempt::Done(data)),
                    Err(e) => Err(backoff::Error::permanent(e)),
                };
            }
            if status.is_server_error() {
                warn!(status = %status, "VIES unavailable, retrying");
                if let Err(e) = response.error_for_status() {
                    return Err(backoff::Error::transient(e));
                }
            }
            Ok(Attempt::Status(status))
        })
        .await
        .or_else(|e: reqwest::Error| match e.status() {
            Some(status) => Ok(Attempt::Status(status)),
            None => Err(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_country_prefix() {
        assert_eq!(parse_vat_number("de 123-456.789"), ("DE".into(), "123456789".into()));
        assert_eq!(parse_vat_number("123456789"), (String::new(), "123456789".into()));
        assert_eq!(parse_vat_number("US123"), (String::new(), "US123".into()));
    }

    #[test]
    fn formats_per_country() {
        assert!(validate_format("DE", "123456789"));
        assert!(!validate_format("DE", "12345678"));
        assert!(validate_format("AT", "U12345678"));
        assert!(validate_format("NL", "123456789B01"));
        assert!(validate_format("LT", "123456789012"));
        assert!(!validate_format("US", "123456789"));
    }

    #[test]
    fn withheld_values_are_dropped() {
        assert_eq!(published(Some("---".into())), None);
        assert_eq!(published(Some(" ACME GmbH ".into())), Some("ACME GmbH".into()));
    }

    #[tokio::test]
    async fn unsupported_country_and_bad_format_skip_network() {
        let checker = VatChecker::new(&Settings::for_tests()).unwrap();

        let r = checker.check("US", "123456789").await;
        assert!(!r.valid);
        assert_eq!(r.error.as_deref(), Some("Country US is not supported by VIES"));

        let r = checker.check("de", "DE 1234").await;
        assert_eq!(r.vat_number, "1234");
        assert_eq!(r.error.as_deref(), Some("Invalid VAT number format"));

        let r = checker.check_full("123456789").await;
        assert!(r.error.unwrap().contains("country"));
    }

    #[tokio::test]
    async fn disabled_checker_reports_instead_of_calling() {
        let checker = VatChecker::new(&Settings::for_tests()).unwrap();
        let r = checker.check_with_country("DE123456789", None).await;
        assert_eq!(r.country_code, "DE");
        assert_eq!(r.error.as_deref(), Some("VAT checking is disabled"));
    }
}
