//! Domain checks over the WHOIS protocol (TCP port 43).
//!
//! The raw answer is parsed with per-field regex lists; the first pattern
//! that matches wins. Status and name server fields collect every match.

use chrono::{NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::domain::verification::{RegistrantMatch, WhoisRecord, WhoisResult};

const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_BYTES: u64 = 256 * 1024;

const NOT_FOUND_MARKERS: &[&str] = &[
    "no match for",
    "not found",
    "no data found",
    "domain not found",
    "no entries found",
    "status: free",
    "status: available",
];

const ACTIVE_STATUSES: &[&str] = &["active", "ok", "clienttransferprohibited"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d-%b-%Y", "%d.%m.%Y", "%Y.%m.%d", "%d/%m/%Y", "%m/%d/%Y"];

fn whois_server(tld: &str) -> Option<&'static str> {
    let server = match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "info" => "whois.afilias.net",
        "biz" => "whois.biz",
        "de" => "whois.denic.de",
        "uk" | "co.uk" => "whois.nic.uk",
        "eu" => "whois.eu",
        "nl" => "whois.domain-registry.nl",
        "fr" => "whois.nic.fr",
        "it" => "whois.nic.it",
        "es" => "whois.nic.es",
        "pl" => "whois.dns.pl",
        "cz" => "whois.nic.cz",
        "at" => "whois.nic.at",
        "ch" => "whois.nic.ch",
        "be" => "whois.dns.be",
        "ua" => "whois.ua",
        "ru" => "whois.tcinet.ru",
        "io" => "whois.nic.io",
        "co" => "whois.nic.co",
        "ai" => "whois.nic.ai",
        _ => return None,
    };
    Some(server)
}

/// Query line in the dialect the server expects.
fn query_line(server: &str, domain: &str) -> String {
    match server {
        "whois.verisign-grs.com" => format!("={}\r\n", domain),
        "whois.denic.de" => format!("-T dn {}\r\n", domain),
        _ => format!("{}\r\n", domain),
    }
}

fn patterns(list: &[&str]) -> Vec<Regex> {
    list.iter()
        .filter_map(|p| Regex::new(&format!(r"(?im){}[ \t]*(.+)$", p)).ok())
        .collect()
}

struct FieldPatterns {
    creation_date: Vec<Regex>,
    expiration_date: Vec<Regex>,
    registrar: Vec<Regex>,
    registrant_name: Vec<Regex>,
    registrant_org: Vec<Regex>,
    registrant_country: Vec<Regex>,
    status: Vec<Regex>,
    name_servers: Vec<Regex>,
}

static FIELDS: Lazy<FieldPatterns> = Lazy::new(|| FieldPatterns {
    creation_date: patterns(&[
        "Creation Date:",
        "Created:",
        "Created On:",
        "Registration Date:",
        "Registered:",
        "Domain Registration Date:",
    ]),
    expiration_date: patterns(&[
        "Expir[a-z]+ Date:",
        "Expiry Date:",
        "Expires:",
        "Expires On:",
        "paid-till:",
        "Registry Expiry Date:",
    ]),
    registrar: patterns(&["Registrar:", "Registrar Name:", "Sponsoring Registrar:"]),
    registrant_name: patterns(&["Registrant Name:", "Registrant:", "Owner:", "holder:"]),
    registrant_org: patterns(&[
        "Registrant Organization:",
        "Registrant Organisation:",
        "Organization:",
        "organisation:",
    ]),
    registrant_country: patterns(&[
        "Registrant Country:",
        "Registrant State/Province:",
        "country:",
    ]),
    status: patterns(&["Domain Status:", "Status:", "state:"]),
    name_servers: patterns(&["Name Server:", "nserver:", "Nameserver:"]),
});

fn first_match(raw: &str, list: &[Regex]) -> Option<String> {
    list.iter().find_map(|re| {
        re.captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

fn all_matches(raw: &str, list: &[Regex]) -> Vec<String> {
    list.iter()
        .map(|re| {
            re.captures_iter(raw)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
        })
        .find(|found| !found.is_empty())
        .unwrap_or_default()
}

/// Pull the known fields out of a raw WHOIS answer.
pub fn parse_whois(raw: &str) -> WhoisRecord {
    let f = &*FIELDS;
    WhoisRecord {
        creation_date: first_match(raw, &f.creation_date),
        expiration_date: first_match(raw, &f.expiration_date),
        registrar: first_match(raw, &f.registrar),
        registrant_name: first_match(raw, &f.registrant_name),
        registrant_org: first_match(raw, &f.registrant_org),
        registrant_country: first_match(raw, &f.registrant_country),
        status: all_matches(raw, &f.status),
        name_servers: all_matches(raw, &f.name_servers),
    }
}

/// Date part of a WHOIS timestamp in any of the common layouts.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let token = value.split_whitespace().next()?;
    let token = match token.get(10..11) {
        Some("T") => &token[..10],
        _ => token,
    };
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(token, fmt).ok())
}

/// Bare lower-case host from a URL or domain, without `www.` or port.
pub fn extract_domain(input: &str) -> String {
    let input = input.trim();
    let host = if input.contains("://") {
        url::Url::parse(input)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default()
    } else {
        input
            .split('/')
            .next()
            .unwrap_or_default()
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string()
    };
    let host = host.to_lowercase();
    host.strip_prefix("www.").map(str::to_string).unwrap_or(host)
}

/// TLD, treating `co.uk`-style second levels as part of it.
pub fn get_tld(domain: &str) -> String {
    let parts: Vec<&str> = domain.split('.').collect();
    match parts.as_slice() {
        [.., second, last] if parts.len() >= 3 && matches!(*second, "co" | "com" | "org" | "net" | "gov") => {
            format!("{}.{}", second, last)
        }
        [_, .., last] => last.to_string(),
        _ => String::new(),
    }
}

fn is_not_found(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m))
}

/// Fill `result` from a raw answer and score it as of `today`.
pub fn evaluate(mut result: WhoisResult, raw: &str, today: NaiveDate) -> WhoisResult {
    if is_not_found(raw) {
        result.error = Some("Domain is not registered".to_string());
        result.warnings.push("Domain does not exist".to_string());
        return result;
    }

    let record = parse_whois(raw);
    result.registrar = record.registrar;
    result.registrant_name = record.registrant_name;
    result.registrant_org = record.registrant_org;
    result.registrant_country = record.registrant_country;
    result.status = record.status;
    result.name_servers = record.name_servers;

    result.creation_date = record.creation_date.as_deref().and_then(parse_date);
    result.age_days = result.creation_date.map(|d| (today - d).num_days());
    result.expiration_date = record.expiration_date.as_deref().and_then(parse_date);
    result.is_expired = result.expiration_date.map_or(false, |d| d < today);

    result.is_active = !result.name_servers.is_empty()
        || result.status.iter().any(|s| {
            let s = s.to_lowercase();
            ACTIVE_STATUSES.iter().any(|a| s.contains(a))
        });
    result.valid = true;

    let (score, warnings) = score(&result);
    result.reliability_score = score;
    result.warnings = warnings;
    result
}

/// Domain reliability (0..=100) with the reasons points were lost.
pub fn score(result: &WhoisResult) -> (i32, Vec<String>) {
    let mut score = 0;
    let mut warnings = Vec::new();

    match result.age_days {
        Some(age) if age > 365 * 5 => score += 40,
        Some(age) if age > 365 * 2 => score += 30,
        Some(age) if age > 365 => score += 20,
        Some(age) if age > 180 => score += 10,
        Some(age) => warnings.push(format!("Domain is young ({} days)", age)),
        None => warnings.push("Could not determine the domain age".to_string()),
    }

    if result.is_active {
        score += 20;
    } else {
        warnings.push("Domain is inactive".to_string());
    }

    if result.is_expired {
        warnings.push("Domain has expired!".to_string());
    } else {
        score += 15;
    }

    if result.registrant().is_some() {
        score += 15;
    } else {
        warnings.push("Owner details are hidden".to_string());
    }

    match result.name_servers.len() {
        0 => {}
        1 => {
            score += 5;
            warnings.push("Only one name server".to_string());
        }
        _ => score += 10,
    }

    (score.min(100), warnings)
}

/// How well the WHOIS registrant matches a company's name and country.
pub fn compare_registrant(
    whois: &WhoisResult,
    company_name: &str,
    country_code: Option<&str>,
) -> RegistrantMatch {
    let mut m = RegistrantMatch::default();
    if !whois.valid {
        m.details = "WHOIS data is not valid".to_string();
        return m;
    }

    let registrant = whois.registrant().unwrap_or_default().to_lowercase();
    let company = company_name.trim().to_lowercase();

    if !registrant.is_empty() && !company.is_empty() {
        if registrant.contains(&company) || company.contains(&registrant) {
            m.name_match = true;
            m.confidence += 50;
        } else {
            let company_words: Vec<&str> = company.split_whitespace().take(3).collect();
            if registrant
                .split_whitespace()
                .take(3)
                .any(|w| company_words.contains(&w))
            {
                m.name_match = true;
                m.confidence += 30;
            }
        }
    }

    if let (Some(code), Some(country)) = (country_code, whois.registrant_country.as_deref()) {
        let whois_country: String = country.trim().to_uppercase().chars().take(2).collect();
        if code.trim().eq_ignore_ascii_case(&whois_country) {
            m.country_match = true;
            m.confidence += 30;
        }
    }

    if whois.age_days.map_or(false, |a| a > 365) {
        m.confidence += 20;
    }

    m.matches = m.name_match || m.country_match;
    m.confidence = m.confidence.min(100);
    m.details = if m.matches {
        "WHOIS data matches the company".to_string()
    } else {
        "WHOIS data does not match the company".to_string()
    };
    m
}

fn decode(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        // latin-1: every byte maps to the code point of the same value
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

#[derive(Clone)]
pub struct WhoisChecker {
    timeout: Duration,
}

impl WhoisChecker {
    pub fn new(timeout_seconds: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    async fn query(&self, server: &str, domain: &str) -> Option<String> {
        let exchange = async {
            let mut stream = TcpStream::connect((server, WHOIS_PORT)).await?;
            stream.write_all(query_line(server, domain).as_bytes()).await?;
            let mut buf = Vec::new();
            stream.take(MAX_RESPONSE_BYTES).read_to_end(&mut buf).await?;
            Ok::<_, std::io::Error>(buf)
        };

        match timeout(self.timeout, exchange).await {
            Ok(Ok(bytes)) if !bytes.is_empty() => Some(decode(&bytes)),
            Ok(Ok(_)) => None,
            Ok(Err(e)) => {
                warn!(server = server, error = %e, "WHOIS query failed");
                None
            }
            Err(_) => {
                warn!(server = server, "WHOIS query timed out");
                None
            }
        }
    }

    /// Look up a domain or website URL.
    #[instrument(skip(self))]
    pub async fn check_domain(&self, domain_or_url: &str) -> WhoisResult {
        let domain = extract_domain(domain_or_url);
        let mut result = WhoisResult {
            tld: get_tld(&domain),
            domain: domain.clone(),
            checked_at: Some(Utc::now()),
            ..Default::default()
        };

        if domain.is_empty() || !domain.contains('.') {
            result.error = Some("Invalid domain format".to_string());
            return result;
        }

        let Some(server) = whois_server(&result.tld) else {
            result.error = Some(format!("No WHOIS server known for .{}", result.tld));
            result.warnings.push("Unknown TLD".to_string());
            return result;
        };

        let Some(raw) = self.query(server, &domain).await else {
            result.error = Some("Could not fetch WHOIS data".to_string());
            result.lookup_failed = true;
            return result;
        };

        let result = evaluate(result, &raw, Utc::now().date_naive());
        debug!(domain = %domain, score = result.reliability_score, "WHOIS check finished");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERISIGN: &str = "   Domain Name: EXAMPLE.COM
   Registrar: Example Registrar, Inc.
   Creation Date: 2015-08-14T04:00:00Z
   Registry Expiry Date: 2030-08-13T04:00:00Z
   Domain Status: clientTransferProhibited https://icann.org/epp
   Domain Status: clientDeleteProhibited https://icann.org/epp
   Registrant Organization: Muster Handel GmbH
   Registrant Country: DE
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn domain_and_tld_extraction() {
        assert_eq!(extract_domain("https://www.Example.de:8443/shop"), "example.de");
        assert_eq!(extract_domain("www.muster.co.uk/about"), "muster.co.uk");
        assert_eq!(get_tld("muster.co.uk"), "co.uk");
        assert_eq!(get_tld("example.de"), "de");
        assert_eq!(get_tld("localhost"), "");
        assert_eq!(whois_server("co.uk"), Some("whois.nic.uk"));
        assert_eq!(query_line("whois.denic.de", "a.de"), "-T dn a.de\r\n");
    }

    #[test]
    fn parses_fields() {
        let record = parse_whois(VERISIGN);
        assert_eq!(record.registrar.as_deref(), Some("Example Registrar, Inc."));
        assert_eq!(record.registrant_org.as_deref(), Some("Muster Handel GmbH"));
        assert_eq!(record.status.len(), 2);
        assert_eq!(record.name_servers, vec!["A.IANA-SERVERS.NET", "B.IANA-SERVERS.NET"]);
    }

    #[test]
    fn date_layouts() {
        let d = NaiveDate::from_ymd_opt(2015, 8, 14).unwrap();
        assert_eq!(parse_date("2015-08-14T04:00:00Z"), Some(d));
        assert_eq!(parse_date("14-Aug-2015"), Some(d));
        assert_eq!(parse_date("14-AUG-2015"), Some(d));
        assert_eq!(parse_date("14.08.2015 10:00"), Some(d));
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn established_domain_scores_full() {
        let r = evaluate(WhoisResult::default(), VERISIGN, today());
        assert!(r.valid);
        assert!(r.is_active);
        assert!(!r.is_expired);
        assert_eq!(r.reliability_score, 100);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn young_hidden_domain_loses_points() {
        let raw = "Creation Date: 2025-05-01\nRegistry Expiry Date: 2026-05-01\nName Server: ns1.example.net\n";
        let r = evaluate(WhoisResult::default(), raw, today());
        assert_eq!(r.age_days, Some(31));
        // active 20 + not expired 15 + one NS 5
        assert_eq!(r.reliability_score, 40);
        assert_eq!(r.warnings.len(), 3);
    }

    #[test]
    fn unregistered_domain() {
        let r = evaluate(WhoisResult::default(), "No match for \"NOPE.COM\".", today());
        assert!(!r.valid);
        assert_eq!(r.error.as_deref(), Some("Domain is not registered"));
    }

    #[test]
    fn registrant_comparison() {
        let r = evaluate(WhoisResult::default(), VERISIGN, today());
        let m = compare_registrant(&r, "Muster Handel GmbH", Some("de"));
        assert!(m.matches && m.name_match && m.country_match);
        assert_eq!(m.confidence, 100);

        let m = compare_registrant(&r, "Other Company", Some("FR"));
        assert!(!m.matches);

        let hidden = WhoisResult { valid: true, ..Default::default() };
        assert!(!compare_registrant(&hidden, "Anything", None).name_match);
    }
}
