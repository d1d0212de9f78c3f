use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    /// JSON log lines instead of the human-readable format.
    pub log_json: bool,
    pub server_addr: String,
    /// Public storefront origin used for redirects and the sitemap.
    pub public_base_url: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Redis
    pub redis_url: String,
    pub redis_cache_ttl_seconds: u64,
    pub cart_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Auth
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_ttl_seconds: i64,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,

    // OpenAI
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_model: String,
    pub openai_image_model: String,
    pub ai_timeout_seconds: u64,

    // Stripe
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,

    // Partner verification
    pub vies_api_url: String,
    pub vat_check_enabled: bool,
    pub whois_timeout_seconds: u64,
    pub handelsregister_search_url: String,
    pub handelsregister_online_search: bool,
    pub verification_interval_hours: u64,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::from_str(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let log_json = flag("LOG_JSON", env.is_prod());
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .trim_end_matches('/')
            .to_string();

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10);

        // Redis
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://redis:6379/0".to_string());
        let redis_cache_ttl_seconds = parse_or("REDIS_CACHE_TTL_SECONDS", 3600);
        let cart_ttl_seconds = parse_or("CART_TTL_SECONDS", 7 * 24 * 3600);

        // CORS
        let cors_allow_origins = env::var("CORS_ALLOW_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        // Auth
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "smartshop".to_string());
        let jwt_ttl_seconds = parse_or("JWT_TTL_SECONDS", 86400);
        let admin_email = optional("ADMIN_EMAIL");
        let admin_password = optional("ADMIN_PASSWORD");

        // OpenAI
        let openai_api_key = optional("OPENAI_API_KEY");
        let openai_base_url = env::var("OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let openai_model = env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let openai_image_model =
            env::var("OPENAI_IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".to_string());
        let ai_timeout_seconds = parse_or("AI_TIMEOUT_SECONDS", 60);

        // Stripe
        let stripe_secret_key = optional("STRIPE_SECRET_KEY");
        let stripe_webhook_secret = optional("STRIPE_WEBHOOK_SECRET");
        let stripe_api_base = env::var("STRIPE_API_BASE")
            .unwrap_or_else(|_| "https://api.stripe.com/v1".to_string());

        // Partner verification
        let vies_api_url = env::var("VIES_API_URL").unwrap_or_else(|_| {
            "https://ec.europa.eu/taxation_customs/vies/rest-api/ms".to_string()
        });
        let vat_check_enabled = flag("VAT_CHECK_ENABLED", true);
        let whois_timeout_seconds = parse_or("WHOIS_TIMEOUT_SECONDS", 10);
        let handelsregister_search_url = env::var("HANDELSREGISTER_SEARCH_URL")
            .unwrap_or_else(|_| "https://www.northdata.com/_search".to_string());
        let handelsregister_online_search = flag("HANDELSREGISTER_ONLINE_SEARCH", true);
        let verification_interval_hours = parse_or("VERIFICATION_INTERVAL_HOURS", 24);

        Ok(Settings {
            env,
            log_json,
            server_addr,
            public_base_url,
            database_url,
            database_max_connections,
            redis_url,
            redis_cache_ttl_seconds,
            cart_ttl_seconds,
            cors_allow_origins,
            jwt_secret,
            jwt_issuer,
            jwt_ttl_seconds,
            admin_email,
            admin_password,
            openai_api_key,
            openai_base_url,
            openai_model,
            openai_image_model,
            ai_timeout_seconds,
            stripe_secret_key,
            stripe_webhook_secret,
            stripe_api_base,
            vies_api_url,
            vat_check_enabled,
            whois_timeout_seconds,
            handelsregister_search_url,
            handelsregister_online_search,
            verification_interval_hours,
        })
    }

    /// Settings suitable for unit tests; no external services configured.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Settings {
            env: Environment::Dev,
            log_json: false,
            server_addr: "127.0.0.1:0".to_string(),
            public_base_url: "https://shop.example".to_string(),
            database_url: "postgres://localhost/smartshop_test".to_string(),
            database_max_connections: 1,
            redis_url: "redis://localhost:6379/0".to_string(),
            redis_cache_ttl_seconds: 60,
            cart_ttl_seconds: 60,
            cors_allow_origins: vec![],
            jwt_secret: "test-secret".to_string(),
            jwt_issuer: "smartshop-test".to_string(),
            jwt_ttl_seconds: 3600,
            admin_email: None,
            admin_password: None,
            openai_api_key: None,
            openai_base_url: "http://localhost:9/v1".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_image_model: "dall-e-3".to_string(),
            ai_timeout_seconds: 1,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: "http://localhost:9/v1".to_string(),
            vies_api_url: "http://localhost:9/vies".to_string(),
            vat_check_enabled: false,
            whois_timeout_seconds: 1,
            handelsregister_search_url: "http://localhost:9/_search".to_string(),
            handelsregister_online_search: false,
            verification_interval_hours: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing_defaults_to_dev() {
        assert_eq!(Environment::from_str("PRODUCTION"), Environment::Prod);
        assert_eq!(Environment::from_str("staging"), Environment::Staging);
        assert_eq!(Environment::from_str("whatever"), Environment::Dev);
        assert!(Environment::Dev.is_dev());
        assert!(Environment::Prod.is_prod());
    }
}
