//! HS256 access tokens for local accounts

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use super::Claims;
use crate::domain::accounts::User;

/// Issues and verifies access tokens
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    ttl_seconds: i64,
}

impl TokenService {
    pub fn new(secret: &str, issuer: String, ttl_seconds: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            ttl_seconds,
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Sign a token for `user`
    pub fn issue(&self, user: &User) -> Result<String> {
        let claims = Claims::for_user(user, &self.issuer, Utc::now().timestamp(), self.ttl_seconds);
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("Failed to sign access token")
    }

    /// Verify a JWT token and return the claims
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.issuer]);
        validation.validate_exp = true;

        let token_data =
            decode::<Claims>(token, &self.decoding, &validation).context("JWT validation failed")?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user() -> User {
        User {
            id: Uuid::new_v4(),
            email: "admin@example.com".into(),
            password_hash: String::new(),
            role: "admin".into(),
            is_active: true,
            is_verified: true,
            first_name: None,
            last_name: None,
            phone: None,
            company_id: None,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let service = TokenService::new("secret", "smartshop".into(), 3600);
        let u = user();
        let token = service.issue(&u).unwrap();
        let claims = service.verify(&token).unwrap();
        assert_eq!(claims.sub, u.id.to_string());
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn foreign_secret_and_expired_tokens_fail() {
        let service = TokenService::new("secret", "smartshop".into(), 3600);
        let other = TokenService::new("other", "smartshop".into(), 3600);
        let token = other.issue(&user()).unwrap();
        assert!(service.verify(&token).is_err());

        let expired = TokenService::new("secret", "smartshop".into(), -600);
        let token = expired.issue(&user()).unwrap();
        assert!(service.verify(&token).is_err());
    }
}
