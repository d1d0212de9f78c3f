use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::accounts::User;

/// Access token payload. Role and company are copied in so extractors can
/// authorize without a database round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub aud: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub email: String,
    /// `customer`, `partner`, `manager` or `admin`
    pub role: String,
    #[serde(default)]
    pub company_id: Option<Uuid>,
}

impl Claims {
    /// Claims for `user`, valid for `ttl_seconds` from `now`. The issuer is
    /// also the audience since tokens are only read by this service.
    pub fn for_user(user: &User, issuer: &str, now: i64, ttl_seconds: i64) -> Self {
        Self {
            sub: user.id.to_string(),
            aud: issuer.to_string(),
            iss: issuer.to_string(),
            iat: now,
            exp: now + ttl_seconds,
            email: user.email.clone(),
            role: user.role.clone(),
            company_id: user.company_id,
        }
    }
}
