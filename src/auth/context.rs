use uuid::Uuid;

use super::Claims;
use crate::domain::accounts::UserRole;
use crate::domain::parse_text;

/// Authenticated user context extracted from JWT
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (from JWT sub claim)
    pub user_id: Uuid,

    pub email: String,

    pub role: UserRole,

    pub company_id: Option<Uuid>,
}

impl AuthContext {
    pub fn from_claims(claims: &Claims) -> Result<Self, &'static str> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token")?;
        let role = parse_text(&claims.role).ok_or("Unknown role in token")?;

        Ok(Self {
            user_id,
            email: claims.email.clone(),
            role,
            company_id: claims.company_id,
        })
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    pub fn is_b2b(&self) -> bool {
        self.role == UserRole::Partner && self.company_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: &str, role: &str, company_id: Option<Uuid>) -> Claims {
        Claims {
            sub: sub.into(),
            aud: "smartshop".into(),
            iss: "smartshop".into(),
            iat: 0,
            exp: 0,
            email: "p@example.com".into(),
            role: role.into(),
            company_id,
        }
    }

    #[test]
    fn partner_with_company_is_b2b() {
        let id = Uuid::new_v4();
        let ctx =
            AuthContext::from_claims(&claims(&id.to_string(), "partner", Some(id)))
                .unwrap();
        assert_eq!(ctx.user_id, id);
        assert!(ctx.is_b2b());
        assert!(!ctx.is_staff());
    }

    #[test]
    fn rejects_malformed_subject_and_role() {
        assert!(AuthContext::from_claims(&claims("nope", "admin", None)).is_err());
        let id = Uuid::new_v4().to_string();
        assert!(AuthContext::from_claims(&claims(&id, "root", None)).is_err());
    }
}
