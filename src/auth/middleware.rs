use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use std::sync::Arc;

use super::AuthContext;
use crate::app::AppState;
use crate::error::ErrorResponse;

/// Extractor that requires authentication
///
/// Example:
/// ```ignore
/// async fn my_orders(auth: RequireAuth) -> impl IntoResponse {
///     format!("orders of {}", auth.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Auth context when a valid token is present; anonymous otherwise.
///
/// A present but invalid token is still rejected so clients notice expiry.
#[derive(Debug, Clone)]
pub struct MaybeAuth(pub Option<AuthContext>);

impl MaybeAuth {
    pub fn is_b2b(&self) -> bool {
        self.0.as_ref().map_or(false, AuthContext::is_b2b)
    }
}

/// Extractor for admin and manager routes
#[derive(Debug, Clone)]
pub struct RequireStaff(pub AuthContext);

impl std::ops::Deref for RequireStaff {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken(String),
    NotStaff,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing authorization token",
            ),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid authorization format",
            ),
            AuthError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or expired token",
            ),
            AuthError::NotStaff => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Staff privileges required",
            ),
        };

        let body = ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            request_id: None,
        };

        (status, Json(body)).into_response()
    }
}

async fn bearer_context(
    parts: &mut Parts,
    state: &Arc<AppState>,
) -> Result<Option<AuthContext>, AuthError> {
    if !parts.headers.contains_key(axum::http::header::AUTHORIZATION) {
        return Ok(None);
    }

    let TypedHeader(Authorization(bearer)) =
        TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .map_err(|_| AuthError::InvalidFormat)?;

    let token = bearer.token();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    let claims = state.tokens.verify(token).map_err(|e| {
        tracing::warn!(error = %e, "JWT verification failed");
        AuthError::InvalidToken(e.to_string())
    })?;

    let context = AuthContext::from_claims(&claims).map_err(|e| {
        tracing::warn!(error = %e, "Failed to build auth context");
        AuthError::InvalidToken(e.to_string())
    })?;

    Ok(Some(context))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        bearer_context(parts, state)
            .await?
            .map(RequireAuth)
            .ok_or(AuthError::MissingToken)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuth(bearer_context(parts, state).await?))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireStaff {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(context) = RequireAuth::from_request_parts(parts, state).await?;

        if !context.is_staff() {
            tracing::warn!(user_id = %context.user_id, "Non-staff user attempted to access admin route");
            return Err(AuthError::NotStaff);
        }

        Ok(RequireStaff(context))
    }
}
