use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use log::debug;

use crate::error::AppError;
use crate::models::user::User;
use crate::State;

/// The active user behind the request's bearer token.
pub struct CurrentUser(pub User);

fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| AppError::Unauthenticated("missing Authorization header".to_string()))?;
    let value = header
        .to_str()
        .map_err(|_| AppError::Unauthenticated("invalid Authorization header".to_string()))?;
    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthenticated("invalid token format".to_string()))
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let state = parts
            .extensions
            .get::<State>()
            .cloned()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("state extension missing")))?;

        let token = bearer_token(&parts.headers)?;
        let claims = state.jwt.verify_token(token)?;
        let user = state
            .store
            .get_user(&claims.sub)?
            .ok_or_else(|| AppError::Unauthenticated("unknown user".to_string()))?;

        if !user.is_active {
            debug!("rejecting inactive user {}", user.email);
            return Err(AppError::Forbidden("Inactive user".to_string()));
        }

        Ok(CurrentUser(user))
    }
}
