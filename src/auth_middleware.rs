use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::jwt;
use crate::AppState;

/// Extracted from a verified user JWT (`Authorization: Bearer <token>`).
#[derive(Clone, Copy)]
pub struct AuthUser {
    pub user_id: i32,
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = jwt::verify_user_token(token, &state.config.user_jwt_secret)?;
        Ok(AuthUser { user_id: claims.sub })
    }
}

/// Extracted from a verified admin JWT, additionally checking the subject is
/// still flagged `is_admin` (an admin demoted after login loses access on
/// their very next request rather than only at token expiry).
#[derive(Clone, Copy)]
pub struct AdminUser {
    pub user_id: i32,
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        let claims = jwt::verify_admin_token(token, &state.config.admin_jwt_secret)?;
        let user = state.users.find_by_id(claims.sub)?.ok_or(AppError::NotFound)?;
        if !user.is_admin {
            return Err(AppError::Auth("admin access required".to_string()));
        }
        Ok(AdminUser { user_id: claims.sub })
    }
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    parts
        .headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Auth("missing bearer token".to_string()))
}
