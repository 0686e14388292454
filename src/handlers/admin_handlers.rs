use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth_middleware::AdminUser;
use crate::error::{AppError, AppResult};
use crate::models::User;
use crate::AppState;

#[derive(Deserialize)]
pub struct AdminLoginBody {
    pub phone_number: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct AdminLoginResponse {
    pub token: String,
}

/// Shares the phone/code flow with regular users (§C1 User has no
/// password of its own); an admin is just a User with `is_admin` set, so
/// the only extra step here is checking that flag before minting the token.
pub async fn login(State(state): State<Arc<AppState>>, Json(body): Json<AdminLoginBody>) -> AppResult<Json<AdminLoginResponse>> {
    let user = state
        .users
        .find_by_phone_number(&body.phone_number)?
        .ok_or_else(|| AppError::Auth("unknown phone number".to_string()))?;

    if !state.auth_codes.verify_and_consume(user.id, &body.code)? {
        return Err(AppError::Auth("invalid or expired code".to_string()));
    }
    if !user.is_admin {
        return Err(AppError::Auth("admin access required".to_string()));
    }

    let token = crate::jwt::issue_admin_token(user.id, &state.config.admin_jwt_secret, state.config.admin_jwt_ttl)?;
    Ok(Json(AdminLoginResponse { token }))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    50
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.users.list(q.limit, q.offset)?))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> AppResult<Json<User>> {
    state.users.find_by_id(id)?.ok_or(AppError::NotFound).map(Json)
}

#[derive(Deserialize)]
pub struct UpdateUserBody {
    pub is_active: Option<bool>,
    pub is_admin: Option<bool>,
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i32>,
    Json(body): Json<UpdateUserBody>,
) -> AppResult<Json<User>> {
    if let Some(is_active) = body.is_active {
        state.users.set_active(id, is_active)?;
    }
    if let Some(is_admin) = body.is_admin {
        state.users.set_admin(id, is_admin)?;
    }
    state.users.find_by_id(id)?.ok_or(AppError::NotFound).map(Json)
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
    Path(id): Path<i32>,
) -> AppResult<axum::http::StatusCode> {
    state.users.delete(id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
