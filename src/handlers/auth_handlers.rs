use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use governor::Quota;
use serde::{Deserialize, Serialize};

use crate::auth_middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::util::now_unix;
use crate::AppState;

const CODE_TTL_SECS: i64 = 600;

#[derive(Deserialize)]
pub struct RequestCodeBody {
    pub phone_number: String,
}

#[derive(Serialize)]
pub struct RequestCodeResponse {
    pub accepted: bool,
}

/// Issues a fresh auth code and sends it over WhatsApp. Always answers 202
/// regardless of whether the phone number is already registered, so the
/// response can't be used to enumerate users; a request over the 3-per-hour
/// limit gets a plain 429 instead (§8 scenario 5).
pub async fn request_code(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RequestCodeBody>,
) -> AppResult<(StatusCode, Json<RequestCodeResponse>)> {
    if state.request_code_limiter.check_key(&body.phone_number).is_err() {
        return Err(AppError::RateLimited("too many code requests, try again later".to_string()));
    }

    let user = state.users.get_or_create_by_phone(&body.phone_number)?;
    let auth_code = state.auth_codes.create(user.id, CODE_TTL_SECS)?;
    state
        .outbound
        .enqueue(body.phone_number, format!("Your Zapa login code is {}", auth_code.code), None, 10, now_unix())
        .await?;
    Ok((StatusCode::ACCEPTED, Json(RequestCodeResponse { accepted: true })))
}

#[derive(Deserialize)]
pub struct VerifyBody {
    pub phone_number: String,
    pub code: String,
}

#[derive(Serialize)]
pub struct VerifyResponse {
    pub access_token: String,
    pub expires_at: i64,
}

pub async fn verify(State(state): State<Arc<AppState>>, Json(body): Json<VerifyBody>) -> AppResult<Json<VerifyResponse>> {
    let user = state
        .users
        .find_by_phone_number(&body.phone_number)?
        .ok_or_else(|| AppError::Auth("unknown phone number".to_string()))?;

    if !state.auth_codes.verify_and_consume(user.id, &body.code)? {
        return Err(AppError::Auth("invalid or expired code".to_string()));
    }

    let expires_at = now_unix() + state.config.user_jwt_ttl.as_secs() as i64;
    let token = crate::jwt::issue_user_token(user.id, &state.config.user_jwt_secret, state.config.user_jwt_ttl)?;
    Ok(Json(VerifyResponse { access_token: token, expires_at }))
}

pub async fn me(State(state): State<Arc<AppState>>, auth: AuthUser) -> AppResult<Json<crate::models::User>> {
    state.users.find_by_id(auth.user_id)?.ok_or(AppError::NotFound).map(Json)
}

pub fn default_quota() -> Quota {
    Quota::per_hour(std::num::NonZeroU32::new(3).expect("3 is nonzero"))
}
