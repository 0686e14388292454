use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::util::now_unix;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct UserClaims {
    pub sub: i32,
    pub exp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AdminClaims {
    pub sub: i32,
    pub exp: i64,
}

pub fn issue_user_token(user_id: i32, secret: &str, ttl: std::time::Duration) -> AppResult<String> {
    let claims = UserClaims { sub: user_id, exp: now_unix() + ttl.as_secs() as i64 };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("jwt encode failed: {e}")))
}

pub fn verify_user_token(token: &str, secret: &str) -> AppResult<UserClaims> {
    decode::<UserClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::new(Algorithm::HS256))
        .map(|data| data.claims)
        .map_err(|_| AppError::Auth("invalid or expired token".to_string()))
}

pub fn issue_admin_token(user_id: i32, secret: &str, ttl: std::time::Duration) -> AppResult<String> {
    let claims = AdminClaims { sub: user_id, exp: now_unix() + ttl.as_secs() as i64 };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("jwt encode failed: {e}")))
}

pub fn verify_admin_token(token: &str, secret: &str) -> AppResult<AdminClaims> {
    decode::<AdminClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &Validation::new(Algorithm::HS256))
        .map(|data| data.claims)
        .map_err(|_| AppError::Auth("invalid or expired token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "a-secret-at-least-32-bytes-long!";

    #[test]
    fn user_token_round_trips() {
        let token = issue_user_token(42, SECRET, std::time::Duration::from_secs(3600)).unwrap();
        let claims = verify_user_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, 42);
    }

    #[test]
    fn admin_token_round_trips() {
        let token = issue_admin_token(7, SECRET, std::time::Duration::from_secs(3600)).unwrap();
        let claims = verify_admin_token(&token, SECRET).unwrap();
        assert_eq!(claims.sub, 7);
    }

    #[test]
    fn expired_token_rejected() {
        let token = issue_user_token(1, SECRET, std::time::Duration::from_secs(0)).unwrap();
        std::thread::sleep(std::time::Duration::from_secs(1));
        assert!(verify_user_token(&token, SECRET).is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = issue_user_token(1, SECRET, std::time::Duration::from_secs(3600)).unwrap();
        assert!(verify_user_token(&token, "a-different-secret-32-bytes-long").is_err());
    }

}
