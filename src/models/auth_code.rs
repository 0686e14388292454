use diesel::prelude::*;
use rand::Rng;

use crate::schema::auth_codes;

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = auth_codes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct AuthCode {
    pub id: i32,
    pub user_id: i32,
    pub code: String,
    pub used: bool,
    pub expires_at: i64,
    pub created_at: i64,
}

impl AuthCode {
    /// A code is valid only if unused and not yet expired.
    pub fn is_valid(&self, now: i64) -> bool {
        !self.used && now < self.expires_at
    }
}

#[derive(Insertable)]
#[diesel(table_name = auth_codes)]
pub struct NewAuthCode {
    pub user_id: i32,
    pub code: String,
    pub used: bool,
    pub expires_at: i64,
    pub created_at: i64,
}

impl NewAuthCode {
    pub fn generate(user_id: i32, ttl_secs: i64) -> Self {
        let now = crate::util::now_unix();
        let mut rng = rand::thread_rng();
        let code: String = (0..6).map(|_| rng.gen_range(0..10).to_string()).collect();
        NewAuthCode {
            user_id,
            code,
            used: false,
            expires_at: now + ttl_secs,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_produces_six_digit_code() {
        let new_code = NewAuthCode::generate(1, 600);
        assert_eq!(new_code.code.len(), 6);
        assert!(new_code.code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn valid_when_unused_and_unexpired() {
        let code = AuthCode { id: 1, user_id: 1, code: "123456".to_string(), used: false, expires_at: 100, created_at: 0 };
        assert!(code.is_valid(50));
    }

    #[test]
    fn invalid_when_used() {
        let code = AuthCode { id: 1, user_id: 1, code: "123456".to_string(), used: true, expires_at: 100, created_at: 0 };
        assert!(!code.is_valid(50));
    }

    #[test]
    fn invalid_when_expired() {
        let code = AuthCode { id: 1, user_id: 1, code: "123456".to_string(), used: false, expires_at: 100, created_at: 0 };
        assert!(!code.is_valid(100));
    }
}
