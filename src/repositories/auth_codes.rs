use diesel::prelude::*;

use crate::error::AppResult;
use crate::models::{AuthCode, NewAuthCode};
use crate::schema::auth_codes;
use crate::DbPool;

#[derive(Clone)]
pub struct AuthCodeRepository {
    pool: DbPool,
}

impl AuthCodeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, user_id: i32, ttl_secs: i64) -> AppResult<AuthCode> {
        let mut conn = self.pool.get()?;
        let new_code = NewAuthCode::generate(user_id, ttl_secs);
        conn.transaction(|conn| {
            diesel::insert_into(auth_codes::table).values(&new_code).execute(conn)?;
            auth_codes::table.order(auth_codes::id.desc()).first::<AuthCode>(conn)
        })
        .map_err(Into::into)
    }

    /// Atomically verifies a code and flips it to used so a second
    /// concurrent verify attempt with the same code cannot also succeed.
    pub fn verify_and_consume(&self, user_id: i32, code: &str) -> AppResult<bool> {
        let mut conn = self.pool.get()?;
        let now = crate::util::now_unix();
        conn.transaction(|conn| {
            let candidate: Option<AuthCode> = auth_codes::table
                .filter(auth_codes::user_id.eq(user_id))
                .filter(auth_codes::code.eq(code))
                .filter(auth_codes::used.eq(false))
                .first(conn)
                .optional()?;

            let Some(candidate) = candidate else {
                return Ok(false);
            };
            if !candidate.is_valid(now) {
                return Ok(false);
            }

            let affected = diesel::update(
                auth_codes::table
                    .filter(auth_codes::id.eq(candidate.id))
                    .filter(auth_codes::used.eq(false)),
            )
            .set(auth_codes::used.eq(true))
            .execute(conn)?;
            Ok(affected > 0)
        })
    }
}
