use diesel::prelude::*;

use crate::error::AppResult;
use crate::models::{NewUser, User};
use crate::schema::users;
use crate::DbPool;

/// Typed repository over `users`. Deleting a user cascades to their
/// sessions/messages/auth_codes/llm_configs via the `ON DELETE CASCADE`
/// foreign keys declared in the migrations.
#[derive(Clone)]
pub struct UserRepository {
    pool: DbPool,
}

impl UserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn find_by_id(&self, id: i32) -> AppResult<Option<User>> {
        let mut conn = self.pool.get()?;
        Ok(users::table.find(id).first(&mut conn).optional()?)
    }

    pub fn find_by_phone_number(&self, phone_number: &str) -> AppResult<Option<User>> {
        let mut conn = self.pool.get()?;
        Ok(users::table
            .filter(users::phone_number.eq(phone_number))
            .first(&mut conn)
            .optional()?)
    }

    /// Idempotent: returns the existing user if the phone number is already
    /// registered, otherwise creates one lazily (§3 "Created lazily on
    /// first inbound message").
    pub fn get_or_create_by_phone(&self, phone_number: &str) -> AppResult<User> {
        if let Some(existing) = self.find_by_phone_number(phone_number)? {
            return Ok(existing);
        }
        let mut conn = self.pool.get()?;
        let new_user = NewUser::lazy(phone_number);
        let inserted = conn.transaction(|conn| {
            diesel::insert_into(users::table).values(&new_user).execute(conn)?;
            users::table
                .filter(users::phone_number.eq(phone_number))
                .first::<User>(conn)
        })?;
        Ok(inserted)
    }

    pub fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<User>> {
        let mut conn = self.pool.get()?;
        Ok(users::table
            .order(users::id.asc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)?)
    }

    pub fn set_active(&self, id: i32, is_active: bool) -> AppResult<()> {
        let mut conn = self.pool.get()?;
        diesel::update(users::table.find(id))
            .set((users::is_active.eq(is_active), users::updated_at.eq(crate::util::now_unix())))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn set_admin(&self, id: i32, is_admin: bool) -> AppResult<()> {
        let mut conn = self.pool.get()?;
        diesel::update(users::table.find(id))
            .set((users::is_admin.eq(is_admin), users::updated_at.eq(crate::util::now_unix())))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Cascades to Sessions/Messages/AuthCodes/LLMConfigs via foreign keys.
    pub fn delete(&self, id: i32) -> AppResult<()> {
        let mut conn = self.pool.get()?;
        let affected = diesel::delete(users::table.find(id)).execute(&mut conn)?;
        if affected == 0 {
            return Err(crate::error::AppError::NotFound);
        }
        Ok(())
    }
}
