use diesel::prelude::*;

use crate::error::AppResult;
use crate::models::{LlmConfig, LlmProvider, NewLlmConfig};
use crate::schema::llm_configs;
use crate::DbPool;

/// At most one active `LlmConfig` per user (Open Question 2, decided in
/// DESIGN.md): activating a config deactivates any other config the same
/// user holds, rather than allowing several providers to run concurrently.
#[derive(Clone)]
pub struct LlmConfigRepository {
    pool: DbPool,
}

impl LlmConfigRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn find_active(&self, user_id: i32) -> AppResult<Option<LlmConfig>> {
        let mut conn = self.pool.get()?;
        Ok(llm_configs::table
            .filter(llm_configs::user_id.eq(user_id))
            .filter(llm_configs::is_active.eq(true))
            .first(&mut conn)
            .optional()?)
    }

    pub fn list_for_user(&self, user_id: i32) -> AppResult<Vec<LlmConfig>> {
        let mut conn = self.pool.get()?;
        Ok(llm_configs::table
            .filter(llm_configs::user_id.eq(user_id))
            .order(llm_configs::id.asc())
            .load(&mut conn)?)
    }

    pub fn upsert(
        &self,
        user_id: i32,
        provider: LlmProvider,
        api_key_encrypted: String,
        model_settings: String,
        activate: bool,
    ) -> AppResult<LlmConfig> {
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| {
            let existing: Option<LlmConfig> = llm_configs::table
                .filter(llm_configs::user_id.eq(user_id))
                .filter(llm_configs::provider.eq(provider.as_str()))
                .first(conn)
                .optional()?;

            if activate {
                diesel::update(
                    llm_configs::table
                        .filter(llm_configs::user_id.eq(user_id))
                        .filter(llm_configs::provider.ne(provider.as_str())),
                )
                .set(llm_configs::is_active.eq(false))
                .execute(conn)?;
            }

            if let Some(existing) = existing {
                diesel::update(llm_configs::table.find(existing.id))
                    .set((
                        llm_configs::api_key_encrypted.eq(&api_key_encrypted),
                        llm_configs::model_settings.eq(&model_settings),
                        llm_configs::is_active.eq(activate),
                    ))
                    .execute(conn)?;
                llm_configs::table.find(existing.id).first::<LlmConfig>(conn)
            } else {
                let new_config = NewLlmConfig {
                    user_id,
                    provider: provider.as_str().to_string(),
                    api_key_encrypted,
                    model_settings,
                    is_active: activate,
                };
                diesel::insert_into(llm_configs::table).values(&new_config).execute(conn)?;
                llm_configs::table.order(llm_configs::id.desc()).first::<LlmConfig>(conn)
            }
        })
        .map_err(Into::into)
    }

    pub fn delete(&self, id: i32, user_id: i32) -> AppResult<()> {
        let mut conn = self.pool.get()?;
        let affected = diesel::delete(
            llm_configs::table
                .filter(llm_configs::id.eq(id))
                .filter(llm_configs::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;
        if affected == 0 {
            return Err(crate::error::AppError::NotFound);
        }
        Ok(())
    }
}
