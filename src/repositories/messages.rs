use diesel::prelude::*;

use crate::error::AppResult;
use crate::models::{DeliveryStatus, Message, NewMessage};
use crate::schema::messages;
use crate::DbPool;

#[derive(Clone)]
pub struct MessageRepository {
    pool: DbPool,
}

impl MessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn insert(&self, new_message: &NewMessage) -> AppResult<Message> {
        let mut conn = self.pool.get()?;
        conn.transaction(|conn| {
            diesel::insert_into(messages::table).values(new_message).execute(conn)?;
            messages::table.order(messages::id.desc()).first::<Message>(conn)
        })
        .map_err(Into::into)
    }

    pub fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Message>> {
        let mut conn = self.pool.get()?;
        Ok(messages::table
            .filter(messages::external_id.eq(external_id))
            .first(&mut conn)
            .optional()?)
    }

    pub fn recent(&self, user_id: i32, n: i64) -> AppResult<Vec<Message>> {
        let mut conn = self.pool.get()?;
        Ok(messages::table
            .filter(messages::user_id.eq(user_id))
            .order(messages::timestamp.desc())
            .limit(n)
            .load(&mut conn)?)
    }

    pub fn search(&self, user_id: i32, query: &str, limit: i64) -> AppResult<Vec<Message>> {
        let mut conn = self.pool.get()?;
        let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));
        Ok(messages::table
            .filter(messages::user_id.eq(user_id))
            .filter(messages::content.like(pattern).escape('\\'))
            .order(messages::timestamp.desc())
            .limit(limit)
            .load(&mut conn)?)
    }

    pub fn in_range(&self, user_id: i32, from: i64, to: i64) -> AppResult<Vec<Message>> {
        let mut conn = self.pool.get()?;
        Ok(messages::table
            .filter(messages::user_id.eq(user_id))
            .filter(messages::timestamp.ge(from))
            .filter(messages::timestamp.le(to))
            .order(messages::timestamp.asc())
            .load(&mut conn)?)
    }

    pub fn list_for_user(&self, user_id: i32, limit: i64, offset: i64) -> AppResult<Vec<Message>> {
        let mut conn = self.pool.get()?;
        Ok(messages::table
            .filter(messages::user_id.eq(user_id))
            .order(messages::timestamp.desc())
            .limit(limit)
            .offset(offset)
            .load(&mut conn)?)
    }

    /// Idempotent; a missing `external_id` is a no-op (caller logs at INFO).
    pub fn set_delivery_status(&self, external_id: &str, status: DeliveryStatus) -> AppResult<bool> {
        let mut conn = self.pool.get()?;
        let affected = diesel::update(messages::table.filter(messages::external_id.eq(external_id)))
            .set(messages::delivery_status.eq(status.as_str()))
            .execute(&mut conn)?;
        Ok(affected > 0)
    }

    pub fn record_failure_reason(&self, external_id: &str, reason: &str) -> AppResult<()> {
        let mut conn = self.pool.get()?;
        diesel::update(messages::table.filter(messages::external_id.eq(external_id)))
            .set((
                messages::delivery_status.eq(DeliveryStatus::Failed.as_str()),
                messages::media_metadata.eq(serde_json::json!({ "error": reason }).to_string()),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    /// All TEXT messages from a user with no OUTGOING reply whose timestamp
    /// exceeds theirs within `within_secs`; used by the startup
    /// reconciliation pass (§8 scenario 6).
    pub fn orphaned_incoming(&self, within_secs: i64) -> AppResult<Vec<Message>> {
        let mut conn = self.pool.get()?;
        let cutoff = crate::util::now_unix() - within_secs;
        let candidates: Vec<Message> = messages::table
            .filter(messages::direction.eq("INCOMING"))
            .filter(messages::kind.eq("TEXT"))
            .filter(messages::timestamp.le(cutoff))
            .order(messages::timestamp.asc())
            .load(&mut conn)?;

        let mut orphans = Vec::new();
        for incoming in candidates {
            let has_reply: i64 = messages::table
                .filter(messages::user_id.eq(incoming.user_id))
                .filter(messages::direction.ne("INCOMING"))
                .filter(messages::timestamp.gt(incoming.timestamp))
                .count()
                .get_result(&mut conn)?;
            if has_reply == 0 {
                orphans.push(incoming);
            }
        }
        Ok(orphans)
    }
}
