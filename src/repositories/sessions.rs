use diesel::prelude::*;

use crate::error::AppResult;
use crate::models::{NewSession, Session, SessionKind, SessionStatus};
use crate::schema::sessions;
use crate::DbPool;

#[derive(Clone)]
pub struct SessionRepository {
    pool: DbPool,
}

impl SessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn find_by_id(&self, id: i32) -> AppResult<Option<Session>> {
        let mut conn = self.pool.get()?;
        Ok(sessions::table.find(id).first(&mut conn).optional()?)
    }

    pub fn find_for_user(&self, user_id: i32, kind: SessionKind) -> AppResult<Option<Session>> {
        let mut conn = self.pool.get()?;
        Ok(sessions::table
            .filter(sessions::user_id.eq(user_id))
            .filter(sessions::kind.eq(kind.as_str()))
            .first(&mut conn)
            .optional()?)
    }

    /// Idempotent session retrieval (C5 `get_or_create_session`).
    pub fn get_or_create(&self, user_id: i32, kind: SessionKind) -> AppResult<Session> {
        if let Some(existing) = self.find_for_user(user_id, kind)? {
            return Ok(existing);
        }
        let mut conn = self.pool.get()?;
        let new_session = NewSession::new(user_id, kind);
        conn.transaction(|conn| {
            diesel::insert_into(sessions::table).values(&new_session).execute(conn)?;
            sessions::table
                .filter(sessions::user_id.eq(user_id))
                .filter(sessions::kind.eq(kind.as_str()))
                .first::<Session>(conn)
        })
        .map_err(Into::into)
    }

    /// Transition status, maintaining the invariant that `connected_at` is
    /// set exactly once (the first time the session reaches CONNECTED).
    pub fn set_status(&self, id: i32, status: SessionStatus) -> AppResult<()> {
        let mut conn = self.pool.get()?;
        let now = crate::util::now_unix();
        conn.transaction(|conn| {
            let current: Session = sessions::table.find(id).first(conn)?;
            let connected_at = match status {
                SessionStatus::Connected if current.connected_at.is_none() => Some(now),
                _ => current.connected_at,
            };
            let disconnected_at = match status {
                SessionStatus::Disconnected => Some(now),
                _ => current.disconnected_at,
            };
            diesel::update(sessions::table.find(id))
                .set((
                    sessions::status.eq(status.as_str()),
                    sessions::connected_at.eq(connected_at),
                    sessions::disconnected_at.eq(disconnected_at),
                ))
                .execute(conn)?;
            Ok(())
        })
    }
}
