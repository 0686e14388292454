use serde::Serialize;

use crate::error::AppResult;
use crate::models::{DeliveryStatus, Direction, Message, MessageKind, NewMessage, SessionKind};
use crate::repositories::{MessageRepository, SessionRepository};

#[derive(Debug, Clone, Serialize)]
pub struct MessageStats {
    pub total: i64,
    pub incoming: i64,
    pub outgoing: i64,
    pub first_at: Option<i64>,
    pub last_at: Option<i64>,
    pub avg_per_day: f64,
}

/// C5: pure data operations on Messages, no agent intelligence. A thin,
/// intentionally dumb layer over `MessageRepository` so C6 and the
/// handlers never touch diesel directly.
#[derive(Clone)]
pub struct MessageService {
    messages: MessageRepository,
    sessions: SessionRepository,
}

impl MessageService {
    pub fn new(messages: MessageRepository, sessions: SessionRepository) -> Self {
        Self { messages, sessions }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        session_id: i32,
        user_id: i32,
        direction: Direction,
        kind: MessageKind,
        content: Option<String>,
        caption: Option<String>,
        sender_jid: String,
        recipient_jid: String,
        timestamp: i64,
        external_id: Option<String>,
        reply_to_id: Option<i32>,
        media_metadata: Option<String>,
        delivery_status: Option<DeliveryStatus>,
    ) -> AppResult<Message> {
        let new_message = NewMessage::build(
            session_id,
            user_id,
            direction,
            kind,
            content,
            caption,
            sender_jid,
            recipient_jid,
            timestamp,
            external_id,
            reply_to_id,
            media_metadata,
            delivery_status,
        )
        .map_err(|e| crate::error::AppError::Validation(e.to_string()))?;
        self.messages.insert(&new_message)
    }

    pub fn recent(&self, user_id: i32, n: i64) -> AppResult<Vec<Message>> {
        self.messages.recent(user_id, n)
    }

    pub fn search(&self, user_id: i32, query: &str, limit: i64) -> AppResult<Vec<Message>> {
        self.messages.search(user_id, query, limit)
    }

    pub fn list_for_user(&self, user_id: i32, limit: i64, offset: i64) -> AppResult<Vec<Message>> {
        self.messages.list_for_user(user_id, limit, offset)
    }

    pub fn in_range(&self, user_id: i32, from: i64, to: i64) -> AppResult<Vec<Message>> {
        self.messages.in_range(user_id, from, to)
    }

    pub fn find_by_external_id(&self, external_id: &str) -> AppResult<Option<Message>> {
        self.messages.find_by_external_id(external_id)
    }

    pub fn record_failure_reason(&self, external_id: &str, reason: &str) -> AppResult<()> {
        self.messages.record_failure_reason(external_id, reason)
    }

    pub fn orphaned_incoming(&self, within_secs: i64) -> AppResult<Vec<Message>> {
        self.messages.orphaned_incoming(within_secs)
    }

    pub fn stats(&self, user_id: i32) -> AppResult<MessageStats> {
        let all = self.messages.in_range(user_id, 0, i64::MAX)?;
        let total = all.len() as i64;
        let incoming = all.iter().filter(|m| matches!(m.direction(), Direction::Incoming)).count() as i64;
        let outgoing = all.iter().filter(|m| matches!(m.direction(), Direction::Outgoing)).count() as i64;
        let first_at = all.first().map(|m| m.timestamp);
        let last_at = all.last().map(|m| m.timestamp);
        let avg_per_day = match (first_at, last_at) {
            (Some(first), Some(last)) if last > first => {
                let days = ((last - first) as f64 / 86_400.0).max(1.0);
                total as f64 / days
            }
            (Some(_), Some(_)) => total as f64,
            _ => 0.0,
        };
        Ok(MessageStats { total, incoming, outgoing, first_at, last_at, avg_per_day })
    }

    /// Idempotent; logs at INFO rather than erroring when `external_id` is
    /// unknown (the bridge may report status for a message we never sent).
    pub fn set_delivery_status(&self, external_id: &str, status: DeliveryStatus) -> AppResult<()> {
        let updated = self.messages.set_delivery_status(external_id, status)?;
        if !updated {
            tracing::info!(external_id, status = status.as_str(), "delivery status update for unknown external_id, ignoring");
        }
        Ok(())
    }

    pub fn get_or_create_session(&self, user_id: i32, kind: SessionKind) -> AppResult<crate::models::Session> {
        self.sessions.get_or_create(user_id, kind)
    }
}
