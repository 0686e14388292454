use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::messages;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
    Document,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "TEXT",
            MessageKind::Image => "IMAGE",
            MessageKind::Audio => "AUDIO",
            MessageKind::Video => "VIDEO",
            MessageKind::Document => "DOCUMENT",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "IMAGE" => MessageKind::Image,
            "AUDIO" => MessageKind::Audio,
            "VIDEO" => MessageKind::Video,
            "DOCUMENT" => MessageKind::Document,
            _ => MessageKind::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Incoming,
    Outgoing,
    System,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Incoming => "INCOMING",
            Direction::Outgoing => "OUTGOING",
            Direction::System => "SYSTEM",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "OUTGOING" => Direction::Outgoing,
            "SYSTEM" => Direction::System,
            _ => Direction::Incoming,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Read => "READ",
            DeliveryStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "SENT" => Some(DeliveryStatus::Sent),
            "DELIVERED" => Some(DeliveryStatus::Delivered),
            "READ" => Some(DeliveryStatus::Read),
            "FAILED" => Some(DeliveryStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug, Serialize)]
#[diesel(table_name = messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Message {
    pub id: i32,
    pub session_id: i32,
    pub user_id: i32,
    pub sender_jid: String,
    pub recipient_jid: String,
    pub timestamp: i64,
    pub kind: String,
    pub direction: String,
    pub content: Option<String>,
    pub caption: Option<String>,
    pub reply_to_id: Option<i32>,
    pub media_metadata: Option<String>,
    pub delivery_status: Option<String>,
    pub external_id: Option<String>,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        MessageKind::parse(&self.kind)
    }

    pub fn direction(&self) -> Direction {
        Direction::parse(&self.direction)
    }

    pub fn delivery_status(&self) -> Option<DeliveryStatus> {
        self.delivery_status.as_deref().and_then(DeliveryStatus::parse)
    }
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = messages)]
pub struct NewMessage {
    pub session_id: i32,
    pub user_id: i32,
    pub sender_jid: String,
    pub recipient_jid: String,
    pub timestamp: i64,
    pub kind: String,
    pub direction: String,
    pub content: Option<String>,
    pub caption: Option<String>,
    pub reply_to_id: Option<i32>,
    pub media_metadata: Option<String>,
    pub delivery_status: Option<String>,
    pub external_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("TEXT messages must carry non-empty content")]
pub struct EmptyTextContent;

impl NewMessage {
    /// Builds a row, enforcing the content-non-empty-for-TEXT invariant at
    /// construction so a violating row can never reach storage.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
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
    ) -> Result<Self, EmptyTextContent> {
        if matches!(kind, MessageKind::Text) && content.as_deref().unwrap_or("").is_empty() {
            return Err(EmptyTextContent);
        }
        Ok(NewMessage {
            session_id,
            user_id,
            sender_jid,
            recipient_jid,
            timestamp,
            kind: kind.as_str().to_string(),
            direction: direction.as_str().to_string(),
            content,
            caption,
            reply_to_id,
            media_metadata,
            delivery_status: delivery_status.map(|s| s.as_str().to_string()),
            external_id,
        })
    }
}
