use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::sessions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionKind {
    Main,
    User,
}

impl SessionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKind::Main => "MAIN",
            SessionKind::User => "USER",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "MAIN" => SessionKind::Main,
            _ => SessionKind::User,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    QrPending,
    Connected,
    Disconnected,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::QrPending => "QR_PENDING",
            SessionStatus::Connected => "CONNECTED",
            SessionStatus::Disconnected => "DISCONNECTED",
            SessionStatus::Error => "ERROR",
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "CONNECTED" => SessionStatus::Connected,
            "DISCONNECTED" => SessionStatus::Disconnected,
            "ERROR" => SessionStatus::Error,
            _ => SessionStatus::QrPending,
        }
    }
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = sessions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Session {
    pub id: i32,
    pub user_id: i32,
    pub kind: String,
    pub status: String,
    pub connected_at: Option<i64>,
    pub disconnected_at: Option<i64>,
    pub metadata: String,
    pub created_at: i64,
}

impl Session {
    pub fn status(&self) -> SessionStatus {
        SessionStatus::parse(&self.status)
    }

    pub fn kind(&self) -> SessionKind {
        SessionKind::parse(&self.kind)
    }
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession {
    pub user_id: i32,
    pub kind: String,
    pub status: String,
    pub connected_at: Option<i64>,
    pub disconnected_at: Option<i64>,
    pub metadata: String,
    pub created_at: i64,
}

impl NewSession {
    pub fn new(user_id: i32, kind: SessionKind) -> Self {
        NewSession {
            user_id,
            kind: kind.as_str().to_string(),
            status: SessionStatus::QrPending.as_str().to_string(),
            connected_at: None,
            disconnected_at: None,
            metadata: "{}".to_string(),
            created_at: crate::util::now_unix(),
        }
    }
}
