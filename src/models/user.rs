use diesel::prelude::*;
use serde_json::Value;

use crate::schema::users;

#[derive(Queryable, Selectable, Identifiable, Clone, Debug, serde::Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub metadata: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn metadata_value(&self) -> Value {
        serde_json::from_str(&self.metadata).unwrap_or_else(|_| Value::Object(Default::default()))
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub phone_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub metadata: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NewUser {
    /// Lazily created on first inbound message or explicit registration.
    pub fn lazy(phone_number: impl Into<String>) -> Self {
        let now = crate::util::now_unix();
        NewUser {
            phone_number: phone_number.into(),
            first_name: None,
            last_name: None,
            is_active: true,
            is_admin: false,
            metadata: "{}".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
