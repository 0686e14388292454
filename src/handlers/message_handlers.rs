use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::auth_middleware::AuthUser;
use crate::error::AppResult;
use crate::models::Message;
use crate::AppState;

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
    q: Option<String>,
}

fn default_limit() -> i64 {
    50
}

/// `q` switches between a plain paginated listing and a full-text search,
/// per the single `GET /api/v1/messages?limit&offset&q?` contract.
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(q): Query<ListQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = match q.q.as_deref() {
        Some(term) if !term.is_empty() => state.messages.search(auth.user_id, term, q.limit)?,
        _ => state.messages.list_for_user(auth.user_id, q.limit, q.offset)?,
    };
    Ok(Json(messages))
}

pub async fn stats(State(state): State<Arc<AppState>>, auth: AuthUser) -> AppResult<Json<crate::services::MessageStats>> {
    let stats = state.messages.stats(auth.user_id)?;
    Ok(Json(stats))
}
