use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::agent::AgentWorkerPool;
use crate::error::{AppError, AppResult};
use crate::models::{DeliveryStatus, Direction, MessageKind, SessionKind, SessionStatus};
use crate::repositories::{SessionRepository, UserRepository};
use crate::services::MessageService;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-signature";

/// C8: single signed intake endpoint for everything the bridge reports —
/// inbound messages, delivery status, and connection state.
pub struct WebhookState {
    users: UserRepository,
    messages: MessageService,
    sessions: SessionRepository,
    agent_pool: Arc<AgentWorkerPool>,
    webhook_from_number: String,
    webhook_secret: Option<String>,
    /// Owner of the singleton MAIN session (the bridge's own WhatsApp
    /// connection), distinct from the per-user USER sessions. Resolved once
    /// at startup from `webhook_from_number`.
    system_user_id: i32,
}

impl WebhookState {
    pub fn new(
        users: UserRepository,
        messages: MessageService,
        sessions: SessionRepository,
        agent_pool: Arc<AgentWorkerPool>,
        webhook_from_number: String,
        webhook_secret: Option<String>,
        system_user_id: i32,
    ) -> Self {
        WebhookState { users, messages, sessions, agent_pool, webhook_from_number, webhook_secret, system_user_id }
    }
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    event_type: String,
    #[allow(dead_code)]
    timestamp: i64,
    data: Value,
}

#[derive(Debug, Deserialize)]
struct MessageReceivedData {
    message_id: String,
    from: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    text: Option<String>,
    caption: Option<String>,
    media_url: Option<String>,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct MessageStatusData {
    message_id: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConnectionStatusData {
    status: String,
}

pub async fn handle_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    verify_signature(&state, &headers, &body)?;

    let envelope: WebhookEnvelope =
        serde_json::from_slice(&body).map_err(|e| AppError::Validation(format!("malformed webhook body: {e}")))?;

    match envelope.event_type.as_str() {
        "message.received" => handle_message_received(&state, envelope.data)?,
        "message.sent" => handle_message_status(&state, envelope.data, DeliveryStatus::Sent)?,
        "message.failed" => handle_message_status(&state, envelope.data, DeliveryStatus::Failed)?,
        "connection.status" => handle_connection_status(&state, envelope.data)?,
        other => tracing::warn!(event_type = other, "unrecognized webhook event type, ignoring"),
    }

    Ok(StatusCode::OK)
}

fn verify_signature(state: &WebhookState, headers: &HeaderMap, body: &[u8]) -> AppResult<()> {
    check_signature(state.webhook_secret.as_deref(), headers, body)
}

fn check_signature(secret: Option<&str>, headers: &HeaderMap, body: &[u8]) -> AppResult<()> {
    let Some(secret) = secret else {
        tracing::warn!("no webhook secret configured, skipping signature validation");
        return Ok(());
    };

    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("missing signature header".to_string()))?;
    let provided = provided.strip_prefix("sha256=").unwrap_or(provided);
    let provided_bytes = hex::decode(provided).map_err(|_| AppError::Auth("malformed signature header".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AppError::Crypto)?;
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    if expected.as_slice().ct_eq(&provided_bytes).into() {
        Ok(())
    } else {
        Err(AppError::Auth("signature mismatch".to_string()))
    }
}

/// Stores the incoming message and, for TEXT, enqueues an agent job. Store
/// happens before enqueue: a crash between the two leaves an orphan that the
/// startup reconciliation scan picks back up.
fn handle_message_received(state: &WebhookState, data: Value) -> AppResult<()> {
    let data: MessageReceivedData =
        serde_json::from_value(data).map_err(|e| AppError::Validation(format!("malformed message.received data: {e}")))?;

    if state.messages.find_by_external_id(&data.message_id)?.is_some() {
        tracing::info!(external_id = %data.message_id, "duplicate message.received, ignoring");
        return Ok(());
    }

    let phone_number = phone_from_jid(&data.from);
    let user = state.users.get_or_create_by_phone(&phone_number)?;
    let session = state.sessions.get_or_create(user.id, SessionKind::User)?;

    let kind = data.kind.as_deref().map(|k| MessageKind::parse(&k.to_uppercase())).unwrap_or(MessageKind::Text);
    let media_metadata = data.media_url.as_ref().map(|url| serde_json::json!({ "media_url": url }).to_string());

    let stored = state.messages.store(
        session.id,
        user.id,
        Direction::Incoming,
        kind,
        data.text.clone(),
        data.caption,
        data.from.clone(),
        state.webhook_from_number.clone(),
        data.timestamp,
        Some(data.message_id.clone()),
        None,
        media_metadata,
        None,
    )?;

    if matches!(kind, MessageKind::Text) {
        let text = data.text.unwrap_or_default();
        state.agent_pool.dispatch(user.id, stored.id, data.from, text);
    }

    Ok(())
}

fn handle_message_status(state: &WebhookState, data: Value, status: DeliveryStatus) -> AppResult<()> {
    let data: MessageStatusData =
        serde_json::from_value(data).map_err(|e| AppError::Validation(format!("malformed status data: {e}")))?;

    state.messages.set_delivery_status(&data.message_id, status)?;
    if status == DeliveryStatus::Failed {
        if let Some(error) = data.error {
            state.messages.record_failure_reason(&data.message_id, &error)?;
        }
    }
    Ok(())
}

fn handle_connection_status(state: &WebhookState, data: Value) -> AppResult<()> {
    let data: ConnectionStatusData =
        serde_json::from_value(data).map_err(|e| AppError::Validation(format!("malformed connection.status data: {e}")))?;

    let status = match data.status.to_uppercase().as_str() {
        "CONNECTED" => SessionStatus::Connected,
        "DISCONNECTED" => SessionStatus::Disconnected,
        "ERROR" => SessionStatus::Error,
        _ => SessionStatus::QrPending,
    };

    let session = state.sessions.get_or_create(state.system_user_id, SessionKind::Main)?;
    state.sessions.set_status(session.id, status)?;
    Ok(())
}

fn phone_from_jid(jid: &str) -> String {
    jid.split('@').next().unwrap_or(jid).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn signed_headers(secret: &str, body: &[u8]) -> HeaderMap {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let sig = hex::encode(mac.finalize().into_bytes());
        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, format!("sha256={sig}").parse().unwrap());
        headers
    }

    #[test]
    fn accepts_valid_signature() {
        let body = br#"{"event_type":"message.received"}"#;
        let headers = signed_headers(SECRET, body);
        assert!(check_signature(Some(SECRET), &headers, body).is_ok());
    }

    #[test]
    fn rejects_single_byte_body_mutation() {
        let body = br#"{"event_type":"message.received"}"#;
        let headers = signed_headers(SECRET, body);
        let mut mutated = body.to_vec();
        mutated[5] ^= 1;
        assert!(check_signature(Some(SECRET), &headers, &mutated).is_err());
    }

    #[test]
    fn rejects_single_byte_signature_mutation() {
        let body = br#"{"event_type":"message.received"}"#;
        let mut headers = signed_headers(SECRET, body);
        let mutated = "sha256=00000000000000000000000000000000000000000000000000000000000000";
        headers.insert(SIGNATURE_HEADER, mutated.parse().unwrap());
        assert!(check_signature(Some(SECRET), &headers, body).is_err());
    }

    #[test]
    fn missing_header_rejected_when_secret_configured() {
        let body = b"{}";
        assert!(check_signature(Some(SECRET), &HeaderMap::new(), body).is_err());
    }

    #[test]
    fn skips_validation_when_no_secret_configured() {
        let body = b"{}";
        assert!(check_signature(None, &HeaderMap::new(), body).is_ok());
    }

    #[test]
    fn phone_extracted_from_jid() {
        assert_eq!(phone_from_jid("15551234567@s.whatsapp.net"), "15551234567");
        assert_eq!(phone_from_jid("15551234567"), "15551234567");
    }
}
