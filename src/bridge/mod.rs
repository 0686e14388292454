pub mod types;

use std::time::Duration;

use reqwest::StatusCode;

use crate::error::{AppError, AppResult};
use crate::util::normalize_jid;

pub use types::SessionInfo;

/// Typed client over the WhatsApp bridge's HTTP API (C3). Holds no retry
/// logic of its own; callers (the outbound queue workers, the supervisor)
/// decide whether and how to retry a failed call.
#[derive(Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base_url: String,
}

impl BridgeClient {
    pub fn new(base_url: String, timeout: Duration, connect_timeout: Duration) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build bridge http client: {e}")))?;
        Ok(BridgeClient { http, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub async fn health(&self) -> AppResult<types::HealthResponse> {
        let response = self
            .http
            .get(self.url("/health"))
            .send()
            .await
            .map_err(map_transport_error)?;
        read_json(response, BridgeOp::Health).await
    }

    pub async fn create_session(&self, session_id: &str) -> AppResult<types::SessionInfo> {
        let response = self
            .http
            .post(self.url("/sessions"))
            .json(&types::CreateSessionRequest { session_id: session_id.to_string() })
            .send()
            .await
            .map_err(map_transport_error)?;
        read_json(response, BridgeOp::CreateSession).await
    }

    pub async fn get_session(&self, session_id: &str) -> AppResult<types::SessionInfo> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await
            .map_err(map_transport_error)?;
        read_json(response, BridgeOp::GetSession).await
    }

    pub async fn list_sessions(&self) -> AppResult<Vec<types::SessionInfo>> {
        let response = self.http.get(self.url("/sessions")).send().await.map_err(map_transport_error)?;
        read_json(response, BridgeOp::ListSessions).await
    }

    pub async fn get_qr(&self, session_id: &str) -> AppResult<String> {
        let response = self
            .http
            .get(self.url(&format!("/sessions/{session_id}/qr")))
            .send()
            .await
            .map_err(map_transport_error)?;
        let body: types::QrResponse = read_json(response, BridgeOp::GetQr).await?;
        Ok(body.qr)
    }

    pub async fn delete_session(&self, session_id: &str) -> AppResult<()> {
        let response = self
            .http
            .delete(self.url(&format!("/sessions/{session_id}")))
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(&response, BridgeOp::DeleteSession)?;
        Ok(())
    }

    pub async fn configure_webhook(&self, url: &str, secret: Option<&str>) -> AppResult<()> {
        let response = self
            .http
            .post(self.url("/webhook"))
            .json(&types::ConfigureWebhookRequest { url: url.to_string(), secret: secret.map(str::to_string) })
            .send()
            .await
            .map_err(map_transport_error)?;
        check_status(&response, BridgeOp::ConfigureWebhook)?;
        Ok(())
    }

    /// `to` may be a bare phone number or a full JID; normalized before send.
    pub async fn send_text(&self, session_id: &str, to: &str, text: &str) -> AppResult<String> {
        let response = self
            .http
            .post(self.url("/messages/text"))
            .json(&types::SendTextRequest {
                session_id: session_id.to_string(),
                to: normalize_jid(to),
                text: text.to_string(),
            })
            .send()
            .await
            .map_err(map_transport_error)?;
        let body: types::SendTextResponse = read_json(response, BridgeOp::SendText).await?;
        Ok(body.message_id)
    }
}

fn map_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::BridgeUnreachable(format!("timed out: {e}"))
    } else {
        AppError::BridgeUnreachable(e.to_string())
    }
}

/// One variant per §4.3 operation, used only to pick the right typed error
/// out of a non-2xx status; operations with no documented special case
/// (`Health`, `ListSessions`, `DeleteSession`, `ConfigureWebhook`) always
/// collapse to `bridge_unreachable`.
#[derive(Clone, Copy)]
enum BridgeOp {
    Health,
    CreateSession,
    GetSession,
    ListSessions,
    GetQr,
    SendText,
    DeleteSession,
    ConfigureWebhook,
}

/// Maps a non-2xx bridge response onto the §4.3 operation table: `409` on
/// `create_session` means the session already exists, `404` on
/// `get_session`/`get_qr`/`send_text` means no such session, `409` on
/// `get_qr` means the session is already connected (no QR to show), `409`
/// on `send_text` means the session exists but isn't connected. Anything
/// else is a generic `bridge_unreachable`.
fn classify_error(op: BridgeOp, status: StatusCode) -> AppError {
    match (op, status) {
        (BridgeOp::CreateSession, StatusCode::CONFLICT) => AppError::Conflict("bridge session already exists".to_string()),
        (BridgeOp::GetSession, StatusCode::NOT_FOUND) => AppError::NotFound,
        (BridgeOp::GetQr, StatusCode::NOT_FOUND) => AppError::NotFound,
        (BridgeOp::GetQr, StatusCode::CONFLICT) => AppError::AlreadyConnected,
        (BridgeOp::SendText, StatusCode::NOT_FOUND) => AppError::NotFound,
        (BridgeOp::SendText, StatusCode::CONFLICT) => AppError::NotConnected,
        _ => AppError::BridgeUnreachable(format!("bridge returned {status}")),
    }
}

fn check_status(response: &reqwest::Response, op: BridgeOp) -> AppResult<()> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(classify_error(op, response.status()))
}

async fn read_json<T: serde::de::DeserializeOwned>(response: reqwest::Response, op: BridgeOp) -> AppResult<T> {
    check_status(&response, op)?;
    response
        .json::<T>()
        .await
        .map_err(|e| AppError::BridgeUnreachable(format!("invalid bridge response: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_session_conflict_maps_to_conflict() {
        assert!(matches!(classify_error(BridgeOp::CreateSession, StatusCode::CONFLICT), AppError::Conflict(_)));
    }

    #[test]
    fn get_session_not_found_maps_to_not_found() {
        assert!(matches!(classify_error(BridgeOp::GetSession, StatusCode::NOT_FOUND), AppError::NotFound));
    }

    #[test]
    fn get_qr_conflict_maps_to_already_connected() {
        assert!(matches!(classify_error(BridgeOp::GetQr, StatusCode::CONFLICT), AppError::AlreadyConnected));
    }

    #[test]
    fn get_qr_not_found_maps_to_not_found() {
        assert!(matches!(classify_error(BridgeOp::GetQr, StatusCode::NOT_FOUND), AppError::NotFound));
    }

    #[test]
    fn send_text_conflict_maps_to_not_connected() {
        assert!(matches!(classify_error(BridgeOp::SendText, StatusCode::CONFLICT), AppError::NotConnected));
    }

    #[test]
    fn send_text_not_found_maps_to_not_found() {
        assert!(matches!(classify_error(BridgeOp::SendText, StatusCode::NOT_FOUND), AppError::NotFound));
    }

    #[test]
    fn unmapped_status_falls_back_to_bridge_unreachable() {
        assert!(matches!(
            classify_error(BridgeOp::Health, StatusCode::INTERNAL_SERVER_ERROR),
            AppError::BridgeUnreachable(_)
        ));
        assert!(matches!(classify_error(BridgeOp::DeleteSession, StatusCode::BAD_GATEWAY), AppError::BridgeUnreachable(_)));
    }
}
