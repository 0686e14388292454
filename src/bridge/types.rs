use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionInfo {
    pub session_id: String,
    pub status: String,
    #[serde(default)]
    pub qr: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfigureWebhookRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendTextRequest {
    pub session_id: String,
    pub to: String,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SendTextResponse {
    pub message_id: String,
}

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct QrResponse {
    pub qr: String,
}
