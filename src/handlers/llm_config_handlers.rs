use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth_middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::llm;
use crate::models::{LlmConfig, LlmProvider, ModelSettings};
use crate::AppState;

/// `LlmConfig` with the encrypted key redacted, never sent back to a client.
#[derive(Serialize)]
pub struct LlmConfigView {
    pub id: i32,
    pub provider: String,
    pub is_active: bool,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl From<LlmConfig> for LlmConfigView {
    fn from(c: LlmConfig) -> Self {
        let settings = c.settings();
        LlmConfigView { id: c.id, provider: c.provider, is_active: c.is_active, model: settings.model, base_url: settings.base_url }
    }
}

pub async fn list(State(state): State<Arc<AppState>>, auth: AuthUser) -> AppResult<Json<Vec<LlmConfigView>>> {
    let configs = state.llm_configs.list_for_user(auth.user_id)?;
    Ok(Json(configs.into_iter().map(LlmConfigView::from).collect()))
}

#[derive(Deserialize)]
pub struct PutConfigBody {
    pub provider: String,
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    #[serde(default = "default_true")]
    pub activate: bool,
}

fn default_true() -> bool {
    true
}

pub async fn put(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<PutConfigBody>,
) -> AppResult<Json<LlmConfigView>> {
    let provider = LlmProvider::parse(&body.provider.to_uppercase())
        .ok_or_else(|| AppError::Validation(format!("unknown provider: {}", body.provider)))?;

    let encrypted = state.vault.encrypt(&body.api_key)?;
    let settings = ModelSettings {
        model: body.model,
        temperature: body.temperature,
        max_tokens: body.max_tokens,
        system_prompt: body.system_prompt,
        base_url: body.base_url,
        max_context_messages: None,
        extra: Default::default(),
    };

    let config = state.llm_configs.upsert(auth.user_id, provider, encrypted, settings.to_json(), body.activate)?;
    Ok(Json(LlmConfigView::from(config)))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    axum::extract::Path(id): axum::extract::Path<i32>,
) -> AppResult<axum::http::StatusCode> {
    state.llm_configs.delete(id, auth.user_id)?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
pub struct TestResponse {
    pub ok: bool,
    pub message: String,
}

/// Round-trips a one-token chat call against the active config's provider so
/// the dashboard can confirm a key actually works before relying on it.
pub async fn test(State(state): State<Arc<AppState>>, auth: AuthUser) -> AppResult<Json<TestResponse>> {
    let Some(config) = state.llm_configs.find_active(auth.user_id)? else {
        return Ok(Json(TestResponse { ok: false, message: "no active configuration".to_string() }));
    };
    let api_key = state.vault.decrypt(&config.api_key_encrypted)?;
    let settings = config.settings();
    let provider = config.provider().ok_or_else(|| AppError::Validation("unrecognized provider".to_string()))?;
    let base_url = settings.base_url.clone().unwrap_or_else(|| llm::default_base_url(provider, None));
    let model = settings.model.clone().unwrap_or_else(|| llm::default_model(provider).to_string());
    let client = llm::build_client(provider, base_url, api_key);

    let params = llm::CallParams { model, temperature: None, max_tokens: 8 };
    let probe = vec![llm::ChatMessage::user("ping".to_string())];
    match client.chat_with_tools(&probe, &[], &params).await {
        Ok(_) => Ok(Json(TestResponse { ok: true, message: "provider reachable".to_string() })),
        Err(e) => Ok(Json(TestResponse { ok: false, message: e.to_string() })),
    }
}
