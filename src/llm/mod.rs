pub mod providers;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::LlmProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::System, content: Some(content.into()), tool_calls: None, tool_call_id: None, name: None }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::User, content: Some(content.into()), tool_calls: None, tool_call_id: None, name: None }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage { role: Role::Assistant, content: Some(content.into()), tool_calls: None, tool_call_id: None, name: None }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments, as emitted by the provider.
    pub arguments: String,
}

#[derive(Debug, Clone)]
pub enum ChatOutcome {
    Message(String),
    ToolCalls(Vec<ToolCallRequest>),
}

/// Model settings narrowed to what a single chat call needs, decoupled from
/// the persisted `ModelSettings` row so providers don't reach into storage.
#[derive(Debug, Clone)]
pub struct CallParams {
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        params: &CallParams,
    ) -> AppResult<ChatOutcome>;
}

/// Resolves the base URL and a sane default model for a provider. Stateless:
/// credentials are supplied per-call by the caller, never stored here.
pub fn default_base_url(provider: LlmProvider, custom_base_url: Option<&str>) -> String {
    match provider {
        LlmProvider::Openai => "https://api.openai.com/v1".to_string(),
        LlmProvider::Anthropic => "https://api.anthropic.com/v1".to_string(),
        LlmProvider::Google => "https://generativelanguage.googleapis.com/v1beta".to_string(),
        LlmProvider::Ollama => custom_base_url.unwrap_or("http://localhost:11434/v1").to_string(),
        LlmProvider::Custom => custom_base_url.unwrap_or("http://localhost:8080/v1").to_string(),
    }
}

pub fn default_model(provider: LlmProvider) -> &'static str {
    match provider {
        LlmProvider::Openai => "gpt-4o-mini",
        LlmProvider::Anthropic => "claude-3-5-sonnet-20241022",
        LlmProvider::Google => "gemini-1.5-flash",
        LlmProvider::Ollama => "llama3.1",
        LlmProvider::Custom => "default",
    }
}

/// Builds the concrete client for a provider. `api_key` is the already
/// vault-decrypted secret; it is held only for the lifetime of this client.
pub fn build_client(
    provider: LlmProvider,
    base_url: String,
    api_key: String,
) -> Box<dyn LlmClient> {
    match provider {
        LlmProvider::Anthropic => Box::new(providers::AnthropicClient::new(base_url, api_key)),
        _ => Box::new(providers::OpenAiCompatibleClient::new(base_url, api_key)),
    }
}
