use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use super::{CallParams, ChatMessage, ChatOutcome, LlmClient, Role, ToolCallRequest, ToolDefinition};
use crate::error::{AppError, AppResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

fn map_status(status: StatusCode, body: &str) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::ProviderAuth(body.to_string()),
        StatusCode::TOO_MANY_REQUESTS => AppError::ProviderRateLimited(body.to_string()),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => AppError::ProviderInvalidRequest(body.to_string()),
        s if s.is_server_error() => AppError::ProviderUnavailable(body.to_string()),
        _ => AppError::ProviderUnavailable(format!("unexpected status {status}: {body}")),
    }
}

fn map_transport(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::ProviderTimeout
    } else {
        AppError::ProviderUnavailable(e.to_string())
    }
}

/// Covers OpenAI itself plus every provider that speaks the same
/// `/chat/completions` dialect: OpenRouter-style custom endpoints and
/// Ollama's OpenAI-compatibility layer.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        OpenAiCompatibleClient { http, base_url, api_key }
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        params: &CallParams,
    ) -> AppResult<ChatOutcome> {
        let body_messages: Vec<Value> = messages
            .iter()
            .map(|m| {
                let mut obj = json!({ "role": role_str(m.role), "content": m.content });
                if let Some(ref id) = m.tool_call_id {
                    obj["tool_call_id"] = json!(id);
                }
                if let Some(ref calls) = m.tool_calls {
                    obj["tool_calls"] = json!(calls
                        .iter()
                        .map(|c| json!({
                            "id": c.id,
                            "type": "function",
                            "function": { "name": c.name, "arguments": c.arguments },
                        }))
                        .collect::<Vec<_>>());
                }
                obj
            })
            .collect();

        let body_tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": { "name": t.name, "description": t.description, "parameters": t.parameters },
                })
            })
            .collect();

        let mut body = json!({
            "model": params.model,
            "messages": body_messages,
            "max_tokens": params.max_tokens,
        });
        if !body_tools.is_empty() {
            body["tools"] = json!(body_tools);
        }
        if let Some(temp) = params.temperature {
            body["temperature"] = json!(temp);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport)?;
        if !status.is_success() {
            return Err(map_status(status, &text));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::ProviderInvalidRequest(format!("unparseable response: {e}")))?;
        let message = parsed
            .pointer("/choices/0/message")
            .ok_or_else(|| AppError::ProviderInvalidRequest("missing choices[0].message".into()))?;

        if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
            let tool_calls = calls
                .iter()
                .filter_map(|c| {
                    Some(ToolCallRequest {
                        id: c.get("id")?.as_str()?.to_string(),
                        name: c.pointer("/function/name")?.as_str()?.to_string(),
                        arguments: c.pointer("/function/arguments")?.as_str()?.to_string(),
                    })
                })
                .collect();
            return Ok(ChatOutcome::ToolCalls(tool_calls));
        }

        let content = message.get("content").and_then(Value::as_str).unwrap_or("").to_string();
        Ok(ChatOutcome::Message(content))
    }
}

/// Anthropic's native Messages API: system prompt is a top-level field, not
/// a message; tool results come back as `tool_use` content blocks.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        AnthropicClient { http, base_url, api_key }
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
        params: &CallParams,
    ) -> AppResult<ChatOutcome> {
        let system: Option<String> = messages
            .iter()
            .find(|m| matches!(m.role, Role::System))
            .and_then(|m| m.content.clone());

        let body_messages: Vec<Value> = messages
            .iter()
            .filter(|m| !matches!(m.role, Role::System))
            .map(|m| match m.role {
                Role::Tool => json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": m.tool_call_id,
                        "content": m.content.clone().unwrap_or_default(),
                    }],
                }),
                Role::Assistant if m.tool_calls.is_some() => json!({
                    "role": "assistant",
                    "content": m.tool_calls.as_ref().unwrap().iter().map(|c| json!({
                        "type": "tool_use",
                        "id": c.id,
                        "name": c.name,
                        "input": serde_json::from_str::<Value>(&c.arguments).unwrap_or(json!({})),
                    })).collect::<Vec<_>>(),
                }),
                _ => json!({ "role": role_str(m.role), "content": m.content.clone().unwrap_or_default() }),
            })
            .collect();

        let body_tools: Vec<Value> = tools
            .iter()
            .map(|t| json!({ "name": t.name, "description": t.description, "input_schema": t.parameters }))
            .collect();

        let mut body = json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "messages": body_messages,
        });
        if let Some(ref s) = system {
            body["system"] = json!(s);
        }
        if !body_tools.is_empty() {
            body["tools"] = json!(body_tools);
        }
        if let Some(temp) = params.temperature {
            body["temperature"] = json!(temp);
        }

        let response = self
            .http
            .post(format!("{}/messages", self.base_url.trim_end_matches('/')))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(map_transport)?;
        if !status.is_success() {
            return Err(map_status(status, &text));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| AppError::ProviderInvalidRequest(format!("unparseable response: {e}")))?;
        let content = parsed
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| AppError::ProviderInvalidRequest("missing content blocks".into()))?;

        let tool_calls: Vec<ToolCallRequest> = content
            .iter()
            .filter(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"))
            .filter_map(|b| {
                Some(ToolCallRequest {
                    id: b.get("id")?.as_str()?.to_string(),
                    name: b.get("name")?.as_str()?.to_string(),
                    arguments: b.get("input").map(|v| v.to_string()).unwrap_or_else(|| "{}".to_string()),
                })
            })
            .collect();
        if !tool_calls.is_empty() {
            return Ok(ChatOutcome::ToolCalls(tool_calls));
        }

        let text_block = content
            .iter()
            .find(|b| b.get("type").and_then(Value::as_str) == Some("text"))
            .and_then(|b| b.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        Ok(ChatOutcome::Message(text_block))
    }
}
