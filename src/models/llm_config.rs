use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::llm_configs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LlmProvider {
    Openai,
    Anthropic,
    Google,
    Ollama,
    Custom,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Openai => "OPENAI",
            LlmProvider::Anthropic => "ANTHROPIC",
            LlmProvider::Google => "GOOGLE",
            LlmProvider::Ollama => "OLLAMA",
            LlmProvider::Custom => "CUSTOM",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "OPENAI" => Some(LlmProvider::Openai),
            "ANTHROPIC" => Some(LlmProvider::Anthropic),
            "GOOGLE" => Some(LlmProvider::Google),
            "OLLAMA" => Some(LlmProvider::Ollama),
            "CUSTOM" => Some(LlmProvider::Custom),
            _ => None,
        }
    }
}

/// The recognized subset of the free-form `model_settings` map. Unknown keys
/// are preserved in `extra` and round-trip untouched; consumers only ever
/// read the named fields.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub base_url: Option<String>,
    pub max_context_messages: Option<u32>,
    pub extra: Map<String, Value>,
}

impl ModelSettings {
    pub fn from_json(raw: &str) -> Self {
        let mut map = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let model = map.remove("model").and_then(|v| v.as_str().map(str::to_string));
        let temperature = map.remove("temperature").and_then(|v| v.as_f64()).map(|v| v as f32);
        let max_tokens = map.remove("max_tokens").and_then(|v| v.as_u64()).map(|v| v as u32);
        let system_prompt = map.remove("system_prompt").and_then(|v| v.as_str().map(str::to_string));
        let base_url = map.remove("base_url").and_then(|v| v.as_str().map(str::to_string));
        let max_context_messages = map
            .remove("max_context_messages")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32);

        ModelSettings {
            model,
            temperature,
            max_tokens,
            system_prompt,
            base_url,
            max_context_messages,
            extra: map,
        }
    }

    pub fn to_json(&self) -> String {
        let mut map = self.extra.clone();
        if let Some(ref v) = self.model {
            map.insert("model".to_string(), Value::String(v.clone()));
        }
        if let Some(v) = self.temperature {
            if let Some(n) = serde_json::Number::from_f64(v as f64) {
                map.insert("temperature".to_string(), Value::Number(n));
            }
        }
        if let Some(v) = self.max_tokens {
            map.insert("max_tokens".to_string(), Value::Number(v.into()));
        }
        if let Some(ref v) = self.system_prompt {
            map.insert("system_prompt".to_string(), Value::String(v.clone()));
        }
        if let Some(ref v) = self.base_url {
            map.insert("base_url".to_string(), Value::String(v.clone()));
        }
        if let Some(v) = self.max_context_messages {
            map.insert("max_context_messages".to_string(), Value::Number(v.into()));
        }
        Value::Object(map).to_string()
    }

    pub fn max_context_messages_or_default(&self) -> u32 {
        self.max_context_messages.unwrap_or(20)
    }
}

#[derive(Queryable, Selectable, Identifiable, Clone, Debug)]
#[diesel(table_name = llm_configs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct LlmConfig {
    pub id: i32,
    pub user_id: i32,
    pub provider: String,
    pub api_key_encrypted: String,
    pub model_settings: String,
    pub is_active: bool,
}

impl LlmConfig {
    pub fn provider(&self) -> Option<LlmProvider> {
        LlmProvider::parse(&self.provider)
    }

    pub fn settings(&self) -> ModelSettings {
        ModelSettings::from_json(&self.model_settings)
    }
}

#[derive(Insertable)]
#[diesel(table_name = llm_configs)]
pub struct NewLlmConfig {
    pub user_id: i32,
    pub provider: String,
    pub api_key_encrypted: String,
    pub model_settings: String,
    pub is_active: bool,
}
