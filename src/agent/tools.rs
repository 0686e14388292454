use serde::Serialize;
use serde_json::{json, Value};

use crate::error::AppResult;
use crate::llm::ToolDefinition;
use crate::models::Direction;
use crate::services::MessageService;

pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "search_messages".to_string(),
            description: "Search this user's message history for a substring match".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer", "default": 10 },
                },
                "required": ["query"],
            }),
        },
        ToolDefinition {
            name: "get_recent_messages".to_string(),
            description: "Fetch the most recent messages in chronological order".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "count": { "type": "integer", "default": 20 } },
            }),
        },
        ToolDefinition {
            name: "summarize_chat".to_string(),
            description: "Summarize the last N messages of this conversation".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "last_n": { "type": "integer", "default": 50 } },
            }),
        },
        ToolDefinition {
            name: "extract_tasks".to_string(),
            description: "Extract action items mentioned in the last N messages".to_string(),
            parameters: json!({
                "type": "object",
                "properties": { "last_n": { "type": "integer", "default": 100 } },
            }),
        },
        ToolDefinition {
            name: "get_conversation_stats".to_string(),
            description: "Return aggregate stats for this conversation".to_string(),
            parameters: json!({ "type": "object", "properties": {} }),
        },
    ]
}

#[derive(Serialize)]
struct MessageView {
    id: i32,
    content: String,
    sender: String,
    timestamp: i64,
}

fn to_view(m: &crate::models::Message) -> MessageView {
    MessageView {
        id: m.id,
        content: m.content.clone().unwrap_or_default(),
        sender: m.sender_jid.clone(),
        timestamp: m.timestamp,
    }
}

/// Dispatches a tool call by name. Returns the JSON-serialized tool result
/// that gets appended to the conversation as a TOOL message.
pub fn execute(messages: &MessageService, user_id: i32, name: &str, arguments: &Value) -> AppResult<Value> {
    match name {
        "search_messages" => {
            let query = arguments.get("query").and_then(Value::as_str).unwrap_or("");
            let limit = arguments.get("limit").and_then(Value::as_i64).unwrap_or(10);
            let results = messages.search(user_id, query, limit)?;
            Ok(json!(results.iter().map(to_view).collect::<Vec<_>>()))
        }
        "get_recent_messages" => {
            let count = arguments.get("count").and_then(Value::as_i64).unwrap_or(20);
            let mut results = messages.recent(user_id, count)?;
            results.reverse();
            Ok(json!(results.iter().map(to_view).collect::<Vec<_>>()))
        }
        "summarize_chat" => {
            let last_n = arguments.get("last_n").and_then(Value::as_i64).unwrap_or(50);
            let mut recent = messages.recent(user_id, last_n)?;
            recent.reverse();
            let message_count = recent.len();
            let date_range = match (recent.first(), recent.last()) {
                (Some(first), Some(last)) => json!({ "from": first.timestamp, "to": last.timestamp }),
                _ => json!(null),
            };
            let key_topics = extract_key_topics(&recent);
            let summary = if recent.is_empty() {
                "No messages to summarize.".to_string()
            } else {
                format!("{message_count} messages exchanged, covering: {}", key_topics.join(", "))
            };
            Ok(json!({ "summary": summary, "message_count": message_count, "date_range": date_range, "key_topics": key_topics }))
        }
        "extract_tasks" => {
            let last_n = arguments.get("last_n").and_then(Value::as_i64).unwrap_or(100);
            let mut recent = messages.recent(user_id, last_n)?;
            recent.reverse();
            Ok(json!(extract_tasks(&recent)))
        }
        "get_conversation_stats" => {
            let stats = messages.stats(user_id)?;
            Ok(json!({
                "total": stats.total,
                "user": stats.incoming,
                "assistant": stats.outgoing,
                "date_range": { "from": stats.first_at, "to": stats.last_at },
                "avg_per_day": stats.avg_per_day,
            }))
        }
        other => Ok(json!({ "error": format!("unknown tool: {other}") })),
    }
}

fn extract_key_topics(messages: &[crate::models::Message]) -> Vec<String> {
    let mut words: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for m in messages {
        let Some(ref content) = m.content else { continue };
        for word in content.split_whitespace() {
            let cleaned: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
            if cleaned.len() > 4 {
                *words.entry(cleaned.to_lowercase()).or_insert(0) += 1;
            }
        }
    }
    let mut ranked: Vec<(String, usize)> = words.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.into_iter().take(5).map(|(w, _)| w).collect()
}

const TASK_MARKERS: &[&str] = &["need to", "todo", "remember to", "don't forget", "have to", "should "];
const URGENT_MARKERS: &[&str] = &["urgent", "asap", "immediately", "right away"];

#[derive(Serialize)]
struct TaskView {
    task: String,
    mentioned_at: i64,
    priority: &'static str,
    completed: bool,
}

fn extract_tasks(messages: &[crate::models::Message]) -> Vec<TaskView> {
    let mut tasks = Vec::new();
    for m in messages {
        if !matches!(m.direction(), Direction::Incoming) {
            continue;
        }
        let Some(ref content) = m.content else { continue };
        let lower = content.to_lowercase();
        if TASK_MARKERS.iter().any(|marker| lower.contains(marker)) {
            let priority = if URGENT_MARKERS.iter().any(|marker| lower.contains(marker)) { "high" } else { "normal" };
            tasks.push(TaskView { task: content.clone(), mentioned_at: m.timestamp, priority, completed: false });
        }
    }
    tasks
}
