pub mod state;
pub mod tools;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};
use crate::llm::{self, CallParams, ChatMessage, ChatOutcome, LlmClient, ToolDefinition};
use crate::models::{DeliveryStatus, Direction, MessageKind, SessionKind};
use crate::queue::OutboundQueue;
use crate::repositories::LlmConfigRepository;
use crate::services::MessageService;
use crate::util::now_unix;
use crate::vault::Vault;
use state::{JobState, JobTracker};

const MAX_TOOL_ROUNDS: u32 = 4;
const TOOL_LOOP_WALL_CLOCK_BUDGET: Duration = Duration::from_secs(60);
const CANNED_NO_LLM: &str = "Your assistant isn't configured yet.";
const CANNED_BUDGET_EXCEEDED: &str = "I wasn't able to finish that within my usual steps, but I've noted your message.";
const CANNED_PROVIDER_AUTH_FAILURE: &str = "There's a problem with your assistant's configuration. Please check your API key.";
const CANNED_PROVIDER_FAILURE: &str = "I'm having trouble reaching your assistant's AI provider right now. Please try again shortly.";

/// §7: `rate_limited` gets a bounded retry with jitter.
const PROVIDER_RATE_LIMIT_MAX_RETRIES: u32 = 3;
const PROVIDER_RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);

/// C6: per-message pipeline — load policy, decrypt key, build context, run
/// the tool loop, persist the reply, enqueue the send.
pub struct AgentOrchestrator {
    messages: MessageService,
    llm_configs: LlmConfigRepository,
    vault: Vault,
    outbound: OutboundQueue,
    webhook_from_number: String,
}

impl AgentOrchestrator {
    pub fn new(
        messages: MessageService,
        llm_configs: LlmConfigRepository,
        vault: Vault,
        outbound: OutboundQueue,
        webhook_from_number: String,
    ) -> Self {
        AgentOrchestrator { messages, llm_configs, vault, outbound, webhook_from_number }
    }

    pub async fn process(&self, user_id: i32, incoming_message_id: i32, sender_jid: &str, text: &str) -> AppResult<()> {
        let mut job = JobTracker::new(incoming_message_id);
        job.transition(JobState::StoredIncoming);

        let Some(config) = self.llm_configs.find_active(user_id)? else {
            self.reply_with_canned(user_id, sender_jid, CANNED_NO_LLM).await?;
            job.transition(JobState::Done);
            return Ok(());
        };

        let api_key = match self.vault.decrypt(&config.api_key_encrypted) {
            Ok(key) => key,
            Err(e) => {
                job.fail("vault decrypt failed");
                return Err(e);
            }
        };

        let settings = config.settings();
        let provider = config.provider().unwrap_or(crate::models::LlmProvider::Openai);
        let base_url = settings.base_url.clone().unwrap_or_else(|| llm::default_base_url(provider, None));
        let model = settings.model.clone().unwrap_or_else(|| llm::default_model(provider).to_string());
        let client = llm::build_client(provider, base_url, api_key);

        let k = settings.max_context_messages_or_default() as i64;
        let mut history = self.messages.recent(user_id, k)?;
        history.reverse();

        let system_prompt = settings
            .system_prompt
            .clone()
            .unwrap_or_else(|| "You are a helpful WhatsApp assistant.".to_string());
        let mut conversation = vec![ChatMessage::system(system_prompt)];
        for m in &history {
            let content = m.content.clone().unwrap_or_default();
            match m.direction() {
                Direction::Incoming => conversation.push(ChatMessage::user(content)),
                Direction::Outgoing | Direction::System => conversation.push(ChatMessage::assistant(content)),
            }
        }
        conversation.push(ChatMessage::user(text.to_string()));

        let params = CallParams { model, temperature: settings.temperature, max_tokens: settings.max_tokens.unwrap_or(1024) };
        let tool_defs = tools::definitions();

        job.transition(JobState::LlmCall);
        let started = Instant::now();
        let mut rounds = 0u32;
        let final_text = loop {
            if started.elapsed() > TOOL_LOOP_WALL_CLOCK_BUDGET {
                break CANNED_BUDGET_EXCEEDED.to_string();
            }

            let outcome = match self.call_llm(client.as_ref(), &conversation, &tool_defs, &params).await {
                Ok(outcome) => outcome,
                Err(e) => return self.handle_provider_error(user_id, sender_jid, &mut job, e).await,
            };

            match outcome {
                ChatOutcome::Message(text) => break text,
                ChatOutcome::ToolCalls(calls) => {
                    job.transition(JobState::ToolCall);
                    rounds += 1;
                    if rounds > MAX_TOOL_ROUNDS {
                        break CANNED_BUDGET_EXCEEDED.to_string();
                    }
                    conversation.push(ChatMessage {
                        role: llm::Role::Assistant,
                        content: None,
                        tool_calls: Some(calls.clone()),
                        tool_call_id: None,
                        name: None,
                    });
                    for call in &calls {
                        let args: serde_json::Value = serde_json::from_str(&call.arguments).unwrap_or(serde_json::json!({}));
                        let result = tools::execute(&self.messages, user_id, &call.name, &args)?;
                        conversation.push(ChatMessage::tool_result(call.id.clone(), result.to_string()));
                    }
                    job.transition(JobState::LlmCall);
                }
            }
        };

        job.transition(JobState::StoredReply);
        let session = self.messages.get_or_create_session(user_id, SessionKind::User)?;
        let reply = self.messages.store(
            session.id,
            user_id,
            Direction::Outgoing,
            MessageKind::Text,
            Some(final_text.clone()),
            None,
            self.webhook_from_number.clone(),
            sender_jid.to_string(),
            now_unix(),
            None,
            None,
            None,
            None,
        )?;

        job.transition(JobState::EnqueuedSend);
        self.outbound.enqueue(sender_jid.to_string(), final_text, Some(self.webhook_from_number.clone()), 0, now_unix()).await?;
        let _ = reply;

        job.transition(JobState::Done);
        Ok(())
    }

    /// Runs one LLM call under the §7 provider-error retry policy:
    /// `auth_error` stops immediately, `rate_limited` gets a bounded retry
    /// with jitter, anything else gets exactly one retry before giving up.
    async fn call_llm(
        &self,
        client: &dyn LlmClient,
        conversation: &[ChatMessage],
        tool_defs: &[ToolDefinition],
        params: &CallParams,
    ) -> AppResult<ChatOutcome> {
        let mut rate_limit_attempts = 0u32;
        let mut retried_other = false;
        loop {
            match client.chat_with_tools(conversation, tool_defs, params).await {
                Ok(outcome) => return Ok(outcome),
                Err(e @ AppError::ProviderAuth(_)) => return Err(e),
                Err(e @ AppError::ProviderRateLimited(_)) => {
                    rate_limit_attempts += 1;
                    if rate_limit_attempts > PROVIDER_RATE_LIMIT_MAX_RETRIES {
                        return Err(e);
                    }
                    let jitter = Duration::from_millis(rand::Rng::gen_range(&mut rand::thread_rng(), 0..250));
                    let delay = PROVIDER_RATE_LIMIT_BASE_DELAY * rate_limit_attempts + jitter;
                    tracing::warn!(attempt = rate_limit_attempts, delay_ms = delay.as_millis() as u64, "llm provider rate limited, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) if !retried_other => {
                    retried_other = true;
                    tracing::warn!(error = %e, "llm provider call failed, retrying once");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn handle_provider_error(
        &self,
        user_id: i32,
        sender_jid: &str,
        job: &mut JobTracker,
        error: AppError,
    ) -> AppResult<()> {
        let canned = match error {
            AppError::ProviderAuth(_) => CANNED_PROVIDER_AUTH_FAILURE,
            _ => CANNED_PROVIDER_FAILURE,
        };
        job.fail(&error.to_string());
        self.reply_with_canned(user_id, sender_jid, canned).await?;
        Ok(())
    }

    /// A canned reply is still a reply: persisted as OUTGOING with
    /// `delivery_status = FAILED` (marking the underlying turn as a
    /// failure, per §4.6 step 1 and §7) and enqueued for an actual send so
    /// the user receives the explanatory text.
    async fn reply_with_canned(&self, user_id: i32, sender_jid: &str, text: &str) -> AppResult<()> {
        let session = self.messages.get_or_create_session(user_id, SessionKind::User)?;
        self.messages.store(
            session.id,
            user_id,
            Direction::Outgoing,
            MessageKind::Text,
            Some(text.to_string()),
            None,
            self.webhook_from_number.clone(),
            sender_jid.to_string(),
            now_unix(),
            None,
            None,
            None,
            Some(DeliveryStatus::Failed),
        )?;
        self.outbound
            .enqueue(sender_jid.to_string(), text.to_string(), Some(self.webhook_from_number.clone()), 0, now_unix())
            .await?;
        Ok(())
    }
}

struct AgentJob {
    user_id: i32,
    message_id: i32,
    sender_jid: String,
    text: String,
}

/// Fans inbound agent jobs out across `N` workers, hashing by `user_id` so a
/// single user's messages are always handled by the same worker and thus
/// processed in arrival order (§5 per-user ordering guarantee).
#[derive(Clone)]
pub struct AgentWorkerPool {
    senders: Vec<mpsc::UnboundedSender<AgentJob>>,
}

impl AgentWorkerPool {
    pub fn spawn(orchestrator: Arc<AgentOrchestrator>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let mut senders = Vec::with_capacity(worker_count);
        for shard in 0..worker_count {
            let (tx, mut rx) = mpsc::unbounded_channel::<AgentJob>();
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    if let Err(e) = orchestrator.process(job.user_id, job.message_id, &job.sender_jid, &job.text).await {
                        tracing::error!(shard, message_id = job.message_id, error = %e, "agent job failed");
                    }
                }
            });
            senders.push(tx);
        }
        AgentWorkerPool { senders }
    }

    pub fn dispatch(&self, user_id: i32, message_id: i32, sender_jid: String, text: String) {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        let shard = (hasher.finish() as usize) % self.senders.len();
        let _ = self.senders[shard].send(AgentJob { user_id, message_id, sender_jid, text });
    }
}
