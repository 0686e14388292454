use std::sync::Arc;

use crate::agent::AgentWorkerPool;
use crate::error::AppResult;
use crate::services::MessageService;

/// Startup crash recovery (§8 scenario 6): an incoming TEXT message can be
/// stored and then never make it into an agent job if the process dies
/// between the webhook's store and its dispatch call. Replays any such
/// orphan through the agent pool exactly as the webhook would have.
pub fn replay_orphaned_incoming(
    messages: &MessageService,
    agent_pool: &Arc<AgentWorkerPool>,
    within_secs: i64,
) -> AppResult<u64> {
    let orphans = messages.orphaned_incoming(within_secs)?;
    let count = orphans.len() as u64;
    for message in orphans {
        let Some(content) = message.content.clone() else { continue };
        tracing::info!(message_id = message.id, user_id = message.user_id, "replaying orphaned incoming message");
        agent_pool.dispatch(message.user_id, message.id, message.sender_jid.clone(), content);
    }
    if count > 0 {
        tracing::warn!(count, "replayed orphaned incoming messages on startup");
    }
    Ok(count)
}
