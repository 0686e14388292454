/// Per-job lifecycle (§4.6.2). Not persisted; exists to make the
/// orchestrator's control flow and logging match the documented machine
/// instead of being implicit in the code's call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Received,
    StoredIncoming,
    LlmCall,
    ToolCall,
    StoredReply,
    EnqueuedSend,
    Done,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Received => "RECEIVED",
            JobState::StoredIncoming => "STORED_INCOMING",
            JobState::LlmCall => "LLM_CALL",
            JobState::ToolCall => "TOOL_CALL",
            JobState::StoredReply => "STORED_REPLY",
            JobState::EnqueuedSend => "ENQUEUED_SEND",
            JobState::Done => "DONE",
            JobState::Failed => "FAILED",
        }
    }
}

/// Tracks and logs the current state of one orchestrator run.
pub struct JobTracker {
    message_id: i32,
    state: JobState,
}

impl JobTracker {
    pub fn new(message_id: i32) -> Self {
        let tracker = JobTracker { message_id, state: JobState::Received };
        tracker.log();
        tracker
    }

    pub fn transition(&mut self, next: JobState) {
        self.state = next;
        self.log();
    }

    pub fn fail(&mut self, reason: &str) {
        self.state = JobState::Failed;
        tracing::warn!(message_id = self.message_id, reason, "agent job failed");
    }

    fn log(&self) {
        tracing::debug!(message_id = self.message_id, state = self.state.as_str(), "agent job state");
    }
}
