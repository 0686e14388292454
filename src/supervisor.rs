use std::sync::Arc;
use std::time::Duration;

use diesel::RunQueryDsl;

use crate::agent::{AgentOrchestrator, AgentWorkerPool};
use crate::bridge::BridgeClient;
use crate::config::Config;
use crate::models::{SessionKind, SessionStatus};
use crate::queue::OutboundQueue;
use crate::repositories::{AuthCodeRepository, LlmConfigRepository, SessionRepository, UserRepository};
use crate::reconcile;
use crate::services::MessageService;
use crate::vault::Vault;
use crate::{AppState, DbPool};

/// The identity under which the singleton MAIN session lives. The bridge has
/// exactly one WhatsApp connection; its status is modeled as a Session like
/// any other, so it needs an owning `user_id` — this reserved account is
/// that owner, never exposed through the public or admin user listings.
const SYSTEM_ACCOUNT_PHONE: &str = "system:bridge";

/// Zapa runs exactly one WhatsApp session through the bridge; this is its
/// fixed `session_id` on every bridge call.
pub const BRIDGE_SESSION_ID: &str = "main";

/// SQLite only enforces `FOREIGN KEY` constraints (and thus `ON DELETE
/// CASCADE`) on connections that have run `PRAGMA foreign_keys = ON`, and
/// the pragma is per-connection, not per-database. r2d2 hands out pooled
/// connections without running it, so every connection needs this
/// customizer applied at checkout.
#[derive(Debug)]
struct EnableForeignKeys;

impl diesel::r2d2::CustomizeConnection<diesel::SqliteConnection, diesel::r2d2::Error> for EnableForeignKeys {
    fn on_acquire(&self, conn: &mut diesel::SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        diesel::sql_query("PRAGMA foreign_keys = ON")
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

pub struct Bootstrapped {
    pub state: Arc<AppState>,
    pub system_user_id: i32,
}

/// Startup sequence (§4.9): open storage, verify the vault key, stand up
/// the bridge client, point its webhook back at us, ensure the MAIN session
/// exists, then hand back everything `main` needs to start serving traffic
/// and spawn workers. Per §6's exit-code policy, a failure here is reported
/// to the caller rather than calling `std::process::exit` itself — the
/// caller decides whether to treat it as fatal or degrade and continue.
pub async fn bootstrap(config: Config) -> Result<Bootstrapped, String> {
    let manager = diesel::r2d2::ConnectionManager::<diesel::SqliteConnection>::new(&config.database_url);
    let pool: DbPool = diesel::r2d2::Pool::builder()
        .max_size(5)
        .min_idle(Some(1))
        .connection_customizer(Box::new(EnableForeignKeys))
        .build(manager)
        .map_err(|e| format!("failed to open storage: {e}"))?;

    {
        let mut conn = pool.get().map_err(|e| format!("failed to open storage: {e}"))?;
        crate::MIGRATIONS.run_pending_migrations(&mut conn).map_err(|e| format!("failed to run migrations: {e}"))?;
    }

    let vault = Vault::new(&config.vault_key_base64).map_err(|e| format!("failed to load vault key: {e}"))?;

    let users = UserRepository::new(pool.clone());
    let sessions = SessionRepository::new(pool.clone());
    let auth_codes = AuthCodeRepository::new(pool.clone());
    let llm_configs = LlmConfigRepository::new(pool.clone());
    let messages = MessageService::new(crate::repositories::MessageRepository::new(pool.clone()), sessions.clone());

    let bridge = BridgeClient::new(config.bridge_base_url.clone(), config.bridge_timeout, config.bridge_connect_timeout)
        .map_err(|e| format!("failed to build bridge client: {e}"))?;

    if let Err(e) = bridge.configure_webhook(&config.webhook_base_url, config.webhook_secret.as_deref()).await {
        tracing::warn!(error = %e, "bridge unreachable at startup, continuing and marking unhealthy");
    }
    if let Err(e) = bridge.create_session(BRIDGE_SESSION_ID).await {
        tracing::warn!(error = %e, "failed to create bridge session at startup, continuing and marking unhealthy");
    }

    let system_user = users.get_or_create_by_phone(SYSTEM_ACCOUNT_PHONE).map_err(|e| e.to_string())?;
    match sessions.get_or_create(system_user.id, SessionKind::Main) {
        Ok(session) if session.status() == SessionStatus::QrPending => {
            tracing::warn!("bridge MAIN session is QR_PENDING at startup; marking unhealthy until scanned");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "failed to ensure MAIN session exists"),
    }

    let outbound = OutboundQueue::connect(&config.queue_redis_url, config.queue_key_prefix.clone())
        .await
        .map_err(|e| format!("failed to connect to queue backend: {e}"))?;

    if let Err(e) = outbound.recover_stale_processing(crate::util::now_unix(), config.visibility_timeout.as_secs() as i64).await {
        tracing::warn!(error = %e, "failed to recover stale processing queue items");
    }

    let orchestrator = Arc::new(AgentOrchestrator::new(
        messages.clone(),
        llm_configs.clone(),
        vault.clone(),
        outbound.clone(),
        config.webhook_base_url.clone(),
    ));
    let agent_pool = Arc::new(AgentWorkerPool::spawn(orchestrator, config.worker_count));

    if let Ok(replayed) = reconcile::replay_orphaned_incoming(&messages, &agent_pool, 60) {
        if replayed > 0 {
            tracing::warn!(count = replayed, "replayed orphaned incoming messages on startup");
        }
    }

    let request_code_limiter = crate::KeyedLimiter::keyed(crate::handlers::auth_handlers::default_quota());

    let state = Arc::new(AppState {
        config,
        pool,
        users,
        sessions,
        auth_codes,
        llm_configs,
        messages,
        vault,
        bridge,
        outbound,
        agent_pool,
        request_code_limiter,
    });

    Ok(Bootstrapped { state, system_user_id: system_user.id })
}

/// One outbound-send worker: pops the next queued item, sends it through the
/// bridge, and either acks, retries with backoff, or dead-letters it. Runs
/// until `shutdown` resolves; an empty queue sleeps briefly rather than
/// busy-looping.
pub async fn run_outbound_worker(state: Arc<AppState>, worker_id: usize, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            item = state.outbound.pop_next(crate::util::now_unix()) => {
                match item {
                    Ok(Some(mut item)) => send_one(&state, worker_id, &mut item).await,
                    Ok(None) => tokio::time::sleep(Duration::from_millis(500)).await,
                    Err(e) => {
                        tracing::error!(worker_id, error = %e, "queue pop failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}

/// Retries the claimed item in place (§4.7 step 3): it stays in
/// `:processing` and keeps its id across attempts, so `attempts` actually
/// accumulates toward `max_retries` and the backoff actually grows.
async fn send_one(state: &Arc<AppState>, worker_id: usize, item: &mut crate::queue::QueueItem) {
    loop {
        match state.bridge.send_text(BRIDGE_SESSION_ID, &item.to_number, &item.content).await {
            Ok(_) => {
                if let Err(e) = state.outbound.ack_success(item).await {
                    tracing::error!(worker_id, error = %e, "failed to ack successful send");
                }
                return;
            }
            Err(e) => {
                let permanent = matches!(e, crate::error::AppError::NotFound | crate::error::AppError::NotConnected);
                if permanent || item.attempts + 1 >= state.config.max_retries {
                    tracing::error!(worker_id, item_id = %item.id, error = %e, "send failed permanently, dead-lettering");
                    let _ = state.outbound.move_to_dead(item, &e.to_string()).await;
                    return;
                }
                if let Err(record_err) = state.outbound.record_retry(item, &e.to_string()).await {
                    tracing::error!(worker_id, error = %record_err, "failed to persist retry state");
                }
                let delay = state.config.retry_base_delay * item.attempts.max(1);
                tracing::warn!(worker_id, item_id = %item.id, attempt = item.attempts, delay_secs = delay.as_secs(), "send failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Polls the four health components on `health_probe_interval` and logs the
/// aggregate status; `GET /admin/integration/health` runs the same checks
/// synchronously on demand. This loop only exists to get degradations into
/// the logs promptly, not to cache results anywhere.
pub async fn run_health_probe(state: Arc<AppState>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let interval = state.config.health_probe_interval;
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return;
                }
            }
            _ = tokio::time::sleep(interval) => {
                match state.outbound.stats().await {
                    Ok(stats) => tracing::debug!(queued = stats.queued, processing = stats.processing, dead = stats.dead, "health probe: queue depth"),
                    Err(e) => tracing::warn!(error = %e, "health probe: queue backend unreachable"),
                }
            }
        }
    }
}
