pub mod agent;
pub mod auth_middleware;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod jwt;
pub mod llm;
pub mod models;
pub mod queue;
pub mod reconcile;
pub mod repositories;
pub mod schema;
pub mod services;
pub mod supervisor;
pub mod util;
pub mod vault;
pub mod webhook;

use std::sync::Arc;

use diesel::r2d2::{self, ConnectionManager};
use diesel::SqliteConnection;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::RateLimiter;

use agent::AgentWorkerPool;
use bridge::BridgeClient;
use config::Config;
use queue::OutboundQueue;
use repositories::{AuthCodeRepository, LlmConfigRepository, SessionRepository, UserRepository};
use services::MessageService;
use vault::Vault;

pub type DbPool = r2d2::Pool<ConnectionManager<SqliteConnection>>;

pub const MIGRATIONS: diesel_migrations::EmbeddedMigrations = diesel_migrations::embed_migrations!("migrations");

pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Everything a handler or middleware needs, wired once at startup by
/// `supervisor::bootstrap` and shared behind an `Arc` across the router.
pub struct AppState {
    pub config: Config,
    pub pool: DbPool,
    pub users: UserRepository,
    pub sessions: SessionRepository,
    pub auth_codes: AuthCodeRepository,
    pub llm_configs: LlmConfigRepository,
    pub messages: MessageService,
    pub vault: Vault,
    pub bridge: BridgeClient,
    pub outbound: OutboundQueue,
    pub agent_pool: Arc<AgentWorkerPool>,
    /// Keyed by phone number; 3 auth-code requests per hour (§C10 rate
    /// limiting; mirrors the login/OTP limiters the dashboard endpoints use).
    pub request_code_limiter: KeyedLimiter,
}
