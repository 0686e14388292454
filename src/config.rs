use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw {
            "production" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }
}

/// Process-wide typed configuration, loaded once at startup. Nothing else in
/// the crate reads `std::env` directly outside of this module and `vault.rs`
/// (the vault key is read lazily so tests can set it per-process).
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub database_url: String,
    pub queue_redis_url: String,
    pub queue_key_prefix: String,
    pub bridge_base_url: String,
    pub bridge_timeout: Duration,
    pub bridge_connect_timeout: Duration,
    pub webhook_base_url: String,
    pub webhook_secret: Option<String>,
    pub vault_key_base64: String,
    pub admin_jwt_secret: String,
    pub user_jwt_secret: String,
    pub admin_jwt_ttl: Duration,
    pub user_jwt_ttl: Duration,
    pub worker_count: usize,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub visibility_timeout: Duration,
    pub health_probe_interval: Duration,
    pub cors_origins: Vec<String>,
    pub integration_tests_enabled: bool,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let environment = Environment::parse(&env_or("ENVIRONMENT", "development"));

        let vault_key_base64 = require_env("VAULT_KEY")?;
        let decoded_len = base64::Engine::decode(
            &base64::engine::general_purpose::STANDARD,
            vault_key_base64.as_bytes(),
        )
        .map_err(|e| format!("VAULT_KEY is not valid base64: {e}"))?
        .len();
        if decoded_len < 32 {
            return Err("VAULT_KEY must decode to at least 32 bytes".into());
        }

        let admin_jwt_secret = require_env("ADMIN_JWT_SECRET")?;
        reject_short_secret("ADMIN_JWT_SECRET", &admin_jwt_secret)?;
        let user_jwt_secret = require_env("USER_JWT_SECRET")?;
        reject_short_secret("USER_JWT_SECRET", &user_jwt_secret)?;

        let webhook_secret = std::env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
        if let Some(ref secret) = webhook_secret {
            reject_short_secret("WEBHOOK_SECRET", secret)?;
        }

        Ok(Config {
            environment,
            database_url: require_env("DATABASE_URL")?,
            queue_redis_url: env_or("QUEUE_REDIS_URL", "redis://127.0.0.1:6379"),
            queue_key_prefix: env_or("QUEUE_KEY_PREFIX", "zapa:outbound"),
            bridge_base_url: require_env("BRIDGE_URL")?,
            bridge_timeout: Duration::from_secs(env_u64("BRIDGE_TIMEOUT_SECS", 30)),
            bridge_connect_timeout: Duration::from_secs(env_u64("BRIDGE_CONNECT_TIMEOUT_SECS", 5)),
            webhook_base_url: require_env("WEBHOOK_BASE_URL")?,
            webhook_secret,
            vault_key_base64,
            admin_jwt_secret,
            user_jwt_secret,
            admin_jwt_ttl: Duration::from_secs(env_u64("ADMIN_JWT_TTL_SECS", 3600)),
            user_jwt_ttl: Duration::from_secs(env_u64("USER_JWT_TTL_SECS", 24 * 3600)),
            worker_count: env_u64("QUEUE_WORKER_COUNT", 1) as usize,
            max_retries: env_u64("QUEUE_MAX_RETRIES", 3) as u32,
            retry_base_delay: Duration::from_secs(env_u64("QUEUE_RETRY_BASE_SECS", 5)),
            visibility_timeout: Duration::from_secs(env_u64("QUEUE_VISIBILITY_TIMEOUT_SECS", 300)),
            health_probe_interval: Duration::from_secs(env_u64("HEALTH_PROBE_INTERVAL_SECS", 30)),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:8080")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            integration_tests_enabled: env_or("INTEGRATION_TESTS", "false") == "true",
            port: env_u64("PORT", 3000) as u16,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn require_env(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("{key} must be set"))
}

fn reject_short_secret(name: &str, value: &str) -> Result<(), String> {
    if value.len() < 32 {
        return Err(format!("{name} must be at least 32 bytes"));
    }
    Ok(())
}
