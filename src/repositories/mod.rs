pub mod auth_codes;
pub mod llm_configs;
pub mod messages;
pub mod sessions;
pub mod users;

pub use auth_codes::AuthCodeRepository;
pub use llm_configs::LlmConfigRepository;
pub use messages::MessageRepository;
pub use sessions::SessionRepository;
pub use users::UserRepository;
