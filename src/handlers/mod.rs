pub mod admin_handlers;
pub mod auth_handlers;
pub mod integration_handlers;
pub mod llm_config_handlers;
pub mod message_handlers;
