pub mod auth_code;
pub mod llm_config;
pub mod message;
pub mod session;
pub mod user;

pub use auth_code::{AuthCode, NewAuthCode};
pub use llm_config::{LlmConfig, LlmProvider, ModelSettings, NewLlmConfig};
pub use message::{DeliveryStatus, Direction, Message, MessageKind, NewMessage};
pub use session::{NewSession, Session, SessionKind, SessionStatus};
pub use user::{NewUser, User};
