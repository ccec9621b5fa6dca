pub mod action;
pub mod context;
pub mod default;
pub mod init;
pub mod manager;

pub use context::{ContextCore, DialogueContext, Turn};
pub use manager::ConversationManager;
