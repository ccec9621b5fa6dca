pub mod dialogue;
pub mod grammar;
pub mod semantics;
pub mod services;

pub use dialogue::ConversationManager;
