use async_trait::async_trait;

use crate::semantics::ClassifiedCommand;

use super::action::ActionContext;
use super::context::{ContextCore, DialogueContext, Turn};

/// The idle context: small talk, notifications, and handing actions off to a
/// fresh [`ActionContext`].
#[derive(Default)]
pub struct DefaultContext {
    core: ContextCore,
}

impl DefaultContext {
    pub fn new() -> Self {
        Self::default()
    }
}

fn render_payload(payload: &serde_json::Value) -> String {
    match payload {
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(", "),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl DialogueContext for DefaultContext {
    fn name(&self) -> &'static str {
        "DefaultContext"
    }

    fn core(&mut self) -> &mut ContextCore {
        &mut self.core
    }

    fn core_ref(&self) -> &ContextCore {
        &self.core
    }

    fn notify(&mut self, source: &str, payload: &serde_json::Value, turn: &mut Turn) -> bool {
        // Notifications from sources the app registry no longer knows are
        // dropped, matching the lifetime of the app that raised them.
        if let Some(app) = turn.services.apps.describe(source) {
            turn.reply(format!(
                "Notification from {}: {}",
                app,
                render_payload(payload)
            ));
        }
        true
    }

    async fn handle(&mut self, command: &ClassifiedCommand, turn: &mut Turn) -> bool {
        if self.handle_generic(command, turn).await {
            return true;
        }

        match command {
            ClassifiedCommand::Affirm => {
                turn.reply("I agree, but to what?");
                true
            }
            ClassifiedCommand::Deny => {
                turn.reply("No way!");
                true
            }
            ClassifiedCommand::Action(_) => {
                turn.replace_with(Box::new(ActionContext::new(true)), command.clone());
                true
            }
            _ => false,
        }
    }
}
