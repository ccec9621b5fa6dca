use std::collections::VecDeque;
use std::sync::Arc;

use crate::grammar;
use crate::semantics::{analyze, ActionCatalog, ClassifiedCommand};
use crate::services::{OutputSink, Services};

use super::context::{DialogueContext, Turn, FAIL_REPLY};
use super::default::DefaultContext;
use super::init::InitializationContext;

/// An out-of-band event from the surrounding system, delivered to the active
/// context or queued until a sink is attached.
#[derive(Debug, Clone)]
pub struct Notification {
    pub source: String,
    pub payload: serde_json::Value,
}

/// Session-scoped owner of the conversation: routes inbound text to the
/// active context, applies the effects each dispatch produced, and manages
/// the notification queue and raw-input mode.
pub struct ConversationManager {
    services: Services,
    catalog: Arc<ActionCatalog>,
    context: Box<dyn DialogueContext>,
    raw_mode: bool,
    sink: Option<Box<dyn OutputSink>>,
    queue: VecDeque<Notification>,
}

impl ConversationManager {
    pub fn new(services: Services, catalog: ActionCatalog) -> Self {
        Self {
            services,
            catalog: Arc::new(catalog),
            context: Box::new(DefaultContext::new()),
            raw_mode: false,
            sink: None,
            queue: VecDeque::new(),
        }
    }

    /// Begin the session with the onboarding checklist. Already-initialized
    /// sessions fall straight through to the default context.
    pub async fn start(&mut self) {
        let mut turn = Turn::new(self.services.clone());
        turn.replace(Box::new(InitializationContext::new()));
        self.apply(turn).await;
    }

    pub fn context_name(&self) -> &'static str {
        self.context.name()
    }

    pub fn raw_mode(&self) -> bool {
        self.raw_mode
    }

    pub fn queued_notifications(&self) -> usize {
        self.queue.len()
    }

    /// Route one inbound command. In raw mode the text bypasses the
    /// parse/classify pipeline entirely and reaches the context untouched.
    /// Parse and classification failures never escape; they become the
    /// generic failure reply.
    pub async fn handle_command(&mut self, text: &str) {
        tracing::info!(command = text, raw = self.raw_mode, "received command");
        let mut turn = Turn::new(self.services.clone());

        let handled = if self.raw_mode {
            self.context.handle_raw(text, &mut turn).await
        } else {
            match self.classify(text) {
                Ok(command) => {
                    tracing::debug!(?command, "classified command");
                    self.context.handle(&command, &mut turn).await
                }
                Err(err) => {
                    tracing::warn!(error = %err, "could not understand command");
                    turn.reply(FAIL_REPLY);
                    true
                }
            }
        };

        if !handled {
            turn.reply(FAIL_REPLY);
            turn.replace(Box::new(DefaultContext::new()));
        }

        self.apply(turn).await;
    }

    fn classify(&self, text: &str) -> anyhow::Result<ClassifiedCommand> {
        let form = grammar::parse(text)?;
        Ok(analyze(&form, &self.catalog)?)
    }

    /// Deliver an out-of-band notification. Without a sink it queues; with
    /// one it is offered to the active context and queued when unhandled.
    pub async fn notify(&mut self, source: &str, payload: serde_json::Value) {
        let notification = Notification {
            source: source.to_string(),
            payload,
        };
        if self.sink.is_none() {
            self.queue.push_back(notification);
            return;
        }

        let mut turn = Turn::new(self.services.clone());
        if !self
            .context
            .notify(&notification.source, &notification.payload, &mut turn)
        {
            self.queue.push_back(notification);
        }
        self.apply(turn).await;
    }

    /// Attach the output sink and flush queued notifications in order.
    pub async fn attach_sink(&mut self, sink: Box<dyn OutputSink>) {
        self.sink = Some(sink);
        let mut turn = Turn::new(self.services.clone());
        self.flush_queue(&mut turn);
        self.apply(turn).await;
    }

    pub fn detach_sink(&mut self) {
        self.sink = None;
    }

    fn flush_queue(&mut self, turn: &mut Turn) {
        let pending: Vec<Notification> = self.queue.drain(..).collect();
        for notification in pending {
            if !self
                .context
                .notify(&notification.source, &notification.payload, turn)
            {
                self.queue.push_back(notification);
            }
        }
    }

    /// Apply the effects a dispatch recorded: raw-mode flips, replies, and
    /// context transitions (including re-dispatch of a carried command and
    /// re-offering queued notifications to the new context).
    async fn apply(&mut self, mut turn: Turn) {
        loop {
            if let Some(raw) = turn.take_raw() {
                self.raw_mode = raw;
            }
            for message in turn.take_replies() {
                self.send(&message);
            }

            let Some(transition) = turn.take_transition() else {
                break;
            };

            let mut next = transition.context;
            tracing::debug!(from = self.context.name(), to = next.name(), "context transition");
            next.start(&mut turn).await;
            self.context = next;

            if let Some(command) = transition.pending {
                if !self.context.handle(&command, &mut turn).await {
                    turn.reply(FAIL_REPLY);
                    turn.replace(Box::new(DefaultContext::new()));
                }
            }

            if self.sink.is_some() {
                self.flush_queue(&mut turn);
            }
        }
    }

    fn send(&self, message: &str) {
        match &self.sink {
            Some(sink) => sink.send(message),
            None => tracing::debug!(message, "dropping reply; no sink attached"),
        }
    }
}
