use async_trait::async_trait;

use crate::semantics::{ClassifiedCommand, ValueCategory};
use crate::services::Services;

use super::default::DefaultContext;

pub const FAIL_REPLY: &str = "Sorry, I did not understand that. Can you rephrase it?";
pub const CONFUSED_REPLY: &str = "I'm a little confused, sorry. What were we talking about?";

/// A requested context change, applied by the manager after dispatch returns.
pub struct Transition {
    pub context: Box<dyn DialogueContext>,
    /// Command to re-dispatch once the new context is installed.
    pub pending: Option<ClassifiedCommand>,
}

/// Per-dispatch effect buffer. Contexts never hold a reference back to the
/// manager; everything they want to happen — replies, transitions, raw-mode
/// flips — is recorded here and applied by the manager afterwards.
pub struct Turn {
    pub services: Services,
    replies: Vec<String>,
    transition: Option<Transition>,
    raw_mode: Option<bool>,
}

impl Turn {
    pub fn new(services: Services) -> Self {
        Self {
            services,
            replies: Vec::new(),
            transition: None,
            raw_mode: None,
        }
    }

    pub fn reply(&mut self, message: impl Into<String>) {
        self.replies.push(message.into());
    }

    /// Replace the active context. Raw mode always drops on replace.
    pub fn replace(&mut self, context: Box<dyn DialogueContext>) {
        self.raw_mode = Some(false);
        self.transition = Some(Transition {
            context,
            pending: None,
        });
    }

    /// Replace the active context and re-dispatch a command to it.
    pub fn replace_with(&mut self, context: Box<dyn DialogueContext>, command: ClassifiedCommand) {
        self.raw_mode = Some(false);
        self.transition = Some(Transition {
            context,
            pending: Some(command),
        });
    }

    pub fn set_raw(&mut self, raw: bool) {
        self.raw_mode = Some(raw);
    }

    pub(crate) fn take_replies(&mut self) -> Vec<String> {
        std::mem::take(&mut self.replies)
    }

    pub(crate) fn take_transition(&mut self) -> Option<Transition> {
        self.transition.take()
    }

    pub(crate) fn take_raw(&mut self) -> Option<bool> {
        self.raw_mode.take()
    }
}

/// State every dialogue context carries: what it is waiting for, the question
/// it asked, and an optional nested sub-conversation (at most one, forming a
/// shallow chain).
#[derive(Default)]
pub struct ContextCore {
    pub expecting: Option<ValueCategory>,
    pub question: Option<String>,
    pub child: Option<Box<dyn DialogueContext>>,
}

impl ContextCore {
    pub fn expect(&mut self, turn: &mut Turn, category: Option<ValueCategory>) {
        self.expecting = category;
        turn.set_raw(category == Some(ValueCategory::RawString));
    }

    /// Ask a question and record what kind of answer satisfies it. Always
    /// reports the command as handled.
    pub fn ask(&mut self, turn: &mut Turn, category: ValueCategory, question: &str) -> bool {
        self.question = Some(question.to_string());
        self.expect(turn, Some(category));
        turn.reply(question);
        true
    }

    /// Clear the current expectation after an answer was consumed.
    pub fn satisfied(&mut self, turn: &mut Turn) {
        self.question = None;
        self.expect(turn, None);
    }

    /// Install a nested sub-conversation; this context regains control once
    /// the child stops handling commands.
    pub fn descend(&mut self, turn: &mut Turn, child: Box<dyn DialogueContext>) {
        turn.set_raw(false);
        self.child = Some(child);
    }
}

/// Reply "Ok forget it" and go back to idle.
pub fn reset(turn: &mut Turn) -> bool {
    turn.reply("Ok forget it");
    turn.replace(Box::new(DefaultContext::new()));
    true
}

/// Acknowledge completion and go back to idle.
pub fn done(turn: &mut Turn) -> bool {
    turn.reply("Consider it done");
    turn.replace(Box::new(DefaultContext::new()));
    true
}

/// Admit confusion and go back to idle.
pub fn confused(turn: &mut Turn) -> bool {
    turn.reply(CONFUSED_REPLY);
    turn.replace(Box::new(DefaultContext::new()));
    true
}

/// One unit of conversation state. Concrete variants are a sealed set:
/// default (idle), action elicitation, and onboarding.
#[async_trait]
pub trait DialogueContext: Send {
    fn name(&self) -> &'static str;
    fn core(&mut self) -> &mut ContextCore;
    fn core_ref(&self) -> &ContextCore;

    /// Side effects to run when the context becomes active.
    async fn start(&mut self, _turn: &mut Turn) {}

    /// Handle a classified command. Returns whether it was handled; the
    /// manager converts an unhandled command into a confusion reply.
    async fn handle(&mut self, command: &ClassifiedCommand, turn: &mut Turn) -> bool;

    /// Handle untokenized raw input, routed here while raw mode is on.
    async fn handle_raw(&mut self, raw: &str, turn: &mut Turn) -> bool {
        if let Some(child) = self.core().child.as_mut() {
            return child.handle_raw(raw, turn).await;
        }
        confused(turn)
    }

    /// Out-of-band notification hook. Contexts that do not override it
    /// report the notification as unhandled.
    fn notify(&mut self, _source: &str, _payload: &serde_json::Value, _turn: &mut Turn) -> bool {
        false
    }

    /// Shared dispatch steps every variant runs first: offer the command to
    /// the child context, answer special commands, and police mismatches
    /// against the current expectation.
    async fn handle_generic(&mut self, command: &ClassifiedCommand, turn: &mut Turn) -> bool {
        if let Some(child) = self.core().child.as_mut() {
            if child.handle(command, turn).await {
                return true;
            }
        }

        if let ClassifiedCommand::Special(name) = command {
            self.handle_special(name, turn);
            return true;
        }

        match self.core_ref().expecting {
            Some(ValueCategory::YesNo) => {
                if matches!(
                    command,
                    ClassifiedCommand::Affirm | ClassifiedCommand::Deny
                ) {
                    return false;
                }
                turn.reply("Just answer yes or no.");
                true
            }
            Some(expected) => match command {
                ClassifiedCommand::Value(category, _) if *category == expected => false,
                ClassifiedCommand::Affirm => {
                    turn.reply("Yes what?");
                    true
                }
                ClassifiedCommand::Deny => reset(turn),
                _ => {
                    turn.reply("That's not what I asked");
                    true
                }
            },
            None => false,
        }
    }

    /// Replies to the fixed system utterances. Unknown specials get the
    /// generic failure reply rather than vanishing.
    fn handle_special(&mut self, name: &str, turn: &mut Turn) {
        match name {
            "hello" => {
                let who = turn
                    .services
                    .prefs
                    .get("valet-name")
                    .unwrap_or_else(|| "there".to_string());
                turn.reply(format!("Hi, {}", who));
            }
            "debug" => {
                turn.reply(format!("This is a {}", self.name()));
                match self.core_ref().expecting {
                    None => turn.reply("I'm not expecting anything"),
                    Some(category) => turn.reply(format!("I'm expecting a {}", category)),
                }
            }
            "help" => {
                turn.reply("Sure! How can I help you?");
                turn.reply(
                    "If you're unsure what to say, I understand most actions and objects. \
                     You can ask me a question and I'll try to answer it.",
                );
                match (self.core_ref().expecting, self.core_ref().question.clone()) {
                    (Some(ValueCategory::YesNo), _) => {
                        turn.reply("At this time, just a yes or no will be fine though.");
                    }
                    (Some(_), Some(question)) => turn.reply(question),
                    _ => {}
                }
            }
            "thankyou" => turn.reply("At your service."),
            "sorry" => {
                turn.reply("No need to be sorry.");
                turn.reply("Unless you're Canadian. Then I won't stop you.");
            }
            "cool" => turn.reply("I know, right?"),
            "nevermind" => {
                reset(turn);
            }
            _ => turn.reply(FAIL_REPLY),
        }
    }
}
