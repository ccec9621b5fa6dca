use async_trait::async_trait;

use crate::semantics::{ArgValue, ClassifiedCommand, ValueCategory};

use super::context::{ContextCore, DialogueContext, Turn};
use super::default::DefaultContext;

const INITIALIZED_PREF: &str = "valet-initialized";
const NAME_PREF: &str = "valet-name";

const COMPANION_APP_ID: &str = "app-ValetPopulateDatabase";
const COMPANION_APP_DESCRIPTION: &str =
    "Fills the Valet database with data from your IoT devices";
const COMPANION_APP_CODE: &str = "ValetPopulateDatabase() {\
     extern Weight : (Date, Measure(kg));\
     extern Height : (Date, Measure(kg));\
     extern Gender : (String);\
     extern DateOfBirth : (Date);\
     @(type=\"scale\").source(t, w) => Weight(t, w);\
     }";

const DOB_KEYWORD: &str = "DateOfBirth";
const GENDER_KEYWORD: &str = "Gender";

/// Onboarding: a fixed, idempotent checklist — display name, companion data
/// app, date of birth, gender. Each step skips itself once satisfied;
/// re-running the checklist with no new answer re-asks the same question
/// without repeating side effects.
pub struct InitializationContext {
    core: ContextCore,
    app_ok: bool,
    has_app: bool,
    name: Option<String>,
    tentative_name: Option<String>,
    dob_ok: bool,
    gender_ok: bool,
}

impl InitializationContext {
    pub fn new() -> Self {
        Self {
            core: ContextCore::default(),
            app_ok: false,
            has_app: false,
            name: None,
            tentative_name: None,
            dob_ok: false,
            gender_ok: false,
        }
    }

    /// Returns true when the name step had to ask something.
    async fn check_name(&mut self, turn: &mut Turn) -> bool {
        if self.name.is_some() {
            return false;
        }
        if let Some(name) = turn.services.prefs.get(NAME_PREF) {
            self.name = Some(name);
            return false;
        }

        match turn.services.identity.self_display_name().await {
            Ok(name) => {
                let question = format!("Can I call you {}?", name);
                self.tentative_name = Some(name);
                self.core.ask(turn, ValueCategory::YesNo, &question)
            }
            Err(err) => {
                tracing::debug!(error = %err, "identity lookup failed");
                self.core
                    .ask(turn, ValueCategory::RawString, "What's your name?")
            }
        }
    }

    fn check_companion_app(&mut self, turn: &mut Turn) -> bool {
        if self.app_ok {
            return false;
        }
        if turn.services.apps.has_app(COMPANION_APP_ID) {
            self.app_ok = true;
            self.has_app = true;
            return false;
        }

        turn.reply("It looks like you're not storing your personal information in the database yet.");
        self.core
            .ask(turn, ValueCategory::YesNo, "Would you like me to do so?")
    }

    async fn check_dob(&mut self, turn: &mut Turn) -> bool {
        if self.dob_ok || !self.has_app {
            return false;
        }
        if self.keyword_present(DOB_KEYWORD, turn).await {
            self.dob_ok = true;
            return false;
        }

        self.core
            .ask(turn, ValueCategory::Date, "When were you born?");
        turn.reply("(You can say no at any time and I will stop asking you questions)");
        true
    }

    async fn check_gender(&mut self, turn: &mut Turn) -> bool {
        if self.gender_ok || !self.has_app {
            return false;
        }
        if self.keyword_present(GENDER_KEYWORD, turn).await {
            self.gender_ok = true;
            return false;
        }

        self.core.ask(
            turn,
            ValueCategory::Number,
            "Are you male or female? Say 1 for male or 2 for female.",
        )
    }

    async fn keyword_present(&mut self, key: &str, turn: &mut Turn) -> bool {
        match turn.services.keywords.open(key).await {
            Ok(handle) => {
                let present = handle.value().is_some();
                handle.close().await;
                present
            }
            Err(err) => {
                // An unreachable store should not wedge onboarding; treat
                // the field as present and move on.
                tracing::warn!(keyword = key, error = %err, "keyword store unavailable");
                true
            }
        }
    }

    async fn store_keyword(&mut self, key: &str, value: ArgValue, turn: &mut Turn) {
        match turn.services.keywords.open(key).await {
            Ok(mut handle) => {
                if let Err(err) = handle.set(value).await {
                    tracing::warn!(keyword = key, error = %err, "keyword write failed");
                }
                handle.close().await;
            }
            Err(err) => {
                tracing::warn!(keyword = key, error = %err, "keyword store unavailable");
            }
        }
    }

    /// Returns true when the name confirmation consumed the command.
    fn handle_name_response(&mut self, command: &ClassifiedCommand, turn: &mut Turn) -> bool {
        match command {
            ClassifiedCommand::Affirm => {
                let name = self.tentative_name.take().unwrap_or_default();
                turn.services.prefs.set(NAME_PREF, &name);
                turn.reply(format!("Hi {}, nice to meet you.", name));
                self.name = Some(name);
                self.core.satisfied(turn);
                false
            }
            _ => self
                .core
                .ask(turn, ValueCategory::RawString, "Ok, what's your name then?"),
        }
    }

    /// Returns true when the companion-app question consumed the command and
    /// ended the turn.
    async fn handle_app_response(&mut self, command: &ClassifiedCommand, turn: &mut Turn) -> bool {
        self.app_ok = true;
        self.core.satisfied(turn);

        if matches!(command, ClassifiedCommand::Affirm) {
            self.has_app = true;
            if let Err(err) = turn
                .services
                .apps
                .load_app(COMPANION_APP_ID, COMPANION_APP_CODE, COMPANION_APP_DESCRIPTION)
                .await
            {
                tracing::warn!(error = %err, "companion app install failed");
            }
        } else {
            self.has_app = false;
        }
        false
    }

    async fn continue_checklist(&mut self, turn: &mut Turn) -> bool {
        if self.check_name(turn).await {
            return true;
        }
        if self.check_companion_app(turn) {
            return true;
        }
        if self.check_dob(turn).await {
            return true;
        }
        if self.check_gender(turn).await {
            return true;
        }

        turn.reply("Ok, now I'm ready to use all my magic powers to help you.");
        turn.replace(Box::new(DefaultContext::new()));
        true
    }
}

#[async_trait]
impl DialogueContext for InitializationContext {
    fn name(&self) -> &'static str {
        "InitializationContext"
    }

    fn core(&mut self) -> &mut ContextCore {
        &mut self.core
    }

    fn core_ref(&self) -> &ContextCore {
        &self.core
    }

    async fn start(&mut self, turn: &mut Turn) {
        if turn.services.prefs.get(INITIALIZED_PREF).is_some() {
            turn.replace(Box::new(DefaultContext::new()));
            return;
        }
        turn.services.prefs.set(INITIALIZED_PREF, "true");
        turn.reply("Hello! My name is Valet, and I'm your virtual assistant.");
        self.continue_checklist(turn).await;
    }

    async fn handle(&mut self, command: &ClassifiedCommand, turn: &mut Turn) -> bool {
        if self.handle_generic(command, turn).await {
            return true;
        }

        if self.core.expecting == Some(ValueCategory::YesNo) {
            if self.name.is_none() {
                if self.handle_name_response(command, turn) {
                    return true;
                }
            } else if !self.app_ok {
                self.handle_app_response(command, turn).await;
            }
        } else if self.core.expecting == Some(ValueCategory::Date) {
            if let ClassifiedCommand::Value(_, value) = command {
                self.store_keyword(DOB_KEYWORD, value.clone(), turn).await;
                self.dob_ok = true;
                self.core.satisfied(turn);
            }
        } else if self.core.expecting == Some(ValueCategory::Number) {
            if let ClassifiedCommand::Value(_, value) = command {
                self.store_keyword(GENDER_KEYWORD, value.clone(), turn).await;
                self.gender_ok = true;
                self.core.satisfied(turn);
            }
        }

        self.continue_checklist(turn).await
    }

    async fn handle_raw(&mut self, raw: &str, turn: &mut Turn) -> bool {
        if self.core.expecting == Some(ValueCategory::RawString) && self.name.is_none() {
            turn.services.prefs.set(NAME_PREF, raw);
            turn.reply(format!("Hi {}, nice to meet you.", raw));
            self.name = Some(raw.to_string());
            self.core.satisfied(turn);
            return self.continue_checklist(turn).await;
        }
        if let Some(child) = self.core.child.as_mut() {
            return child.handle_raw(raw, turn).await;
        }
        super::context::confused(turn)
    }
}
