use chrono::NaiveDate;
use valet::semantics::{ActionCatalog, ArgValue};
use valet::services::memory::{BufferSink, MemoryPlatform, StaticIdentity};
use valet::services::{AppRegistry, PreferenceStore};
use valet::ConversationManager;

const GREETING: &str = "Hello! My name is Valet, and I'm your virtual assistant.";
const READY: &str = "Ok, now I'm ready to use all my magic powers to help you.";
const COMPANION_APP_ID: &str = "app-ValetPopulateDatabase";

async fn boot(platform: &MemoryPlatform) -> (ConversationManager, BufferSink) {
    let sink = BufferSink::new();
    let mut manager = ConversationManager::new(platform.services(), ActionCatalog::builtin());
    manager.attach_sink(Box::new(sink.clone())).await;
    manager.start().await;
    (manager, sink)
}

#[tokio::test]
async fn full_onboarding_walkthrough() {
    let platform = MemoryPlatform::new(StaticIdentity::new("Alice"));
    let (mut manager, sink) = boot(&platform).await;

    assert_eq!(sink.messages(), vec![GREETING, "Can I call you Alice?"]);
    assert_eq!(manager.context_name(), "InitializationContext");

    sink.clear();
    manager.handle_command("tt:root.special.yes").await;
    assert_eq!(
        sink.messages(),
        vec![
            "Hi Alice, nice to meet you.",
            "It looks like you're not storing your personal information in the database yet.",
            "Would you like me to do so?"
        ]
    );
    assert_eq!(
        platform.prefs.get("valet-name").as_deref(),
        Some("Alice")
    );

    sink.clear();
    manager.handle_command("tt:root.special.yes").await;
    assert_eq!(
        sink.messages(),
        vec![
            "When were you born?",
            "(You can say no at any time and I will stop asking you questions)"
        ]
    );
    assert_eq!(platform.apps.load_count(), 1);
    assert!(platform.apps.has_app(COMPANION_APP_ID));

    sink.clear();
    manager
        .handle_command("(tt:root.token.value (date 1990 6 21))")
        .await;
    assert_eq!(
        sink.messages(),
        vec!["Are you male or female? Say 1 for male or 2 for female."]
    );
    assert_eq!(
        platform.keywords.peek("DateOfBirth"),
        Some(ArgValue::Date(NaiveDate::from_ymd_opt(1990, 6, 21).unwrap()))
    );

    sink.clear();
    manager
        .handle_command("(tt:root.token.value (number 2))")
        .await;
    assert_eq!(sink.messages(), vec![READY]);
    assert_eq!(platform.keywords.peek("Gender"), Some(ArgValue::Number(2.0)));
    assert_eq!(manager.context_name(), "DefaultContext");
}

#[tokio::test]
async fn already_initialized_sessions_skip_onboarding() {
    let platform = MemoryPlatform::new(StaticIdentity::new("Alice"));
    platform.prefs.set("valet-initialized", "true");
    let (manager, sink) = boot(&platform).await;

    assert!(sink.messages().is_empty());
    assert_eq!(manager.context_name(), "DefaultContext");
}

#[tokio::test]
async fn satisfied_steps_are_skipped() {
    let platform = MemoryPlatform::new(StaticIdentity::new("Alice"));
    platform.prefs.set("valet-name", "Bob");
    platform
        .apps
        .install(COMPANION_APP_ID, "Fills the Valet database");
    platform.keywords.put(
        "DateOfBirth",
        ArgValue::Date(NaiveDate::from_ymd_opt(1984, 12, 3).unwrap()),
    );
    platform.keywords.put("Gender", ArgValue::Number(1.0));

    let (manager, sink) = boot(&platform).await;
    assert_eq!(sink.messages(), vec![GREETING, READY]);
    assert_eq!(manager.context_name(), "DefaultContext");
    assert_eq!(platform.apps.load_count(), 0);
}

#[tokio::test]
async fn denied_name_is_asked_as_free_text() {
    let platform = MemoryPlatform::new(StaticIdentity::new("Alice"));
    let (mut manager, sink) = boot(&platform).await;
    sink.clear();

    manager.handle_command("tt:root.special.no").await;
    assert_eq!(sink.messages(), vec!["Ok, what's your name then?"]);
    assert!(manager.raw_mode());

    sink.clear();
    manager.handle_command("Bob").await;
    assert_eq!(
        sink.messages(),
        vec![
            "Hi Bob, nice to meet you.",
            "It looks like you're not storing your personal information in the database yet.",
            "Would you like me to do so?"
        ]
    );
    assert_eq!(platform.prefs.get("valet-name").as_deref(), Some("Bob"));
}

#[tokio::test]
async fn unavailable_identity_falls_back_to_free_text() {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    let (manager, sink) = boot(&platform).await;

    assert_eq!(sink.messages(), vec![GREETING, "What's your name?"]);
    assert!(manager.raw_mode());
}

#[tokio::test]
async fn declined_companion_app_skips_personal_questions() {
    let platform = MemoryPlatform::new(StaticIdentity::new("Alice"));
    let (mut manager, sink) = boot(&platform).await;

    manager.handle_command("tt:root.special.yes").await;
    sink.clear();
    manager.handle_command("tt:root.special.no").await;

    assert_eq!(sink.messages(), vec![READY]);
    assert_eq!(manager.context_name(), "DefaultContext");
    assert_eq!(platform.apps.load_count(), 0);
    assert_eq!(platform.keywords.peek("DateOfBirth"), None);
    assert_eq!(platform.keywords.peek("Gender"), None);
}

#[tokio::test]
async fn mismatched_answers_do_not_advance_the_checklist() {
    let platform = MemoryPlatform::new(StaticIdentity::new("Alice"));
    let (mut manager, sink) = boot(&platform).await;
    sink.clear();

    manager
        .handle_command("(tt:root.token.value (number 7))")
        .await;
    assert_eq!(sink.messages(), vec!["Just answer yes or no."]);

    // Still waiting on the same question, with no repeated side effects.
    sink.clear();
    manager.handle_command("tt:root.special.debug").await;
    assert_eq!(
        sink.messages(),
        vec![
            "This is a InitializationContext",
            "I'm expecting a yes/no answer"
        ]
    );
    assert_eq!(platform.prefs.get("valet-name"), None);

    sink.clear();
    manager.handle_command("tt:root.special.yes").await;
    assert_eq!(
        platform.prefs.get("valet-name").as_deref(),
        Some("Alice")
    );
}
