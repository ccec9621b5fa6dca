use serde_json::json;
use valet::semantics::{ActionCatalog, ArgValue};
use valet::services::memory::{BufferSink, Invocation, MemoryPlatform, StaticIdentity};
use valet::services::PreferenceStore;
use valet::ConversationManager;

const FAIL_REPLY: &str = "Sorry, I did not understand that. Can you rephrase it?";

/// A manager over the given platform with a buffering sink attached, started
/// straight in the idle context.
async fn session(platform: &MemoryPlatform) -> (ConversationManager, BufferSink) {
    let sink = BufferSink::new();
    let mut manager = ConversationManager::new(platform.services(), ActionCatalog::builtin());
    manager.attach_sink(Box::new(sink.clone())).await;
    (manager, sink)
}

fn platform_with_twitter() -> MemoryPlatform {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    platform
        .devices
        .add_device("twitter", "twitter-1", "Twitter account");
    platform
}

#[tokio::test]
async fn post_elicits_confirms_and_executes() {
    let platform = platform_with_twitter();
    let (mut manager, sink) = session(&platform).await;

    manager.handle_command("(tt:device.action.post)").await;
    assert_eq!(sink.messages(), vec!["What do you want me to tweet?"]);
    assert!(manager.raw_mode(), "free-text answer expected");

    sink.clear();
    manager.handle_command("hello world").await;
    assert_eq!(
        sink.messages(),
        vec!["Ok, so you want me to twitter sink hello world. Is that right?"]
    );
    assert!(!manager.raw_mode());

    sink.clear();
    manager.handle_command("tt:root.special.yes").await;
    assert_eq!(sink.messages(), vec!["Consider it done"]);
    assert_eq!(manager.context_name(), "DefaultContext");

    assert_eq!(
        platform.devices.invocations(),
        vec![Invocation {
            device: "twitter-1".to_string(),
            channel: "sink".to_string(),
            args: vec![ArgValue::Text("hello world".to_string())],
        }]
    );
}

#[tokio::test]
async fn non_answer_at_confirmation_is_rejected() {
    let platform = platform_with_twitter();
    let (mut manager, sink) = session(&platform).await;

    manager.handle_command("(tt:device.action.post)").await;
    manager.handle_command("hi").await;
    sink.clear();

    manager
        .handle_command("(tt:root.token.value (number 3))")
        .await;
    assert_eq!(sink.messages(), vec!["Just answer yes or no."]);
    assert_eq!(manager.context_name(), "ActionContext");
    assert!(platform.devices.invocations().is_empty());

    // The confirmation is still live.
    sink.clear();
    manager.handle_command("tt:root.special.yes").await;
    assert_eq!(sink.messages(), vec!["Consider it done"]);
    assert_eq!(platform.devices.invocations().len(), 1);
}

#[tokio::test]
async fn denied_confirmation_cancels() {
    let platform = platform_with_twitter();
    let (mut manager, sink) = session(&platform).await;

    manager.handle_command("(tt:device.action.post)").await;
    manager.handle_command("hi").await;
    sink.clear();

    manager.handle_command("tt:root.special.no").await;
    assert_eq!(sink.messages(), vec!["Ok forget it"]);
    assert_eq!(manager.context_name(), "DefaultContext");
    assert!(platform.devices.invocations().is_empty());
}

#[tokio::test]
async fn multiple_devices_require_a_pick() {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    platform.devices.add_device("lightbulb", "bulb-1", "Desk lamp");
    platform
        .devices
        .add_device("lightbulb", "bulb-2", "Ceiling light");
    let (mut manager, sink) = session(&platform).await;

    manager
        .handle_command("(tt:device.action.turnon tt:device.lightbulb)")
        .await;
    assert_eq!(
        sink.messages(),
        vec![
            "You have multiple lightbulbs",
            "Do you mean 1) Desk lamp or 2) Ceiling light?"
        ]
    );

    sink.clear();
    manager
        .handle_command("(tt:root.token.value (number 3))")
        .await;
    assert_eq!(
        sink.messages(),
        vec!["Please choose a number between 1 and 2"]
    );

    sink.clear();
    manager
        .handle_command("(tt:root.token.value (number 1))")
        .await;
    assert_eq!(
        sink.messages(),
        vec![
            "You chose Desk lamp",
            "Ok, so you want me to lightbulb setpower true. Is that right?"
        ]
    );

    sink.clear();
    manager.handle_command("tt:root.special.yes").await;
    assert_eq!(sink.messages(), vec!["Consider it done"]);
    assert_eq!(
        platform.devices.invocations(),
        vec![Invocation {
            device: "bulb-1".to_string(),
            channel: "setpower".to_string(),
            args: vec![ArgValue::Bool(true)],
        }]
    );
}

#[tokio::test]
async fn missing_device_kind_aborts() {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    let (mut manager, sink) = session(&platform).await;

    manager
        .handle_command("(tt:device.action.turnon tt:device.tv)")
        .await;
    assert_eq!(sink.messages(), vec!["You don't have a tv"]);
    assert_eq!(manager.context_name(), "DefaultContext");
}

#[tokio::test]
async fn failed_execution_reports_the_error() {
    let platform = platform_with_twitter();
    platform.devices.fail_with("twitter is down");
    let (mut manager, sink) = session(&platform).await;

    manager.handle_command("(tt:device.action.post)").await;
    manager.handle_command("hi").await;
    sink.clear();

    manager.handle_command("tt:root.special.yes").await;
    assert_eq!(
        sink.messages(),
        vec!["Sorry, that did not work: twitter is down"]
    );
    assert_eq!(manager.context_name(), "DefaultContext");
    assert!(platform.devices.invocations().is_empty());
}

#[tokio::test]
async fn parse_errors_get_the_failure_reply() {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    let (mut manager, sink) = session(&platform).await;

    manager.handle_command("((").await;
    assert_eq!(sink.messages(), vec![FAIL_REPLY]);
    assert_eq!(manager.context_name(), "DefaultContext");
}

#[tokio::test]
async fn unexpected_value_gets_the_failure_reply() {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    let (mut manager, sink) = session(&platform).await;

    // A bare value makes no sense while idle.
    manager
        .handle_command("(tt:root.token.value (number 3))")
        .await;
    assert_eq!(sink.messages(), vec![FAIL_REPLY]);
    assert_eq!(manager.context_name(), "DefaultContext");
}

#[tokio::test]
async fn notifications_queue_until_a_sink_attaches() {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    platform.apps.install("app-1", "Weather Station");
    let sink = BufferSink::new();
    let mut manager = ConversationManager::new(platform.services(), ActionCatalog::builtin());

    manager.notify("app-1", json!(["rain", 12])).await;
    assert_eq!(manager.queued_notifications(), 1);

    manager.attach_sink(Box::new(sink.clone())).await;
    assert_eq!(manager.queued_notifications(), 0);
    assert_eq!(
        sink.messages(),
        vec!["Notification from Weather Station: rain, 12"]
    );

    // With the sink attached, notifications arrive immediately.
    sink.clear();
    manager.notify("app-1", json!("sunny")).await;
    assert_eq!(sink.messages(), vec!["Notification from Weather Station: sunny"]);
}

#[tokio::test]
async fn notifications_from_unknown_sources_are_dropped() {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    let (mut manager, sink) = session(&platform).await;

    manager.notify("app-gone", json!("late result")).await;
    assert_eq!(manager.queued_notifications(), 0);
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn small_talk() {
    let platform = MemoryPlatform::new(StaticIdentity::unavailable());
    platform.prefs.set("valet-name", "Bob");
    let (mut manager, sink) = session(&platform).await;

    manager.handle_command("tt:root.special.hello").await;
    manager.handle_command("tt:root.special.thankyou").await;
    manager.handle_command("tt:root.special.yes").await;
    manager.handle_command("tt:root.special.no").await;
    manager.handle_command("tt:root.special.frobnicate").await;
    assert_eq!(
        sink.messages(),
        vec![
            "Hi, Bob",
            "At your service.",
            "I agree, but to what?",
            "No way!",
            FAIL_REPLY,
        ]
    );
}
