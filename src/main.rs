use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use valet::semantics::ActionCatalog;
use valet::services::memory::{MemoryPlatform, StaticIdentity, StdoutSink};
use valet::ConversationManager;

/// Line-oriented driver: each stdin line is one lambda-form command (or raw
/// text while a free-text answer is expected), replies go to stdout.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    tracing::info!("Valet interpreter starting");

    let platform = MemoryPlatform::new(StaticIdentity::new("Alice"));
    platform.devices.add_device("tv", "tv-1", "Living room TV");
    platform.devices.add_device("lightbulb", "bulb-1", "Desk lamp");
    platform.devices.add_device("lightbulb", "bulb-2", "Ceiling light");
    platform.devices.add_device("twitter", "twitter-1", "Twitter account");

    let mut manager = ConversationManager::new(platform.services(), ActionCatalog::builtin());
    manager.attach_sink(Box::new(StdoutSink)).await;
    manager.start().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        manager.handle_command(line).await;
    }

    Ok(())
}
