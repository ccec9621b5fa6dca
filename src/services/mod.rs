//! Collaborator interfaces the interpreter is built against. Implemented
//! elsewhere (platform glue); in-memory versions for the demo binary and the
//! test suite live in [`memory`].

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::semantics::ArgValue;

/// One controllable device as the directory reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceHandle {
    pub id: String,
    pub name: String,
}

/// Device enumeration and invocation.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    fn devices_of_kind(&self, kind: &str) -> Vec<DeviceHandle>;
    async fn invoke(&self, device: &str, channel: &str, args: &[ArgValue]) -> anyhow::Result<()>;
}

/// Persistent key-value preference storage.
pub trait PreferenceStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// A long-lived observable field, accessed through a scoped open/close handle.
#[async_trait]
pub trait KeywordStore: Send + Sync {
    async fn open(&self, key: &str) -> anyhow::Result<Box<dyn KeywordHandle>>;
}

#[async_trait]
pub trait KeywordHandle: Send {
    fn value(&self) -> Option<ArgValue>;
    async fn set(&mut self, value: ArgValue) -> anyhow::Result<()>;
    async fn close(self: Box<Self>);
}

/// Resolves the session owner's display name, failing when unavailable.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn self_display_name(&self) -> anyhow::Result<String>;
}

/// Installed companion apps.
#[async_trait]
pub trait AppRegistry: Send + Sync {
    fn has_app(&self, id: &str) -> bool;
    fn describe(&self, id: &str) -> Option<String>;
    async fn load_app(&self, id: &str, code: &str, description: &str) -> anyhow::Result<()>;
}

/// Where outbound reply text goes.
pub trait OutputSink: Send {
    fn send(&self, message: &str);
}

/// Constructor-injected collaborator bundle, scoped to one session.
#[derive(Clone)]
pub struct Services {
    pub devices: Arc<dyn DeviceDirectory>,
    pub prefs: Arc<dyn PreferenceStore>,
    pub keywords: Arc<dyn KeywordStore>,
    pub identity: Arc<dyn IdentityResolver>,
    pub apps: Arc<dyn AppRegistry>,
}
