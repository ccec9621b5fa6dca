//! In-memory collaborator implementations backing the demo binary and the
//! integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::semantics::ArgValue;

use super::{
    AppRegistry, DeviceDirectory, DeviceHandle, IdentityResolver, KeywordHandle, KeywordStore,
    OutputSink, PreferenceStore, Services,
};

/// One recorded device invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub device: String,
    pub channel: String,
    pub args: Vec<ArgValue>,
}

#[derive(Default)]
pub struct MemoryDeviceDirectory {
    devices: Mutex<HashMap<String, Vec<DeviceHandle>>>,
    invocations: Mutex<Vec<Invocation>>,
    fail_with: Mutex<Option<String>>,
}

impl MemoryDeviceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&self, kind: &str, id: &str, name: &str) {
        self.devices
            .lock()
            .unwrap()
            .entry(kind.to_string())
            .or_default()
            .push(DeviceHandle {
                id: id.to_string(),
                name: name.to_string(),
            });
    }

    /// Make every subsequent invocation fail with the given message.
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeviceDirectory for MemoryDeviceDirectory {
    fn devices_of_kind(&self, kind: &str) -> Vec<DeviceHandle> {
        self.devices
            .lock()
            .unwrap()
            .get(kind)
            .cloned()
            .unwrap_or_default()
    }

    async fn invoke(&self, device: &str, channel: &str, args: &[ArgValue]) -> anyhow::Result<()> {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(anyhow::anyhow!(message));
        }
        self.invocations.lock().unwrap().push(Invocation {
            device: device.to_string(),
            channel: channel.to_string(),
            args: args.to_vec(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPreferenceStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Option<String> {
        self.map.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.map
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[derive(Default)]
pub struct MemoryKeywordStore {
    map: Arc<Mutex<HashMap<String, ArgValue>>>,
}

impl MemoryKeywordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn peek(&self, key: &str) -> Option<ArgValue> {
        self.map.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: &str, value: ArgValue) {
        self.map.lock().unwrap().insert(key.to_string(), value);
    }
}

pub struct MemoryKeywordHandle {
    key: String,
    current: Option<ArgValue>,
    map: Arc<Mutex<HashMap<String, ArgValue>>>,
}

#[async_trait]
impl KeywordStore for MemoryKeywordStore {
    async fn open(&self, key: &str) -> anyhow::Result<Box<dyn KeywordHandle>> {
        let current = self.map.lock().unwrap().get(key).cloned();
        Ok(Box::new(MemoryKeywordHandle {
            key: key.to_string(),
            current,
            map: self.map.clone(),
        }))
    }
}

#[async_trait]
impl KeywordHandle for MemoryKeywordHandle {
    fn value(&self) -> Option<ArgValue> {
        self.current.clone()
    }

    async fn set(&mut self, value: ArgValue) -> anyhow::Result<()> {
        self.map
            .lock()
            .unwrap()
            .insert(self.key.clone(), value.clone());
        self.current = Some(value);
        Ok(())
    }

    async fn close(self: Box<Self>) {}
}

/// Identity resolver with a fixed answer, or none to simulate an unavailable
/// identity service.
pub struct StaticIdentity {
    name: Option<String>,
}

impl StaticIdentity {
    pub fn new(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
        }
    }

    pub fn unavailable() -> Self {
        Self { name: None }
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentity {
    async fn self_display_name(&self) -> anyhow::Result<String> {
        self.name
            .clone()
            .ok_or_else(|| anyhow::anyhow!("identity service unavailable"))
    }
}

#[derive(Default)]
pub struct MemoryAppRegistry {
    apps: Mutex<HashMap<String, String>>,
    loads: Mutex<usize>,
}

impl MemoryAppRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, id: &str, description: &str) {
        self.apps
            .lock()
            .unwrap()
            .insert(id.to_string(), description.to_string());
    }

    pub fn load_count(&self) -> usize {
        *self.loads.lock().unwrap()
    }
}

#[async_trait]
impl AppRegistry for MemoryAppRegistry {
    fn has_app(&self, id: &str) -> bool {
        self.apps.lock().unwrap().contains_key(id)
    }

    fn describe(&self, id: &str) -> Option<String> {
        self.apps.lock().unwrap().get(id).cloned()
    }

    async fn load_app(&self, id: &str, _code: &str, description: &str) -> anyhow::Result<()> {
        *self.loads.lock().unwrap() += 1;
        self.install(id, description);
        Ok(())
    }
}

/// Sink that buffers replies for later inspection.
#[derive(Clone, Default)]
pub struct BufferSink {
    messages: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.messages.lock().unwrap().clear();
    }
}

impl OutputSink for BufferSink {
    fn send(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Sink that prints replies, for the interactive driver.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn send(&self, message: &str) {
        println!("{}", message);
    }
}

/// Convenience bundle wiring every in-memory collaborator together.
pub struct MemoryPlatform {
    pub devices: Arc<MemoryDeviceDirectory>,
    pub prefs: Arc<MemoryPreferenceStore>,
    pub keywords: Arc<MemoryKeywordStore>,
    pub identity: Arc<StaticIdentity>,
    pub apps: Arc<MemoryAppRegistry>,
}

impl MemoryPlatform {
    pub fn new(identity: StaticIdentity) -> Self {
        Self {
            devices: Arc::new(MemoryDeviceDirectory::new()),
            prefs: Arc::new(MemoryPreferenceStore::new()),
            keywords: Arc::new(MemoryKeywordStore::new()),
            identity: Arc::new(identity),
            apps: Arc::new(MemoryAppRegistry::new()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            devices: self.devices.clone(),
            prefs: self.prefs.clone(),
            keywords: self.keywords.clone(),
            identity: self.identity.clone(),
            apps: self.apps.clone(),
        }
    }
}
