use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// What kind of answer a value carries, and what a dialogue context can be
/// waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCategory {
    YesNo,
    Number,
    RawString,
    Date,
}

impl fmt::Display for ValueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueCategory::YesNo => write!(f, "yes/no answer"),
            ValueCategory::Number => write!(f, "number"),
            ValueCategory::RawString => write!(f, "text"),
            ValueCategory::Date => write!(f, "date"),
        }
    }
}

/// A resolved literal value: a bound action parameter, a classified answer,
/// or a keyword field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgValue {
    Bool(bool),
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl ArgValue {
    pub fn category(&self) -> ValueCategory {
        match self {
            ArgValue::Bool(_) => ValueCategory::YesNo,
            ArgValue::Number(_) => ValueCategory::Number,
            ArgValue::Text(_) => ValueCategory::RawString,
            ArgValue::Date(_) => ValueCategory::Date,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            ArgValue::Text(s) => write!(f, "{}", s),
            ArgValue::Date(d) => write!(f, "{}", d),
        }
    }
}

/// One parameter of a device action: either fixed by the catalog or elicited
/// from the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterSpec {
    Constant { value: ArgValue },
    Input { question: String, category: ValueCategory },
}

impl ParameterSpec {
    pub fn input(question: &str, category: ValueCategory) -> Self {
        ParameterSpec::Input {
            question: question.to_string(),
            category,
        }
    }

    pub fn constant(value: ArgValue) -> Self {
        ParameterSpec::Constant { value }
    }
}

/// The concrete action a verb resolves to for one device kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceAction {
    pub kind: String,
    pub channel: String,
    #[serde(default)]
    pub schema: Vec<ParameterSpec>,
}

/// Catalog entry for one action identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionEntry {
    /// Device-atom (e.g. `tt:device.twitter`) to concrete action.
    #[serde(default)]
    pub devices: HashMap<String, DeviceAction>,
    /// Device kinds to try, in order, when the utterance names no device.
    #[serde(default)]
    pub fallback: Vec<String>,
}

impl ActionEntry {
    pub fn device(&self, device_atom: &str) -> Option<&DeviceAction> {
        self.devices.get(device_atom)
    }

    /// First fallback kind that has a per-device entry, if any.
    pub fn resolve_fallback(&self) -> Option<&DeviceAction> {
        self.fallback
            .iter()
            .find_map(|kind| self.devices.get(&format!("tt:device.{}", kind)))
    }
}

/// Static mapping from action identifiers to device actions. Read-only after
/// load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionCatalog {
    actions: HashMap<String, ActionEntry>,
}

impl ActionCatalog {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn lookup(&self, action: &str) -> Option<&ActionEntry> {
        self.actions.get(action)
    }

    pub fn insert(&mut self, action: &str, entry: ActionEntry) {
        self.actions.insert(action.to_string(), entry);
    }

    /// The built-in knowledge base: social posting with a cross-device
    /// fallback, and power toggles for household devices.
    pub fn builtin() -> Self {
        let mut catalog = ActionCatalog::default();

        let mut post = ActionEntry {
            fallback: vec!["twitter".to_string(), "facebook".to_string()],
            ..Default::default()
        };
        post.devices.insert(
            "tt:device.twitter".to_string(),
            DeviceAction {
                kind: "twitter".to_string(),
                channel: "sink".to_string(),
                schema: vec![ParameterSpec::input(
                    "What do you want me to tweet?",
                    ValueCategory::RawString,
                )],
            },
        );
        post.devices.insert(
            "tt:device.facebook".to_string(),
            DeviceAction {
                kind: "facebook".to_string(),
                channel: "post".to_string(),
                schema: vec![ParameterSpec::input(
                    "What do you want me to post on Facebook?",
                    ValueCategory::RawString,
                )],
            },
        );
        catalog.insert("tt:device.action.post", post);

        for (action, power) in [("turnon", true), ("turnoff", false)] {
            let mut entry = ActionEntry::default();
            for kind in ["tv", "lightbulb"] {
                entry.devices.insert(
                    format!("tt:device.{}", kind),
                    DeviceAction {
                        kind: kind.to_string(),
                        channel: "setpower".to_string(),
                        schema: vec![ParameterSpec::constant(ArgValue::Bool(power))],
                    },
                );
            }
            catalog.insert(&format!("tt:device.action.{}", action), entry);
        }

        catalog
    }
}
