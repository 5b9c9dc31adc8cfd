//! Resource operations against the missions API.
//!
//! Responses are wrapped inconsistently: some endpoints nest the payload
//! under a resource key, some under `data`, some return it bare. Each
//! operation names its candidate keys explicitly through an [`Envelope`].

pub mod assistants;
pub mod insights;
pub mod missions;
pub mod numbers;
pub mod runs;
pub mod scheduled;

use anyhow::{bail, Context, Result};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// What to hand back when none of the candidate keys is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// The whole response is the payload.
    Raw,
    EmptyObject,
    EmptyList,
}

#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    keys: &'static [&'static str],
    fallback: Fallback,
}

impl Envelope {
    pub const fn new(keys: &'static [&'static str], fallback: Fallback) -> Self {
        Self { keys, fallback }
    }

    /// First candidate key present with a non-null value, else the fallback.
    pub fn unwrap(&self, resp: &Value) -> Value {
        for key in self.keys {
            if let Some(v) = resp.get(*key).filter(|v| !v.is_null()) {
                return v.clone();
            }
        }
        match self.fallback {
            Fallback::Raw => resp.clone(),
            Fallback::EmptyObject => Value::Object(Map::new()),
            Fallback::EmptyList => Value::Array(Vec::new()),
        }
    }

    pub fn unwrap_as<T: DeserializeOwned>(&self, resp: &Value) -> Result<T> {
        serde_json::from_value(self.unwrap(resp)).context("Unexpected response shape")
    }

    pub fn unwrap_list<T: DeserializeOwned>(&self, resp: &Value) -> Result<Vec<T>> {
        match self.unwrap(resp) {
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).context("Unexpected list item shape"))
                .collect(),
            other => bail!("Expected a list in response, got {}", type_name(&other)),
        }
    }
}

pub const MISSION: Envelope = Envelope::new(&["mission", "data"], Fallback::Raw);
pub const MISSION_LIST: Envelope = Envelope::new(&["missions", "data"], Fallback::EmptyList);
pub const RUN: Envelope = Envelope::new(&["data"], Fallback::Raw);
pub const DATA_OBJECT: Envelope = Envelope::new(&["data"], Fallback::EmptyObject);
pub const DATA_LIST: Envelope = Envelope::new(&["data"], Fallback::EmptyList);
pub const ASSISTANT: Envelope = Envelope::new(&["assistant"], Fallback::Raw);
pub const ASSISTANT_LIST: Envelope =
    Envelope::new(&["assistants", "data"], Fallback::EmptyList);
pub const EVENT: Envelope = Envelope::new(&["event"], Fallback::Raw);
pub const EVENT_LIST: Envelope = Envelope::new(&["events", "data"], Fallback::EmptyList);

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// First of `keys` holding a non-empty string or a number. Sibling fields
/// are never inspected.
pub(crate) fn identifier(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match payload.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn encode(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

pub(crate) fn print_json(v: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}
