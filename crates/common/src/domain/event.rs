use crate::domain::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A single observation delivered to an analysis invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub variable: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default)]
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl EventRecord {
    pub fn new(variable: impl Into<String>, value: impl Into<Value>, device: impl Into<String>) -> Self {
        Self {
            id: None,
            variable: variable.into(),
            value: Some(value.into()),
            device: device.into(),
            group: None,
            time: None,
            location: None,
            metadata: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Value rendered as text when it is a JSON string
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }

    /// Metadata entry rendered as text when it is a JSON string
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }
}

/// Lookup helpers over a batch of records
pub trait EventBatchExt {
    fn find_variable(&self, variable: &str) -> Option<&EventRecord>;
    fn has_any_variable(&self, variables: &[String]) -> bool;
    fn originating_device(&self) -> Option<&str>;
}

impl EventBatchExt for [EventRecord] {
    fn find_variable(&self, variable: &str) -> Option<&EventRecord> {
        self.iter().find(|r| r.variable == variable)
    }

    fn has_any_variable(&self, variables: &[String]) -> bool {
        self.iter().any(|r| variables.iter().any(|v| *v == r.variable))
    }

    fn originating_device(&self) -> Option<&str> {
        self.iter()
            .map(|r| r.device.as_str())
            .find(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct EnvironmentEntry {
    key: String,
    value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawEnvironment {
    List(Vec<EnvironmentEntry>),
    Map(HashMap<String, String>),
}

impl From<RawEnvironment> for Environment {
    fn from(raw: RawEnvironment) -> Self {
        match raw {
            RawEnvironment::List(entries) => entries
                .into_iter()
                .map(|entry| (entry.key, entry.value))
                .collect(),
            RawEnvironment::Map(map) => Environment(map),
        }
    }
}

/// Environment variables handed to an invocation alongside the batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawEnvironment")]
pub struct Environment(HashMap<String, String>);

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }
}

impl FromIterator<(String, String)> for Environment {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Environment(iter.into_iter().collect())
    }
}

/// Decoded payload of one analysis invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisInvocation {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub data: Vec<EventRecord>,
}
