// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Input log model: resource -> scope -> record.
//!
//! The exporter only reads this model. Attribute maps keep insertion order, which
//! matters for label extraction; JSON renderings of maps sort keys.

use base64::Engine;
use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

/// Attribute map with insertion order preserved.
pub type Attributes = IndexMap<String, AnyValue>;

/// A dynamically typed attribute or body value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AnyValue {
    #[default]
    Empty,
    Str(String),
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    Array(Vec<AnyValue>),
    Map(Attributes),
}

impl AnyValue {
    /// Renders the value as JSON. Map keys come out sorted.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            AnyValue::Empty => Value::Null,
            AnyValue::Str(s) => Value::String(s.clone()),
            AnyValue::Bool(b) => Value::Bool(*b),
            AnyValue::Int(i) => Value::Number((*i).into()),
            AnyValue::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
            AnyValue::Bytes(bytes) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            AnyValue::Array(values) => Value::Array(values.iter().map(AnyValue::to_json).collect()),
            AnyValue::Map(attributes) => attributes_to_json(attributes),
        }
    }

    /// Renders the value as a plain string: strings as-is, scalars in their
    /// textual form, bytes as base64 and maps or arrays as JSON.
    #[must_use]
    pub fn as_string(&self) -> String {
        match self {
            AnyValue::Empty => String::new(),
            AnyValue::Str(s) => s.clone(),
            AnyValue::Bool(b) => b.to_string(),
            AnyValue::Int(i) => i.to_string(),
            AnyValue::Double(d) => d.to_string(),
            AnyValue::Bytes(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            AnyValue::Array(_) | AnyValue::Map(_) => self.to_json().to_string(),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnyValue::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            AnyValue::Empty => "empty",
            AnyValue::Str(_) => "string",
            AnyValue::Bool(_) => "bool",
            AnyValue::Int(_) => "int",
            AnyValue::Double(_) => "double",
            AnyValue::Bytes(_) => "bytes",
            AnyValue::Array(_) => "array",
            AnyValue::Map(_) => "map",
        }
    }
}

impl From<&str> for AnyValue {
    fn from(value: &str) -> Self {
        AnyValue::Str(value.to_string())
    }
}

impl From<String> for AnyValue {
    fn from(value: String) -> Self {
        AnyValue::Str(value)
    }
}

impl From<bool> for AnyValue {
    fn from(value: bool) -> Self {
        AnyValue::Bool(value)
    }
}

impl From<i64> for AnyValue {
    fn from(value: i64) -> Self {
        AnyValue::Int(value)
    }
}

impl From<f64> for AnyValue {
    fn from(value: f64) -> Self {
        AnyValue::Double(value)
    }
}

impl From<Attributes> for AnyValue {
    fn from(value: Attributes) -> Self {
        AnyValue::Map(value)
    }
}

/// Renders an attribute map as a JSON object with sorted keys.
#[must_use]
pub fn attributes_to_json(attributes: &Attributes) -> Value {
    let object: Map<String, Value> = attributes
        .iter()
        .map(|(key, value)| (key.clone(), value.to_json()))
        .collect();
    Value::Object(object)
}

/// One log event.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LogRecord {
    /// Event time in nanoseconds since the Unix epoch, 0 when unknown.
    pub timestamp: u64,
    /// Time the event was observed by the collector, in nanoseconds since the Unix epoch.
    pub observed_timestamp: u64,
    pub body: AnyValue,
    pub attributes: Attributes,
}

impl LogRecord {
    #[must_use]
    pub fn new(body: impl Into<AnyValue>) -> Self {
        LogRecord {
            body: body.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<AnyValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_timestamps(mut self, timestamp: u64, observed_timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self.observed_timestamp = observed_timestamp;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InstrumentationScope {
    pub name: String,
    pub version: String,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScopeLogs {
    pub scope: InstrumentationScope,
    pub log_records: Vec<LogRecord>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceLogs {
    /// Attributes of the resource that produced the records.
    pub resource: Attributes,
    pub scope_logs: Vec<ScopeLogs>,
}

impl ResourceLogs {
    /// A resource with a single anonymous scope holding `records`.
    #[must_use]
    pub fn with_records(records: Vec<LogRecord>) -> Self {
        ResourceLogs {
            resource: Attributes::new(),
            scope_logs: vec![ScopeLogs {
                scope: InstrumentationScope::default(),
                log_records: records,
            }],
        }
    }
}

/// A payload of logs handed to the exporter in one call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Logs {
    pub resource_logs: Vec<ResourceLogs>,
}

impl Logs {
    #[must_use]
    pub fn new(resource_logs: Vec<ResourceLogs>) -> Self {
        Logs { resource_logs }
    }

    #[must_use]
    pub fn log_record_count(&self) -> usize {
        self.resource_logs
            .iter()
            .flat_map(|resource| &resource.scope_logs)
            .map(|scope| scope.log_records.len())
            .sum()
    }

    /// Iterates every record together with its enclosing scope and resource.
    pub fn records(&self) -> impl Iterator<Item = RecordContext<'_>> {
        self.resource_logs.iter().flat_map(|resource| {
            resource.scope_logs.iter().flat_map(move |scope| {
                scope.log_records.iter().map(move |record| RecordContext {
                    record,
                    scope: &scope.scope,
                    resource: &resource.resource,
                })
            })
        })
    }
}

/// A record seen together with the scope and resource that enclose it.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub record: &'a LogRecord,
    pub scope: &'a InstrumentationScope,
    pub resource: &'a Attributes,
}
