// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-record extraction and grouping by log type.
//!
//! For every record the extractor resolves the raw payload, the log type, the
//! namespace and the ingestion labels, then hands the entry to a
//! [`RecordGrouper`]. Records that fail to resolve are logged and skipped; they
//! never fail the payload.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::logs::constants::{
    known_log_type, GENERIC_LOG_TYPE_EXPR, INGESTION_LABEL_PREFIX, LOG_TYPE_OVERRIDE_EXPR,
    NAMESPACE_OVERRIDE_EXPR,
};
use crate::logs::field::{FieldError, FieldResolver};
use crate::logs::record::{attributes_to_json, AnyValue, Logs, RecordContext};
use crate::proto::Label;

/// Settings the extractor needs from the exporter configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractorSettings {
    /// Expression selecting the raw payload; empty sends the whole record.
    pub raw_log_field: String,
    pub log_type: String,
    pub namespace: String,
    /// Map `attributes["log_type"]` through the known log type table.
    pub override_log_type: bool,
    /// Labels used for records that carry none of their own.
    pub ingestion_labels: BTreeMap<String, String>,
}

/// One extracted record, ready to be placed in a batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogEntry {
    /// Nanoseconds since the Unix epoch.
    pub timestamp: u64,
    /// Nanoseconds since the Unix epoch.
    pub collection_time: u64,
    pub payload: String,
    /// Namespace resolved for this record.
    pub namespace: String,
    /// Labels resolved for this record, in attribute order.
    pub labels: Vec<Label>,
}

/// All entries of one payload that resolved to the same log type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogTypeGroup {
    pub log_type: String,
    /// First non-empty namespace seen for this log type.
    pub namespace: String,
    /// Labels merged across entries, unique by key, first seen wins.
    pub labels: Vec<Label>,
    pub entries: Vec<LogEntry>,
}

impl LogTypeGroup {
    fn new(log_type: String) -> Self {
        LogTypeGroup {
            log_type,
            ..Default::default()
        }
    }

    fn merge_labels(&mut self, labels: &[Label]) {
        for label in labels {
            if !self.labels.iter().any(|existing| existing.key == label.key) {
                self.labels.push(label.clone());
            }
        }
    }
}

/// Accumulates entries per log type, in the order log types are first seen.
#[derive(Debug, Default)]
pub struct RecordGrouper {
    groups: IndexMap<String, LogTypeGroup>,
}

impl RecordGrouper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, log_type: String, entry: LogEntry) {
        let group = self
            .groups
            .entry(log_type)
            .or_insert_with_key(|log_type| LogTypeGroup::new(log_type.clone()));

        if group.namespace.is_empty() && !entry.namespace.is_empty() {
            group.namespace.clone_from(&entry.namespace);
        }
        group.merge_labels(&entry.labels);
        group.entries.push(entry);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    #[must_use]
    pub fn into_groups(self) -> Vec<LogTypeGroup> {
        self.groups.into_values().collect()
    }
}

#[derive(Debug, Clone)]
pub struct RecordExtractor {
    settings: ExtractorSettings,
    raw_field: Option<FieldResolver>,
    log_type_override: FieldResolver,
    generic_log_type: FieldResolver,
    namespace_override: FieldResolver,
}

impl RecordExtractor {
    /// Fails when the configured raw log field is not a valid expression.
    pub fn new(settings: ExtractorSettings) -> Result<Self, FieldError> {
        let raw_field = if settings.raw_log_field.is_empty() {
            None
        } else {
            Some(FieldResolver::new(&settings.raw_log_field)?)
        };
        Ok(RecordExtractor {
            settings,
            raw_field,
            log_type_override: FieldResolver::new(LOG_TYPE_OVERRIDE_EXPR)?,
            generic_log_type: FieldResolver::new(GENERIC_LOG_TYPE_EXPR)?,
            namespace_override: FieldResolver::new(NAMESPACE_OVERRIDE_EXPR)?,
        })
    }

    #[must_use]
    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    /// Extracts every record of `logs` and groups the entries by log type.
    #[must_use]
    pub fn extract(&self, logs: &Logs) -> Vec<LogTypeGroup> {
        let mut grouper = RecordGrouper::new();
        for ctx in logs.records() {
            match self.extract_record(ctx) {
                Ok(Some((log_type, entry))) => grouper.add(log_type, entry),
                Ok(None) => debug!("CHRONICLE | Skipping log record with empty payload"),
                Err(e) => error!("CHRONICLE | Error processing log record: {e}"),
            }
        }
        grouper.into_groups()
    }

    /// Returns the log type and entry for one record, or `None` when the
    /// payload is empty.
    pub fn extract_record(
        &self,
        ctx: RecordContext<'_>,
    ) -> Result<Option<(String, LogEntry)>, FieldError> {
        let payload = self.raw_log(ctx)?;
        if payload.is_empty() {
            return Ok(None);
        }
        let log_type = self.log_type(ctx)?;
        let namespace = self.namespace(ctx)?;
        let labels = self.labels(ctx);

        let record = ctx.record;
        let timestamp = if record.timestamp == 0 {
            record.observed_timestamp
        } else {
            record.timestamp
        };

        Ok(Some((
            log_type,
            LogEntry {
                timestamp,
                collection_time: record.observed_timestamp,
                payload,
                namespace,
                labels,
            },
        )))
    }

    fn raw_log(&self, ctx: RecordContext<'_>) -> Result<String, FieldError> {
        match &self.raw_field {
            None => envelope(ctx),
            Some(resolver) => match resolver.resolve(ctx) {
                Err(FieldError::UnsupportedBody(kind)) => {
                    debug!("CHRONICLE | Body of type {kind} sent as full record");
                    envelope(ctx)
                }
                other => other,
            },
        }
    }

    fn log_type(&self, ctx: RecordContext<'_>) -> Result<String, FieldError> {
        let explicit = self.log_type_override.resolve(ctx)?;
        if !explicit.is_empty() {
            return Ok(explicit);
        }

        if self.settings.override_log_type {
            let generic = self.generic_log_type.resolve(ctx)?;
            if let Some(mapped) = known_log_type(&generic) {
                return Ok(mapped.to_string());
            }
        }

        Ok(self.settings.log_type.clone())
    }

    fn namespace(&self, ctx: RecordContext<'_>) -> Result<String, FieldError> {
        let explicit = self.namespace_override.resolve(ctx)?;
        if explicit.is_empty() {
            Ok(self.settings.namespace.clone())
        } else {
            Ok(explicit)
        }
    }

    fn labels(&self, ctx: RecordContext<'_>) -> Vec<Label> {
        let labels = record_labels(ctx);
        if !labels.is_empty() {
            return labels;
        }
        self.settings
            .ingestion_labels
            .iter()
            .map(|(key, value)| Label {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

/// The whole record as a JSON object, used when no raw field applies.
fn envelope(ctx: RecordContext<'_>) -> Result<String, FieldError> {
    let body = match &ctx.record.body {
        AnyValue::Empty => Value::String(String::new()),
        other => other.to_json(),
    };
    let envelope = json!({
        "body": body,
        "attributes": attributes_to_json(&ctx.record.attributes),
        "resource_attributes": attributes_to_json(ctx.resource),
    });
    serde_json::to_string(&envelope).map_err(|e| FieldError::Json(e.to_string()))
}

/// Labels carried by `chronicle_ingestion_label...` attributes of the record.
///
/// A value holding a JSON object of strings expands into one label per member;
/// any other value becomes a single label keyed by the bracketed suffix.
fn record_labels(ctx: RecordContext<'_>) -> Vec<Label> {
    let mut labels = Vec::new();
    for (key, value) in &ctx.record.attributes {
        let Some(suffix) = key.strip_prefix(INGESTION_LABEL_PREFIX) else {
            continue;
        };
        let value = value.as_string();
        match serde_json::from_str::<BTreeMap<String, String>>(&value) {
            Ok(expanded) => labels.extend(
                expanded
                    .into_iter()
                    .map(|(key, value)| Label { key, value }),
            ),
            Err(_) => labels.push(Label {
                key: suffix.trim_matches(|c| matches!(c, '[' | ']' | '"')).to_string(),
                value,
            }),
        }
    }
    labels
}
