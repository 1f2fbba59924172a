// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire messages for the two Chronicle ingestion APIs.
//!
//! The messages are declared by hand with `prost` derives rather than generated
//! from `.proto` files; only the fields the exporter writes are declared, with the
//! tags the service expects.
//!
//! - **gRPC** (`malachite.ingestion.v2.IngestionServiceV2`): one
//!   [`BatchCreateLogsRequest`] holds a single [`LogEntryBatch`] whose header
//!   (source, log type, start time) is shared by every entry.
//! - **HTTPS** (`v1alpha ... logs:import`): one [`ImportLogsRequest`] holds an
//!   inline list of [`Log`]s, each with its own namespace and labels. The request
//!   body is the proto3 JSON mapping, produced through `serde`.

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, SecondsFormat};
use serde::{Serialize, Serializer};

/// Fully-qualified path of the unary `BatchCreateLogs` RPC.
pub const BATCH_CREATE_LOGS_PATH: &str =
    "/malachite.ingestion.v2.IngestionServiceV2/BatchCreateLogs";

/// gRPC request carrying one batch of log entries.
#[derive(Clone, PartialEq, prost::Message)]
pub struct BatchCreateLogsRequest {
    #[prost(message, optional, tag = "1")]
    pub batch: Option<LogEntryBatch>,
}

/// gRPC response; the exporter only looks at the status.
#[derive(Clone, Copy, PartialEq, prost::Message)]
pub struct BatchCreateLogsResponse {}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogEntryBatch {
    #[prost(message, optional, tag = "2")]
    pub source: Option<EventSource>,
    #[prost(string, tag = "3")]
    pub log_type: String,
    #[prost(message, optional, tag = "4")]
    pub start_time: Option<prost_types::Timestamp>,
    #[prost(message, repeated, tag = "5")]
    pub entries: Vec<LogEntry>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct LogEntry {
    #[prost(message, optional, tag = "1")]
    pub timestamp: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "2")]
    pub collection_time: Option<prost_types::Timestamp>,
    #[prost(bytes = "vec", tag = "3")]
    pub data: Vec<u8>,
}

/// Identifies who sent a batch and how the destination should scope it.
#[derive(Clone, PartialEq, prost::Message)]
pub struct EventSource {
    #[prost(bytes = "vec", tag = "1")]
    pub customer_id: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub collector_id: Vec<u8>,
    #[prost(string, tag = "3")]
    pub filename: String,
    #[prost(string, tag = "4")]
    pub namespace: String,
    #[prost(message, repeated, tag = "5")]
    pub labels: Vec<Label>,
}

#[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
pub struct Label {
    #[prost(string, tag = "1")]
    pub key: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// HTTPS request importing a list of logs for one log type.
#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportLogsRequest {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parent: String,
    #[prost(string, tag = "4")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub hint: String,
    #[prost(message, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_source: Option<LogsInlineSource>,
}

impl ImportLogsRequest {
    /// Logs carried inline by this request, empty when there is no inline source.
    #[must_use]
    pub fn logs(&self) -> &[Log] {
        self.inline_source
            .as_ref()
            .map_or(&[], |source| source.logs.as_slice())
    }
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsInlineSource {
    #[prost(message, repeated, tag = "1")]
    pub logs: Vec<Log>,
    #[prost(string, tag = "2")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub forwarder: String,
    #[prost(string, tag = "3")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source_filename: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[prost(bytes = "vec", tag = "2")]
    #[serde(serialize_with = "serialize_bytes")]
    pub data: Vec<u8>,
    #[prost(message, optional, tag = "3")]
    #[serde(
        serialize_with = "serialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub log_entry_time: Option<prost_types::Timestamp>,
    #[prost(message, optional, tag = "4")]
    #[serde(
        serialize_with = "serialize_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub collection_time: Option<prost_types::Timestamp>,
    #[prost(string, tag = "5")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub environment_namespace: String,
    #[prost(btree_map = "string, message", tag = "6")]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, LogLabel>,
}

#[derive(Clone, PartialEq, Eq, prost::Message, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLabel {
    #[prost(string, tag = "1")]
    pub value: String,
    #[prost(bool, tag = "2")]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub rbac_enabled: bool,
}

/// Converts nanoseconds since the Unix epoch into a protobuf timestamp.
#[must_use]
pub fn timestamp_from_nanos(nanos: u64) -> prost_types::Timestamp {
    let seconds = nanos / 1_000_000_000;
    let subsec = nanos % 1_000_000_000;
    prost_types::Timestamp {
        seconds: i64::try_from(seconds).unwrap_or(i64::MAX),
        // always below 1e9
        nanos: i32::try_from(subsec).unwrap_or_default(),
    }
}

// proto3 JSON encodes bytes as standard base64
fn serialize_bytes<S>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}

// proto3 JSON encodes timestamps as RFC 3339 in UTC with 0, 3, 6 or 9 fractional digits
#[allow(clippy::ref_option)]
fn serialize_timestamp<S>(
    timestamp: &Option<prost_types::Timestamp>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let Some(timestamp) = timestamp else {
        return serializer.serialize_none();
    };
    let nanos = u32::try_from(timestamp.nanos).unwrap_or_default();
    match DateTime::from_timestamp(timestamp.seconds, nanos) {
        Some(datetime) => {
            serializer.serialize_str(&datetime.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        }
        None => Err(serde::ser::Error::custom(format!(
            "timestamp out of range: {}s {}ns",
            timestamp.seconds, timestamp.nanos
        ))),
    }
}
