// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Request envelopes for one log type group.
//!
//! A [`BatchBuilder`] wraps a whole [`LogTypeGroup`] into a single request; the
//! size enforcer later splits it through [`SplittableRequest`]. The two
//! transports only differ in the wrapping:
//!
//! - gRPC shares one batch header (source, log type, start time) across all
//!   entries of a request.
//! - HTTPS carries namespace and labels on every log and addresses the log type
//!   through the request URL, so [`HttpPayload`] keeps the log type next to the
//!   request.

use std::collections::BTreeMap;
use std::time::SystemTime;

use prost::Message;
use uuid::Uuid;

use crate::logs::constants::COLLECTOR_ID;
use crate::logs::extractor::{LogEntry, LogTypeGroup};
use crate::proto::{
    self, timestamp_from_nanos, BatchCreateLogsRequest, EventSource, ImportLogsRequest, Log,
    LogEntryBatch, LogLabel, LogsInlineSource,
};

/// A request whose entries can be split across several requests sharing the
/// same header.
pub trait SplittableRequest: Sized {
    fn entry_count(&self) -> usize;

    /// Encoded size of the complete request in bytes.
    fn encoded_size(&self) -> usize;

    /// Moves the entries from `at` onwards into a new request with an identical
    /// header. `self` keeps the entries before `at`.
    #[must_use]
    fn split_off(&mut self, at: usize) -> Self;
}

/// Wraps a group into a transport-specific request.
pub trait BatchBuilder {
    type Request: SplittableRequest;

    fn build(&self, group: LogTypeGroup) -> Self::Request;
}

impl SplittableRequest for BatchCreateLogsRequest {
    fn entry_count(&self) -> usize {
        self.batch.as_ref().map_or(0, |batch| batch.entries.len())
    }

    fn encoded_size(&self) -> usize {
        self.encoded_len()
    }

    fn split_off(&mut self, at: usize) -> Self {
        let Some(batch) = self.batch.as_mut() else {
            return BatchCreateLogsRequest::default();
        };
        let entries = batch.entries.split_off(at.min(batch.entries.len()));
        BatchCreateLogsRequest {
            batch: Some(LogEntryBatch {
                source: batch.source.clone(),
                log_type: batch.log_type.clone(),
                start_time: batch.start_time.clone(),
                entries,
            }),
        }
    }
}

fn nanos_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrpcBatchBuilder {
    customer_id: Vec<u8>,
    collector_id: Vec<u8>,
    start_time: prost_types::Timestamp,
}

impl GrpcBatchBuilder {
    /// `start_time` is stamped on every batch this builder produces.
    #[must_use]
    pub fn new(customer_id: Uuid, start_time: SystemTime) -> Self {
        GrpcBatchBuilder {
            customer_id: customer_id.as_bytes().to_vec(),
            collector_id: collector_id().as_bytes().to_vec(),
            start_time: timestamp_from_nanos(nanos_since_epoch(start_time)),
        }
    }

    #[must_use]
    pub fn start_time(&self) -> &prost_types::Timestamp {
        &self.start_time
    }
}

impl BatchBuilder for GrpcBatchBuilder {
    type Request = BatchCreateLogsRequest;

    fn build(&self, group: LogTypeGroup) -> BatchCreateLogsRequest {
        let entries = group
            .entries
            .into_iter()
            .map(|entry| proto::LogEntry {
                timestamp: Some(timestamp_from_nanos(entry.timestamp)),
                collection_time: Some(timestamp_from_nanos(entry.collection_time)),
                data: entry.payload.into_bytes(),
            })
            .collect();

        BatchCreateLogsRequest {
            batch: Some(LogEntryBatch {
                source: Some(EventSource {
                    customer_id: self.customer_id.clone(),
                    collector_id: self.collector_id.clone(),
                    filename: String::new(),
                    namespace: group.namespace,
                    labels: group.labels,
                }),
                log_type: group.log_type,
                start_time: Some(self.start_time.clone()),
                entries,
            }),
        }
    }
}

/// An HTTPS import request together with the log type it is addressed to.
#[derive(Clone, PartialEq)]
pub struct HttpPayload {
    pub log_type: String,
    pub request: ImportLogsRequest,
}

impl std::fmt::Debug for HttpPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPayload")
            .field("log_type", &self.log_type)
            .field("logs", &self.request.logs().len())
            .finish_non_exhaustive()
    }
}

impl SplittableRequest for HttpPayload {
    fn entry_count(&self) -> usize {
        self.request.logs().len()
    }

    fn encoded_size(&self) -> usize {
        self.request.encoded_len()
    }

    fn split_off(&mut self, at: usize) -> Self {
        let Some(source) = self.request.inline_source.as_mut() else {
            return HttpPayload {
                log_type: self.log_type.clone(),
                request: ImportLogsRequest::default(),
            };
        };
        let logs = source.logs.split_off(at.min(source.logs.len()));
        HttpPayload {
            log_type: self.log_type.clone(),
            request: ImportLogsRequest {
                parent: self.request.parent.clone(),
                hint: self.request.hint.clone(),
                inline_source: Some(LogsInlineSource {
                    logs,
                    forwarder: source.forwarder.clone(),
                    source_filename: source.source_filename.clone(),
                }),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpBatchBuilder {
    forwarder: String,
}

impl HttpBatchBuilder {
    #[must_use]
    pub fn new(project: &str, location: &str, customer_id: &str, forwarder: &str) -> Self {
        HttpBatchBuilder {
            forwarder: format!(
                "projects/{project}/locations/{location}/instances/{customer_id}/forwarders/{forwarder}"
            ),
        }
    }

    #[must_use]
    pub fn forwarder(&self) -> &str {
        &self.forwarder
    }
}

fn http_log(entry: LogEntry) -> Log {
    // later keys of one record replace earlier ones
    let labels: BTreeMap<String, LogLabel> = entry
        .labels
        .into_iter()
        .map(|label| {
            (
                label.key,
                LogLabel {
                    value: label.value,
                    rbac_enabled: false,
                },
            )
        })
        .collect();

    Log {
        name: String::new(),
        data: entry.payload.into_bytes(),
        log_entry_time: Some(timestamp_from_nanos(entry.timestamp)),
        collection_time: Some(timestamp_from_nanos(entry.collection_time)),
        environment_namespace: entry.namespace,
        labels,
    }
}

impl BatchBuilder for HttpBatchBuilder {
    type Request = HttpPayload;

    fn build(&self, group: LogTypeGroup) -> HttpPayload {
        HttpPayload {
            log_type: group.log_type,
            request: ImportLogsRequest {
                parent: String::new(),
                hint: String::new(),
                inline_source: Some(LogsInlineSource {
                    logs: group.entries.into_iter().map(http_log).collect(),
                    forwarder: self.forwarder.clone(),
                    source_filename: String::new(),
                }),
            },
        }
    }
}

/// The fixed collector identifier as a UUID.
#[must_use]
pub fn collector_id() -> Uuid {
    Uuid::parse_str(COLLECTOR_ID).unwrap_or_default()
}
