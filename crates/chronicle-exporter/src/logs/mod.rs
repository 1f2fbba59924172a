// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log extraction, batching and upload to Chronicle.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────┐
//!                     │     Logs     │  (resource -> scope -> record)
//!                     └──────┬───────┘
//!                            │
//!                            v
//!                  ┌─────────────────┐
//!                  │ RecordExtractor │  (payload, log type, namespace, labels)
//!                  └─────────┬───────┘
//!                            │
//!                            v
//!                  ┌─────────────────┐
//!                  │  BatchBuilder   │  (one request per log type)
//!                  └─────────┬───────┘
//!                            │
//!                            v
//!                  ┌─────────────────┐
//!                  │  SizeEnforcer   │  (split in halves, drop oversized)
//!                  └─────────┬───────┘
//!                            │
//!                            v
//!                     ┌──────────────┐
//!                     │   Uploader   │  (gRPC or HTTPS, fail-fast)
//!                     └──────────────┘
//! ```
//!
//! # Components
//!
//! - **[`record`]**: in-memory log record model
//! - **[`field`]**: field expressions resolved against a record
//! - **[`extractor`]**: per-record extraction and grouping by log type
//! - **[`batch`]**: gRPC and HTTP request envelopes
//! - **[`enforcer`]**: size and count limits
//! - **[`marshaler`]**: extractor, builder and enforcer in one step
//! - **[`uploader`]**: transports and error classification
//! - **[`exporter`]**: one export call end to end

pub mod batch;
pub mod constants;
pub mod enforcer;
pub mod exporter;
pub mod extractor;
pub mod field;
pub mod marshaler;
pub mod record;
pub mod uploader;
