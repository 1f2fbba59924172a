// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! # Chronicle Exporter
//!
//! Turns a stream of structured log records into size-bounded ingestion requests for
//! Google `SecOps` (Chronicle) and uploads them over gRPC or HTTPS.
//!
//! ## Overview
//!
//! One call to [`logs::exporter::LogsExporter::export`] runs the whole pipeline on the
//! caller's task:
//!
//! ```text
//!   Logs (resource -> scope -> record)
//!        │
//!        v
//!   RecordExtractor ── FieldResolver
//!        │
//!        v
//!   LogTypeGroup per log type
//!        │
//!        v
//!   BatchBuilder (gRPC or HTTP envelope)
//!        │
//!        v
//!   SizeEnforcer (recursive split, drop unsplittable)
//!        │
//!        v
//!   Uploader (sequential, fail-fast, transient/permanent)
//! ```
//!
//! ## Modules
//!
//! - [`logs`]: record model, extraction, batching, size enforcement and upload
//! - [`proto`]: wire messages for both ingestion APIs
//! - [`config`]: exporter settings loaded from defaults, YAML and environment
//! - [`metrics`]: counters for what has been sent
//! - [`token`]: bearer token resolution for the transports
//! - [`http`]: `reqwest` client construction
//! - [`logger`]: `tracing` formatter used by embedding binaries

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(unused_allocation)]
#![deny(unused_assignments)]
#![deny(unused_comparisons)]
#![deny(missing_copy_implementations)]
#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// Configuration management - YAML files, environment variables, and defaults
pub mod config;

/// HTTP client construction for the HTTPS ingestion API
pub mod http;

/// Logging infrastructure and tracing setup
pub mod logger;

/// Log extraction, batching, size enforcement and upload
pub mod logs;

/// Counters for batches, entries and bytes delivered
pub mod metrics;

/// Protobuf messages of the gRPC and HTTPS ingestion APIs
pub mod proto;

/// Bearer token resolution
pub mod token;
