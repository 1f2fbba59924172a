// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns a payload of logs into the ordered list of requests to upload.

use std::time::SystemTime;

use thiserror::Error;
use uuid::Uuid;

use crate::config::Config;
use crate::logs::batch::{BatchBuilder, GrpcBatchBuilder, HttpBatchBuilder};
use crate::logs::enforcer::{BatchLimits, SizeEnforcer};
use crate::logs::extractor::{ExtractorSettings, RecordExtractor};
use crate::logs::field::FieldError;
use crate::logs::record::Logs;

/// Errors raised while constructing a marshaler, before any record is seen.
#[derive(Debug, Error)]
pub enum MarshalError {
    #[error("parse customer ID: {0}")]
    CustomerId(#[from] uuid::Error),
    #[error("raw_log_field is invalid: {0}")]
    RawLogField(#[from] FieldError),
}

/// Extract, group, build and split, for one transport.
#[derive(Debug, Clone)]
pub struct Marshaler<B> {
    extractor: RecordExtractor,
    builder: B,
    enforcer: SizeEnforcer,
}

pub type GrpcMarshaler = Marshaler<GrpcBatchBuilder>;
pub type HttpMarshaler = Marshaler<HttpBatchBuilder>;

impl<B: BatchBuilder> Marshaler<B> {
    #[must_use]
    pub fn new(extractor: RecordExtractor, builder: B, limits: BatchLimits) -> Self {
        Marshaler {
            extractor,
            builder,
            enforcer: SizeEnforcer::new(limits),
        }
    }

    #[must_use]
    pub fn builder(&self) -> &B {
        &self.builder
    }

    #[must_use]
    pub fn limits(&self) -> BatchLimits {
        self.enforcer.limits()
    }

    /// Requests for `logs`, grouped by log type in first-seen order. Within a log
    /// type, requests keep the order of the records.
    #[must_use]
    pub fn marshal(&self, logs: &Logs) -> Vec<B::Request> {
        self.extractor
            .extract(logs)
            .into_iter()
            .filter(|group| !group.entries.is_empty())
            .flat_map(|group| self.enforcer.enforce(self.builder.build(group)))
            .collect()
    }
}

impl Marshaler<GrpcBatchBuilder> {
    pub fn grpc(
        settings: ExtractorSettings,
        customer_id: &str,
        limits: BatchLimits,
    ) -> Result<Self, MarshalError> {
        let customer_id = Uuid::parse_str(customer_id)?;
        let extractor = RecordExtractor::new(settings)?;
        let builder = GrpcBatchBuilder::new(customer_id, SystemTime::now());
        Ok(Marshaler::new(extractor, builder, limits))
    }

    pub fn from_config(config: &Config) -> Result<Self, MarshalError> {
        Self::grpc(
            config.extractor_settings(),
            &config.customer_id,
            config.batch_limits(),
        )
    }
}

impl Marshaler<HttpBatchBuilder> {
    pub fn http(
        settings: ExtractorSettings,
        customer_id: &str,
        project: &str,
        location: &str,
        forwarder: &str,
        limits: BatchLimits,
    ) -> Result<Self, MarshalError> {
        Uuid::parse_str(customer_id)?;
        let extractor = RecordExtractor::new(settings)?;
        let builder = HttpBatchBuilder::new(project, location, customer_id, forwarder);
        Ok(Marshaler::new(extractor, builder, limits))
    }

    pub fn from_config(config: &Config) -> Result<Self, MarshalError> {
        Self::http(
            config.extractor_settings(),
            &config.customer_id,
            &config.project,
            &config.location,
            &config.forwarder,
            config.batch_limits(),
        )
    }
}
