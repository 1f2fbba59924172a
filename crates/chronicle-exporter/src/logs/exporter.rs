// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! One export call: marshal a payload, then upload its requests in order.
//!
//! Uploads run one at a time on the caller's task. The first failure stops the
//! call and is returned as is, so the caller's retry layer sees the
//! transient/permanent classification of the uploader. Cancellation is only
//! observed while a request is in flight and surfaces as a transient error.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::{Config, ConfigError, Protocol};
use crate::http::get_client;
use crate::logs::batch::{BatchBuilder, GrpcBatchBuilder, HttpBatchBuilder, SplittableRequest};
use crate::logs::marshaler::{MarshalError, Marshaler};
use crate::logs::record::Logs;
use crate::logs::uploader::{
    GrpcUploader, HttpUploader, TonicIngestionClient, TransportError, UploadError, Uploader,
};
use crate::metrics::ExportStats;
use crate::token::TokenFactory;

/// Errors raised while building an exporter.
#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Marshal(#[from] MarshalError),
    #[error("create gRPC client: {0}")]
    Transport(#[from] TransportError),
}

pub struct LogsExporter<B, U> {
    marshaler: Marshaler<B>,
    uploader: U,
    stats: Arc<ExportStats>,
}

pub type GrpcExporter = LogsExporter<GrpcBatchBuilder, GrpcUploader>;
pub type HttpExporter = LogsExporter<HttpBatchBuilder, HttpUploader>;

impl<B, U> LogsExporter<B, U>
where
    B: BatchBuilder + Send + Sync,
    U: Uploader<Request = B::Request>,
{
    #[must_use]
    pub fn new(marshaler: Marshaler<B>, uploader: U, stats: Arc<ExportStats>) -> Self {
        LogsExporter {
            marshaler,
            uploader,
            stats,
        }
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<ExportStats> {
        &self.stats
    }

    pub async fn export(&self, logs: &Logs, cancel: &CancellationToken) -> Result<(), UploadError> {
        let requests = self.marshaler.marshal(logs);
        if requests.is_empty() {
            debug!(
                "CHRONICLE | Nothing to upload for {} log records",
                logs.log_record_count()
            );
            return Ok(());
        }

        for request in &requests {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Err(UploadError::Transient(TransportError::Cancelled)),
                result = self.uploader.upload(request) => result,
            };

            if let Err(e) = result {
                error!(
                    permanent = e.is_permanent(),
                    "CHRONICLE | Failed to upload logs: {e}"
                );
                return Err(e);
            }
            self.stats
                .record_batch(request.entry_count(), request.encoded_size());
        }

        debug!("CHRONICLE | Uploaded {} requests", requests.len());
        Ok(())
    }
}

/// An exporter for whichever protocol the configuration selects.
pub enum ChronicleExporter {
    Grpc(GrpcExporter),
    Http(HttpExporter),
}

impl ChronicleExporter {
    /// Validates `config` and builds the exporter for its protocol.
    pub fn from_config(
        config: &Config,
        token_factory: Arc<TokenFactory>,
        stats: Arc<ExportStats>,
    ) -> Result<Self, ExporterError> {
        config.validate()?;
        match config.protocol {
            Protocol::Grpc => {
                let marshaler = Marshaler::<GrpcBatchBuilder>::from_config(config)?;
                let client = TonicIngestionClient::from_config(config)?;
                let uploader = GrpcUploader::new(Arc::new(client), token_factory);
                Ok(ChronicleExporter::Grpc(LogsExporter::new(
                    marshaler, uploader, stats,
                )))
            }
            Protocol::Https => {
                let marshaler = Marshaler::<HttpBatchBuilder>::from_config(config)?;
                let uploader = HttpUploader::new(get_client(config), config, token_factory);
                Ok(ChronicleExporter::Http(LogsExporter::new(
                    marshaler, uploader, stats,
                )))
            }
        }
    }

    pub async fn export(&self, logs: &Logs, cancel: &CancellationToken) -> Result<(), UploadError> {
        match self {
            ChronicleExporter::Grpc(exporter) => exporter.export(logs, cancel).await,
            ChronicleExporter::Http(exporter) => exporter.export(logs, cancel).await,
        }
    }

    #[must_use]
    pub fn stats(&self) -> &Arc<ExportStats> {
        match self {
            ChronicleExporter::Grpc(exporter) => exporter.stats(),
            ChronicleExporter::Http(exporter) => exporter.stats(),
        }
    }
}
