// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sends requests to the ingestion API and classifies failures.
//!
//! Every failure comes back as an [`UploadError`]: `Transient` when the same
//! request may succeed later, `Permanent` when it will not. Callers retry the
//! former and drop the latter.
//!
//! | transport | transient                                                                 |
//! |-----------|---------------------------------------------------------------------------|
//! | gRPC      | `CANCELLED`, `UNAVAILABLE`, `DEADLINE_EXCEEDED`, `RESOURCE_EXHAUSTED`, `ABORTED` |
//! | HTTPS     | 500, 503, connection failures                                             |
//!
//! Anything else, including every 4xx, is permanent.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::StatusCode;
use thiserror::Error;
use tonic::codec::{CompressionEncoding, ProstCodec};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig};
use tonic::Code;
use tracing::{debug, warn};

use crate::config::{Compression, Config};
use crate::logs::batch::{HttpPayload, SplittableRequest};
use crate::proto::{BatchCreateLogsRequest, BatchCreateLogsResponse, BATCH_CREATE_LOGS_PATH};
use crate::token::TokenFactory;

/// What went wrong on the wire.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("gRPC call failed with {}: {}", .0.code(), .0.message())]
    Grpc(Box<tonic::Status>),
    #[error("received non-OK response: status {status}, body {body}")]
    Http { status: u16, body: String },
    #[error("send request: {0}")]
    Request(#[from] reqwest::Error),
    #[error("connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("upload cancelled")]
    Cancelled,
    #[error("obtain credentials: {0}")]
    Credentials(String),
    #[error("encode request: {0}")]
    Encode(String),
}

/// An upload failure tagged for the caller's retry layer.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{0}")]
    Transient(TransportError),
    #[error("permanent error: {0}")]
    Permanent(TransportError),
}

impl UploadError {
    /// Whether retrying the same request is pointless.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(self, UploadError::Permanent(_))
    }

    #[must_use]
    pub fn transport_error(&self) -> &TransportError {
        match self {
            UploadError::Transient(e) | UploadError::Permanent(e) => e,
        }
    }

    #[must_use]
    pub fn into_transport_error(self) -> TransportError {
        match self {
            UploadError::Transient(e) | UploadError::Permanent(e) => e,
        }
    }
}

/// Classifies a gRPC status.
#[must_use]
pub fn classify_grpc(status: tonic::Status) -> UploadError {
    match status.code() {
        Code::Cancelled
        | Code::Unavailable
        | Code::DeadlineExceeded
        | Code::ResourceExhausted
        | Code::Aborted => UploadError::Transient(TransportError::Grpc(Box::new(status))),
        _ => UploadError::Permanent(TransportError::Grpc(Box::new(status))),
    }
}

/// Classifies a non-OK HTTP response.
#[must_use]
pub fn classify_http(status: StatusCode, body: String) -> UploadError {
    let error = TransportError::Http {
        status: status.as_u16(),
        body,
    };
    match status {
        StatusCode::INTERNAL_SERVER_ERROR | StatusCode::SERVICE_UNAVAILABLE => {
            UploadError::Transient(error)
        }
        _ => UploadError::Permanent(error),
    }
}

/// Sends one request.
#[async_trait]
pub trait Uploader: Send + Sync {
    type Request: SplittableRequest + Send + Sync;

    async fn upload(&self, request: &Self::Request) -> Result<(), UploadError>;
}

async fn bearer_token(token_factory: &TokenFactory) -> Result<String, UploadError> {
    token_factory.get_token().await.ok_or_else(|| {
        UploadError::Transient(TransportError::Credentials(
            "token resolver returned no token".to_string(),
        ))
    })
}

/// The `BatchCreateLogs` RPC, abstracted so uploads can be exercised without a
/// network.
#[async_trait]
pub trait IngestionClient: Send + Sync {
    async fn batch_create_logs(
        &self,
        request: tonic::Request<BatchCreateLogsRequest>,
    ) -> Result<tonic::Response<BatchCreateLogsResponse>, tonic::Status>;
}

/// [`IngestionClient`] over a lazily connected TLS channel.
#[derive(Debug, Clone)]
pub struct TonicIngestionClient {
    grpc: tonic::client::Grpc<Channel>,
}

impl TonicIngestionClient {
    /// Prepares a channel to `{endpoint}:443`. No connection is made until the
    /// first call.
    ///
    /// The channel's worker is spawned on the current Tokio runtime, so this
    /// fails outside of one.
    pub fn connect_lazy(
        endpoint: &str,
        timeout: Duration,
        compression: Compression,
    ) -> Result<Self, TransportError> {
        let connect_error = |reason: String| TransportError::Connect {
            endpoint: endpoint.to_string(),
            reason,
        };
        tokio::runtime::Handle::try_current().map_err(|e| connect_error(e.to_string()))?;
        let channel = Channel::from_shared(format!("https://{endpoint}:443"))
            .map_err(|e| connect_error(e.to_string()))?
            .tls_config(ClientTlsConfig::new())
            .map_err(|e| connect_error(e.to_string()))?
            .timeout(timeout)
            .connect_lazy();

        let mut grpc = tonic::client::Grpc::new(channel);
        if compression == Compression::Gzip {
            grpc = grpc.send_compressed(CompressionEncoding::Gzip);
        }
        Ok(TonicIngestionClient { grpc })
    }

    pub fn from_config(config: &Config) -> Result<Self, TransportError> {
        Self::connect_lazy(
            &config.endpoint,
            Duration::from_secs(config.timeout),
            config.compression,
        )
    }
}

#[async_trait]
impl IngestionClient for TonicIngestionClient {
    async fn batch_create_logs(
        &self,
        request: tonic::Request<BatchCreateLogsRequest>,
    ) -> Result<tonic::Response<BatchCreateLogsResponse>, tonic::Status> {
        let mut grpc = self.grpc.clone();
        grpc.ready()
            .await
            .map_err(|e| tonic::Status::unavailable(format!("Service was not ready: {e}")))?;
        let codec: ProstCodec<BatchCreateLogsRequest, BatchCreateLogsResponse> =
            ProstCodec::default();
        grpc.unary(
            request,
            PathAndQuery::from_static(BATCH_CREATE_LOGS_PATH),
            codec,
        )
        .await
    }
}

pub struct GrpcUploader {
    client: Arc<dyn IngestionClient>,
    token_factory: Arc<TokenFactory>,
}

impl GrpcUploader {
    #[must_use]
    pub fn new(client: Arc<dyn IngestionClient>, token_factory: Arc<TokenFactory>) -> Self {
        GrpcUploader {
            client,
            token_factory,
        }
    }
}

impl std::fmt::Debug for GrpcUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "GrpcUploader")
    }
}

#[async_trait]
impl Uploader for GrpcUploader {
    type Request = BatchCreateLogsRequest;

    async fn upload(&self, request: &BatchCreateLogsRequest) -> Result<(), UploadError> {
        let mut grpc_request = tonic::Request::new(request.clone());
        let token = bearer_token(&self.token_factory).await?;
        if !token.is_empty() {
            let value: AsciiMetadataValue = format!("Bearer {token}").parse().map_err(|_| {
                UploadError::Permanent(TransportError::Credentials(
                    "token is not a valid header value".to_string(),
                ))
            })?;
            grpc_request.metadata_mut().insert("authorization", value);
        }

        self.client
            .batch_create_logs(grpc_request)
            .await
            .map(|_| ())
            .map_err(classify_grpc)
    }
}

#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    base_url: String,
    project: String,
    location: String,
    customer_id: String,
    compression: Compression,
    token_factory: Arc<TokenFactory>,
}

impl HttpUploader {
    #[must_use]
    pub fn new(client: reqwest::Client, config: &Config, token_factory: Arc<TokenFactory>) -> Self {
        HttpUploader {
            client,
            base_url: format!("https://{}-{}", config.location, config.endpoint),
            project: config.project.clone(),
            location: config.location.clone(),
            customer_id: config.customer_id.clone(),
            compression: config.compression,
            token_factory,
        }
    }

    /// Sends to `base_url` instead of the regional endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Import URL for `log_type`.
    #[must_use]
    pub fn url(&self, log_type: &str) -> String {
        format!(
            "{}/v1alpha/projects/{}/locations/{}/instances/{}/logTypes/{}/logs:import",
            self.base_url, self.project, self.location, self.customer_id, log_type
        )
    }

    fn encode(&self, payload: &HttpPayload) -> Result<Vec<u8>, TransportError> {
        let body =
            serde_json::to_vec(&payload.request).map_err(|e| TransportError::Encode(e.to_string()))?;
        match self.compression {
            Compression::None => Ok(body),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(&body)
                    .and_then(|()| encoder.finish())
                    .map_err(|e| TransportError::Encode(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    type Request = HttpPayload;

    async fn upload(&self, payload: &HttpPayload) -> Result<(), UploadError> {
        let body = self.encode(payload).map_err(UploadError::Permanent)?;
        let token = bearer_token(&self.token_factory).await?;

        let mut request = self
            .client
            .post(self.url(&payload.log_type))
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if self.compression == Compression::Gzip {
            request = request.header(CONTENT_ENCODING, "gzip");
        }
        if !token.is_empty() {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| UploadError::Transient(TransportError::Request(e)))?;
        let status = response.status();
        if status == StatusCode::OK {
            debug!("CHRONICLE | Imported {} logs", payload.entry_count());
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(
            status = status.as_u16(),
            "CHRONICLE | Received non-OK response from import endpoint: {body}"
        );
        Err(classify_http(status, body))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Mutex;

    use flate2::read::GzDecoder;
    use mockito::Matcher;
    use tracing_test::traced_test;

    use crate::config::Protocol;
    use crate::logs::batch::{BatchBuilder, HttpBatchBuilder};
    use crate::logs::extractor::{LogEntry, LogTypeGroup};

    const CUSTOMER_ID: &str = "12345678-1234-1234-1234-123456789012";

    #[test]
    fn test_classify_grpc() {
        for code in [
            Code::Cancelled,
            Code::Unavailable,
            Code::DeadlineExceeded,
            Code::ResourceExhausted,
            Code::Aborted,
        ] {
            assert!(!classify_grpc(tonic::Status::new(code, "x")).is_permanent());
        }
        for code in [
            Code::Unknown,
            Code::InvalidArgument,
            Code::NotFound,
            Code::PermissionDenied,
            Code::Unauthenticated,
            Code::Internal,
        ] {
            assert!(classify_grpc(tonic::Status::new(code, "x")).is_permanent());
        }
    }

    #[test]
    fn test_classify_http() {
        assert!(!classify_http(StatusCode::INTERNAL_SERVER_ERROR, String::new()).is_permanent());
        assert!(!classify_http(StatusCode::SERVICE_UNAVAILABLE, String::new()).is_permanent());
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::UNAUTHORIZED,
            StatusCode::FORBIDDEN,
            StatusCode::NOT_FOUND,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::BAD_GATEWAY,
            StatusCode::GATEWAY_TIMEOUT,
        ] {
            assert!(classify_http(status, String::new()).is_permanent(), "{status}");
        }
    }

    #[test]
    fn test_error_display_keeps_cause() {
        let error = classify_http(StatusCode::BAD_REQUEST, "bad log type".to_string());
        assert!(error.to_string().contains("bad log type"));
        assert!(matches!(
            error.into_transport_error(),
            TransportError::Http { status: 400, .. }
        ));
    }

    fn config(base: &str) -> Config {
        Config {
            customer_id: CUSTOMER_ID.to_string(),
            protocol: Protocol::Https,
            location: "us".to_string(),
            project: "proj".to_string(),
            forwarder: "fwd".to_string(),
            endpoint: base.to_string(),
            ..Config::default()
        }
    }

    fn payload() -> HttpPayload {
        HttpBatchBuilder::new("proj", "us", CUSTOMER_ID, "fwd").build(LogTypeGroup {
            log_type: "WINEVTLOG".to_string(),
            entries: vec![LogEntry {
                timestamp: 1,
                collection_time: 1,
                payload: "hello".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        })
    }

    fn import_path() -> String {
        format!(
            "/v1alpha/projects/proj/locations/us/instances/{CUSTOMER_ID}/logTypes/WINEVTLOG/logs:import"
        )
    }

    #[test]
    fn test_http_url() {
        let uploader = HttpUploader::new(
            reqwest::Client::new(),
            &config("chronicle.googleapis.com"),
            Arc::new(TokenFactory::anonymous()),
        );
        assert_eq!(
            uploader.url("WINEVTLOG"),
            format!("https://us-chronicle.googleapis.com{}", import_path())
        );
    }

    #[tokio::test]
    async fn test_http_upload_success() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", import_path().as_str())
            .match_header("authorization", "Bearer secret")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "inlineSource": {"logs": [{"data": "aGVsbG8="}]}
            })))
            .with_status(200)
            .create_async()
            .await;

        let uploader = HttpUploader::new(
            reqwest::Client::new(),
            &config("unused"),
            Arc::new(TokenFactory::new_from_static_token("secret")),
        )
        .with_base_url(server.url());

        uploader.upload(&payload()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_upload_gzip() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", import_path().as_str())
            .match_header("content-encoding", "gzip")
            .match_header("authorization", Matcher::Missing)
            .match_request(|request| {
                let Ok(body) = request.body() else {
                    return false;
                };
                let mut json = String::new();
                GzDecoder::new(body.as_slice())
                    .read_to_string(&mut json)
                    .is_ok()
                    && json.contains("aGVsbG8=")
            })
            .with_status(200)
            .create_async()
            .await;

        let mut config = config("unused");
        config.compression = Compression::Gzip;
        let uploader = HttpUploader::new(
            reqwest::Client::new(),
            &config,
            Arc::new(TokenFactory::anonymous()),
        )
        .with_base_url(server.url());

        uploader.upload(&payload()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    #[traced_test]
    async fn test_http_upload_classifies_status() {
        let mut server = mockito::Server::new_async().await;
        let uploader = HttpUploader::new(
            reqwest::Client::new(),
            &config("unused"),
            Arc::new(TokenFactory::anonymous()),
        )
        .with_base_url(server.url());

        let transient = server
            .mock("POST", import_path().as_str())
            .with_status(503)
            .with_body("try later")
            .create_async()
            .await;
        let error = uploader.upload(&payload()).await.unwrap_err();
        assert!(!error.is_permanent());
        assert!(logs_contain("try later"));
        transient.remove_async().await;

        let _permanent = server
            .mock("POST", import_path().as_str())
            .with_status(400)
            .create_async()
            .await;
        let error = uploader.upload(&payload()).await.unwrap_err();
        assert!(error.is_permanent());
    }

    #[tokio::test]
    async fn test_http_upload_connection_failure_is_transient() {
        let uploader = HttpUploader::new(
            reqwest::Client::new(),
            &config("unused"),
            Arc::new(TokenFactory::anonymous()),
        )
        .with_base_url("http://127.0.0.1:1");

        let error = uploader.upload(&payload()).await.unwrap_err();
        assert!(!error.is_permanent());
        assert!(matches!(error.transport_error(), TransportError::Request(_)));
    }

    #[tokio::test]
    async fn test_missing_token_is_transient() {
        let uploader = HttpUploader::new(
            reqwest::Client::new(),
            &config("unused"),
            Arc::new(TokenFactory::new_from_resolver(Arc::new(|| {
                Box::pin(async { None })
            }))),
        )
        .with_base_url("http://127.0.0.1:1");

        let error = uploader.upload(&payload()).await.unwrap_err();
        assert!(matches!(
            error,
            UploadError::Transient(TransportError::Credentials(_))
        ));
    }

    /// Records requests and answers with a fixed status.
    struct FakeClient {
        code: Code,
        seen: Mutex<Vec<(usize, Option<String>)>>,
    }

    #[async_trait]
    impl IngestionClient for FakeClient {
        async fn batch_create_logs(
            &self,
            request: tonic::Request<BatchCreateLogsRequest>,
        ) -> Result<tonic::Response<BatchCreateLogsResponse>, tonic::Status> {
            let auth = request
                .metadata()
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            self.seen
                .lock()
                .unwrap()
                .push((request.get_ref().entry_count(), auth));
            if self.code == Code::Ok {
                Ok(tonic::Response::new(BatchCreateLogsResponse {}))
            } else {
                Err(tonic::Status::new(self.code, "fake"))
            }
        }
    }

    fn grpc_request() -> BatchCreateLogsRequest {
        BatchCreateLogsRequest {
            batch: Some(crate::proto::LogEntryBatch {
                entries: vec![crate::proto::LogEntry::default(); 3],
                ..Default::default()
            }),
        }
    }

    #[tokio::test]
    async fn test_grpc_upload_sends_token() {
        let client = Arc::new(FakeClient {
            code: Code::Ok,
            seen: Mutex::new(Vec::new()),
        });
        let uploader = GrpcUploader::new(
            client.clone(),
            Arc::new(TokenFactory::new_from_static_token("secret")),
        );

        uploader.upload(&grpc_request()).await.unwrap();
        let seen = client.seen.lock().unwrap();
        assert_eq!(*seen, vec![(3, Some("Bearer secret".to_string()))]);
    }

    #[tokio::test]
    async fn test_grpc_upload_classifies_status() {
        for (code, permanent) in [
            (Code::Unavailable, false),
            (Code::ResourceExhausted, false),
            (Code::InvalidArgument, true),
            (Code::Unauthenticated, true),
        ] {
            let uploader = GrpcUploader::new(
                Arc::new(FakeClient {
                    code,
                    seen: Mutex::new(Vec::new()),
                }),
                Arc::new(TokenFactory::anonymous()),
            );
            let error = uploader.upload(&grpc_request()).await.unwrap_err();
            assert_eq!(error.is_permanent(), permanent, "{code:?}");
        }
    }

    #[tokio::test]
    async fn test_tonic_client_rejects_bad_endpoint() {
        let result =
            TonicIngestionClient::connect_lazy("bad endpoint", Duration::from_secs(1), Compression::None);
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }

    #[test]
    fn test_tonic_client_requires_runtime() {
        let result = TonicIngestionClient::connect_lazy(
            "malachiteingestion-pa.googleapis.com",
            Duration::from_secs(1),
            Compression::None,
        );
        assert!(matches!(result, Err(TransportError::Connect { .. })));
    }
}
