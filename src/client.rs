//! Outbound HTTP client for the OCR relay service.
//!
//! One submission per run: the document bytes go up as a multipart form
//! together with the ordered backend list, and the response body is the
//! event stream consumed by the processing service. The [`Submitter`]
//! trait is the seam between the pipeline and the transport so tests can
//! script byte streams without a network.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use thiserror::Error;

use crate::config::Settings;
use crate::models::{BackendSet, Document};

/// The raw response byte feed, in transport-chosen chunk sizes.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// Errors from the submission transport.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection-level failure (refused, dropped, DNS, TLS). Fatal to
    /// the run when it happens before any event is decoded.
    #[error("connection error: {0}")]
    Connection(String),
    /// The service answered with a non-2xx status.
    #[error("service returned HTTP {status}")]
    Status { status: u16 },
    #[error("failed to encode backend list: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transport abstraction for submitting a document and receiving the
/// event stream.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(
        &self,
        document: &Document,
        backends: &BackendSet,
    ) -> Result<ByteStream, ClientError>;
}

/// Real HTTP transport against the relay's `/api/ocr` endpoint.
pub struct HttpSubmitter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSubmitter {
    /// Build a transport from settings (timeout, user agent, base URL).
    pub fn new(settings: &Settings) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(std::time::Duration::from_secs(settings.request_timeout))
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: settings.service_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    async fn submit(
        &self,
        document: &Document,
        backends: &BackendSet,
    ) -> Result<ByteStream, ClientError> {
        let url = format!("{}/api/ocr", self.base_url);
        tracing::info!(
            "submitting {} ({} bytes) to {} with {} backend(s)",
            document.name,
            document.size(),
            url,
            backends.len()
        );

        let file_part = reqwest::multipart::Part::bytes(document.bytes.clone())
            .file_name(document.name.clone())
            .mime_str("application/pdf")
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("api_configs", backends.to_wire_json()?);

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response
            .bytes_stream()
            .map_ok(|chunk| chunk.to_vec())
            .map_err(|e| ClientError::Connection(e.to_string()))
            .boxed())
    }
}
