//! Fetching: retrieve the raw bytes behind a classified reference.
//!
//! Remote images are downloaded with a streaming, capped read. The cap is
//! enforced on the bytes actually received rather than on `Content-Length`,
//! so a server that lies about (or omits) the length still cannot make us
//! buffer more than `max_image_size` bytes. Local images are read whole from
//! disk without a cap.

use crate::config::BundleConfig;
use crate::error::{BundleError, FetchError};
use crate::pipeline::classify::Target;
use futures::{Stream, StreamExt};
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Raw bytes of an image plus the media type the source declared, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    pub bytes: Vec<u8>,
    pub declared_type: Option<String>,
}

/// Retrieves image bytes over HTTP or from the local filesystem.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_image_size: u64,
}

impl Fetcher {
    /// Build a fetcher with its own HTTP client using the config's timeout.
    pub fn new(config: &BundleConfig) -> Result<Self, BundleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BundleError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, config.max_image_size))
    }

    /// Use a caller-supplied client (proxy, TLS roots, timeouts) as-is.
    pub fn with_client(client: reqwest::Client, max_image_size: u64) -> Self {
        Self {
            client,
            max_image_size,
        }
    }

    pub fn max_image_size(&self) -> u64 {
        self.max_image_size
    }

    pub async fn fetch(&self, target: &Target) -> Result<FetchedImage, FetchError> {
        match target {
            Target::Remote(url) => self.fetch_remote(url).await,
            Target::Local(path) => fetch_local(path).await,
        }
    }

    async fn fetch_remote(&self, url: &Url) -> Result<FetchedImage, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::RemoteStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(len) = response.content_length() {
            if len > self.max_image_size {
                return Err(FetchError::TooLarge {
                    limit: self.max_image_size,
                });
            }
        }

        let declared_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| transport_error(url, &e)));
        let bytes = read_capped(body, self.max_image_size).await?;

        debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(FetchedImage {
            bytes,
            declared_type,
        })
    }
}

/// Read a local image file in full.
pub async fn fetch_local(path: &Path) -> Result<FetchedImage, FetchError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(FetchedImage {
                bytes,
                declared_type: None,
            })
        }
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            Err(FetchError::NotFound {
                path: path.to_path_buf(),
            })
        }
        Err(e) => Err(FetchError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

/// Drain `body` into memory, failing once more than `limit` bytes arrive.
///
/// A body of exactly `limit` bytes is accepted.
pub async fn read_capped<S, B>(body: S, limit: u64) -> Result<Vec<u8>, FetchError>
where
    S: Stream<Item = Result<B, FetchError>>,
    B: AsRef<[u8]>,
{
    let mut body = std::pin::pin!(body);
    let mut buf = Vec::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        if (buf.len() + chunk.len()) as u64 > limit {
            return Err(FetchError::TooLarge { limit });
        }
        buf.extend_from_slice(chunk);
    }
    Ok(buf)
}

fn transport_error(url: &Url, e: &reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
        timed_out: e.is_timeout(),
    }
}
