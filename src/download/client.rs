//! HTTP client wrapper for the registry API.
//!
//! This module provides the `HttpClient` struct which sends authenticated
//! JSON requests and streams document bodies to disk with proper timeout
//! configuration and error handling.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{ACCEPT, LOCATION, RETRY_AFTER};
use reqwest::redirect::Policy;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, PARTIAL_SUFFIX, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use crate::user_agent;

/// Media type requested for document content.
const PDF_MEDIA_TYPE: &str = "application/pdf";

/// HTTP client holding the API credential.
///
/// Created once per run and cloned freely; clones share one connection pool.
/// Redirects are never followed automatically, so the credential cannot leak
/// to a host it was not meant for.
///
/// # Example
///
/// ```no_run
/// use dumpany_core::download::HttpClient;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new("my-api-key")?;
/// let bytes = client
///     .download_document("https://document-api.example.com/document/abc/content", Path::new("./a.pdf"))
///     .await?;
/// println!("wrote {bytes} bytes");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    api_key: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Creates a client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large filings)
    /// - Gzip decompression: enabled
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the TLS backend cannot be
    /// initialized.
    pub fn new(api_key: impl Into<String>) -> Result<Self, DownloadError> {
        Self::with_timeouts(api_key, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::ClientBuild`] if the client cannot be built.
    #[instrument(level = "debug", skip(api_key))]
    pub fn with_timeouts(
        api_key: impl Into<String>,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .redirect(Policy::none())
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(DownloadError::ClientBuild)?;
        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    /// Fetches `url` with the credential and decodes the JSON body.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns a non-success status
    /// - The body is not the expected JSON
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_json<T>(&self, url: &str) -> Result<T, DownloadError>
    where
        T: DeserializeOwned,
    {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let request = self
            .client
            .get(url)
            .basic_auth(&self.api_key, Some(""))
            .header(ACCEPT, "application/json");
        let response = check_status(url, send(url, request).await?)?;

        let body = response
            .bytes()
            .await
            .map_err(|e| map_transport_error(url, e))?;
        serde_json::from_slice(&body).map_err(|e| DownloadError::decode(url, e))
    }

    /// Downloads a document body to `dest`.
    ///
    /// The content endpoint normally answers with a redirect to object
    /// storage; the redirect is followed once without the credential. The
    /// body streams into `{dest}.part`, which is renamed onto `dest` only
    /// after the last byte is flushed.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns transport errors as for [`get_json`](Self::get_json), and
    /// [`DownloadError::Io`] when the file cannot be written or renamed.
    #[instrument(skip(self), fields(url = %url, dest = %dest.display()))]
    pub async fn download_document(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let parsed_url = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let request = self
            .client
            .get(url)
            .basic_auth(&self.api_key, Some(""))
            .header(ACCEPT, PDF_MEDIA_TYPE);
        let response = send(url, request).await?;

        let (content_url, response) = if response.status().is_redirection() {
            let location = redirect_target(&parsed_url, &response)?;
            debug!(location = %location, "following content redirect without credential");
            let request = self.client.get(location.as_str()).header(ACCEPT, PDF_MEDIA_TYPE);
            let response = send(location.as_str(), request).await?;
            (location.to_string(), response)
        } else {
            (url.to_string(), response)
        };
        let response = check_status(&content_url, response)?;

        let partial_path = partial_path_for(dest);
        let mut file = File::create(&partial_path)
            .await
            .map_err(|e| DownloadError::io(partial_path.clone(), e))?;

        let stream_result = stream_to_file(&mut file, response, &content_url, &partial_path).await;
        drop(file);

        let bytes_written = match stream_result {
            Ok(bytes) => bytes,
            Err(error) => {
                debug!(path = %partial_path.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(&partial_path).await;
                return Err(error);
            }
        };

        tokio::fs::rename(&partial_path, dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        info!(path = %dest.display(), bytes = bytes_written, "download complete");
        Ok(bytes_written)
    }
}

/// Path of the in-flight file for `dest`.
pub(crate) fn partial_path_for(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

async fn send(url: &str, request: reqwest::RequestBuilder) -> Result<Response, DownloadError> {
    request
        .send()
        .await
        .map_err(|e| map_transport_error(url, e))
}

fn map_transport_error(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

/// Turns a non-success response into the matching error.
fn check_status(url: &str, response: Response) -> Result<Response, DownloadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let status_code = status.as_u16();
    if matches!(status_code, 401 | 403) {
        return Err(DownloadError::auth_required(url, status_code));
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(std::string::ToString::to_string);
    Err(DownloadError::http_status_with_retry_after(
        url,
        status_code,
        retry_after,
    ))
}

/// Resolves the `Location` of a redirect against the request URL.
fn redirect_target(base: &Url, response: &Response) -> Result<Url, DownloadError> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            DownloadError::http_status(base.as_str(), response.status().as_u16())
        })?;
    base.join(location)
        .map_err(|_| DownloadError::invalid_url(location))
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: &mut File,
    response: Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| map_transport_error(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path.to_path_buf(), e))?;

    Ok(bytes_written)
}
