//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns, so transport errors can
//! be logged and counted per document without extra bookkeeping.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while talking to the registry or writing documents.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The API rejected the credential.
    #[error(
        "[AUTH] HTTP {status} requesting {url}\n  Suggestion: check that API_KEY holds a valid Companies House REST key"
    )]
    AuthRequired {
        /// The URL that was rejected.
        url: String,
        /// 401 or 403.
        status: u16,
    },

    /// The response body was not the JSON shape we expected.
    #[error("malformed response from {url}: {source}")]
    Decode {
        /// The URL whose body failed to decode.
        url: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// A response that should carry a follow-up link did not.
    #[error("response from {url} has no {link} link")]
    MissingLink {
        /// The URL whose response lacked the link.
        url: String,
        /// Name of the missing link.
        link: &'static str,
    },

    /// File system error while writing a document.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates an authentication error.
    pub fn auth_required(url: impl Into<String>, status: u16) -> Self {
        Self::AuthRequired {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates a missing-link error.
    pub fn missing_link(url: impl Into<String>, link: &'static str) -> Self {
        Self::MissingLink {
            url: url.into(),
            link,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Returns true when the error came from the local filesystem.
    #[must_use]
    pub fn is_filesystem(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}

// No `From<reqwest::Error>` / `From<std::io::Error>`: every variant needs a url
// or path the source error does not carry.

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_download_error_timeout_display() {
        let error = DownloadError::timeout("https://api.example.com/company/00445790");
        assert!(error.to_string().contains("timeout"));
        assert!(error.to_string().contains("00445790"));
    }

    #[test]
    fn test_download_error_http_status_display() {
        let error = DownloadError::http_status("https://api.example.com/x", 404);
        let msg = error.to_string();
        assert!(msg.contains("404"), "Expected '404' in: {msg}");
        assert!(msg.contains("https://api.example.com/x"));
    }

    #[test]
    fn test_download_error_auth_required_mentions_api_key() {
        let error = DownloadError::auth_required("https://api.example.com/x", 401);
        let msg = error.to_string();
        assert!(msg.contains("[AUTH]"));
        assert!(msg.contains("API_KEY"));
    }

    #[test]
    fn test_download_error_missing_link_display() {
        let error = DownloadError::missing_link("https://doc.example.com/meta", "document");
        assert_eq!(
            error.to_string(),
            "response from https://doc.example.com/meta has no document link"
        );
    }

    #[test]
    fn test_download_error_io_is_filesystem() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let error = DownloadError::io("/dump/ACME/file.pdf", io_err);
        assert!(error.is_filesystem());
        assert!(error.to_string().contains("/dump/ACME/file.pdf"));
        assert!(!DownloadError::timeout("x").is_filesystem());
    }

    #[test]
    fn test_download_error_decode_has_source() {
        use std::error::Error as _;
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = DownloadError::decode("https://api.example.com/x", json_err);
        assert!(error.source().is_some());
    }
}
