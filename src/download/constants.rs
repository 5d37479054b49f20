//! Constants for the download module (timeouts, quota, naming).

use std::time::Duration;

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes for large filings).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Requests allowed per quota window (Companies House: 600 per 5 minutes).
pub const DEFAULT_QUOTA_REQUESTS: u32 = 600;

/// Length of the rolling quota window.
pub const DEFAULT_QUOTA_WINDOW: Duration = Duration::from_secs(300);

/// Minimum spacing between consecutive API requests used by the CLI.
pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

/// Warning threshold for cumulative quota wait (30 seconds).
pub const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Maximum Retry-After header value (1 hour) to prevent excessive delays.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Default filing-history page size (API maximum is 100).
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Placeholder used when a filing has no usable date.
pub const UNKNOWN_DATE: &str = "UNKNOWN-DATE";

/// Type label used when no metadata field describes the document.
pub const UNKNOWN_DOCUMENT: &str = "unknown_document";

/// Extension of every archived document.
pub const DOCUMENT_EXTENSION: &str = ".pdf";

/// Suffix for in-flight downloads; renamed away once the body is complete.
pub const PARTIAL_SUFFIX: &str = ".part";

/// Byte cap for a filename stem (before suffix and extension).
pub const MAX_STEM_BYTES: usize = 200;
