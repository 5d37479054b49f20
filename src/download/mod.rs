//! Document sync engine and the HTTP plumbing under it.
//!
//! This module provides everything between a company number and a folder of
//! PDFs: the authenticated HTTP client, the shared rate governor, the bounded
//! retry wrapper, filename resolution, the on-disk index used for skipping,
//! and the per-company [`DownloadEngine`].
//!
//! # Features
//!
//! - Streaming downloads into `.part` files, renamed into place when complete
//! - One process-wide request quota shared by every caller
//! - Bounded exponential backoff for transient failures, honoring `Retry-After`
//! - Deterministic, collision-free filenames from current and legacy metadata
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use dumpany_core::download::HttpClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new("my-api-key")?;
//! let bytes = client
//!     .download_document(
//!         "https://document-api.company-information.service.gov.uk/document/abc/content",
//!         Path::new("./dump/TESCO_PLC/2024-01-01_TESCO_PLC_accounts.pdf"),
//!     )
//!     .await?;
//! println!("Downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod engine;
mod error;
mod filename;
mod local_state;
pub mod rate_limiter;
mod retry;

pub use client::HttpClient;
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadEngine, EngineError, EntityOutcome, EntitySummary,
    ProgressEvent, SyncError,
};
pub use error::DownloadError;
pub use filename::{entity_folder_name, resolve_filename};
pub use local_state::existing_documents;
pub use rate_limiter::{RateGovernor, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RequestFailure, RetryDecision, RetryPolicy,
    classify_error, send_with_retry,
};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
