//! Companies House registry access: wire types, the API client, and the
//! filing-history paginator.

mod client;
mod paginator;
pub mod types;

pub use client::{DEFAULT_API_BASE_URL, DEFAULT_DOCUMENT_API_URL, Endpoints, RegistryClient};
pub use paginator::FilingPaginator;
pub use types::{DocumentRecord, RecordShape};
