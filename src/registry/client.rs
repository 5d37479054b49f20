//! Typed access to the registry endpoints the sync engine needs.
//!
//! Every call goes through [`send_with_retry`], so each attempt is charged
//! against the shared [`RateGovernor`] and transient failures are retried.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};
use url::Url;

use super::types::{CompanyProfile, DocumentMetadata, FilingHistoryPage};
use crate::download::{
    DownloadError, HttpClient, RateGovernor, RequestFailure, RetryPolicy, send_with_retry,
};
use crate::entity::EntityId;

/// Public REST API base.
pub const DEFAULT_API_BASE_URL: &str = "https://api.company-information.service.gov.uk";

/// Document API base, used to resolve relative metadata links.
pub const DEFAULT_DOCUMENT_API_URL: &str = "https://document-api.company-information.service.gov.uk";

/// Base URLs for the two registry APIs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub api_base: String,
    pub document_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE_URL.to_string(),
            document_base: DEFAULT_DOCUMENT_API_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Points both APIs at one base URL (handy for mock servers).
    #[must_use]
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            api_base: base.clone(),
            document_base: base,
        }
    }
}

/// Registry API client shared by every entity in a run.
#[derive(Debug)]
pub struct RegistryClient {
    http: HttpClient,
    governor: Arc<RateGovernor>,
    retry_policy: RetryPolicy,
    endpoints: Endpoints,
}

impl RegistryClient {
    #[must_use]
    pub fn new(
        http: HttpClient,
        governor: Arc<RateGovernor>,
        retry_policy: RetryPolicy,
        endpoints: Endpoints,
    ) -> Self {
        Self {
            http,
            governor,
            retry_policy,
            endpoints,
        }
    }

    /// Returns the shared rate governor.
    #[must_use]
    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Looks up a company's registered name.
    ///
    /// Returns `Ok(None)` when the profile carries no name.
    ///
    /// # Errors
    ///
    /// Returns [`RequestFailure`] when the profile cannot be fetched.
    #[instrument(skip(self), fields(company = %company))]
    pub async fn company_name(&self, company: &EntityId) -> Result<Option<String>, RequestFailure> {
        let url = self.api_url(&format!("company/{company}"));
        let profile: CompanyProfile = send_with_retry(&self.retry_policy, &self.governor, &url, || {
            self.http.get_json(&url)
        })
        .await?;

        Ok(profile
            .company_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty()))
    }

    /// Fetches one page of a company's filing history.
    ///
    /// # Errors
    ///
    /// Returns [`RequestFailure`] when the page cannot be fetched or decoded.
    #[instrument(skip(self), fields(company = %company))]
    pub async fn filing_history_page(
        &self,
        company: &EntityId,
        start_index: u64,
        items_per_page: u32,
    ) -> Result<FilingHistoryPage, RequestFailure> {
        let url = self.api_url(&format!(
            "company/{company}/filing-history?items_per_page={items_per_page}&start_index={start_index}"
        ));
        send_with_retry(&self.retry_policy, &self.governor, &url, || {
            self.http.get_json(&url)
        })
        .await
    }

    /// Resolves a filing's metadata link to its binary content link.
    ///
    /// # Errors
    ///
    /// Returns [`RequestFailure`] when the metadata cannot be fetched or
    /// carries no document link.
    #[instrument(skip(self))]
    pub async fn document_content_link(&self, metadata_link: &str) -> Result<String, RequestFailure> {
        let url = self
            .document_url(metadata_link)
            .map_err(RequestFailure::before_send)?;

        let http = &self.http;
        let url_ref = url.as_str();
        let link = send_with_retry(&self.retry_policy, &self.governor, url_ref, || async move {
            let metadata: DocumentMetadata = http.get_json(url_ref).await?;
            metadata
                .document_link()
                .map(str::to_string)
                .ok_or_else(|| DownloadError::missing_link(url_ref, "document"))
        })
        .await?;

        self.document_url(&link)
            .map_err(RequestFailure::before_send)
    }

    /// Downloads a document's content to `dest`, returning bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`RequestFailure`] when every attempt fails; a filesystem
    /// failure is never retried.
    #[instrument(skip(self, dest), fields(dest = %dest.display()))]
    pub async fn download_document(
        &self,
        content_link: &str,
        dest: &Path,
    ) -> Result<u64, RequestFailure> {
        send_with_retry(&self.retry_policy, &self.governor, content_link, || {
            self.http.download_document(content_link, dest)
        })
        .await
    }

    fn api_url(&self, path_and_query: &str) -> String {
        format!(
            "{}/{path_and_query}",
            self.endpoints.api_base.trim_end_matches('/')
        )
    }

    /// Makes a document API link absolute.
    fn document_url(&self, link: &str) -> Result<String, DownloadError> {
        if Url::parse(link).is_ok() {
            return Ok(link.to_string());
        }
        let base = Url::parse(&self.endpoints.document_base)
            .map_err(|_| DownloadError::invalid_url(&self.endpoints.document_base))?;
        let joined = base
            .join(link)
            .map_err(|_| DownloadError::invalid_url(link))?;
        debug!(link, resolved = %joined, "resolved relative document link");
        Ok(joined.to_string())
    }
}
