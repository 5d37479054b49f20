//! Lazy walk over a company's filing history.

use std::collections::VecDeque;

use tracing::{debug, instrument};

use super::client::RegistryClient;
use super::types::DocumentRecord;
use crate::download::RequestFailure;
use crate::download::constants::DEFAULT_PAGE_SIZE;
use crate::entity::EntityId;

/// Yields a company's filings one at a time, fetching pages on demand.
///
/// The walk ends on a short page, an empty page, or once `start_index`
/// reaches the reported `total_count`. After an error the paginator is
/// finished; callers start a fresh one on the next run.
#[derive(Debug)]
pub struct FilingPaginator<'a> {
    client: &'a RegistryClient,
    company: EntityId,
    page_size: u32,
    next_start: u64,
    buffer: VecDeque<DocumentRecord>,
    finished: bool,
    pages_fetched: u32,
}

impl<'a> FilingPaginator<'a> {
    /// Creates a paginator; `page_size` is clamped to 1-100.
    #[must_use]
    pub fn new(client: &'a RegistryClient, company: EntityId, page_size: u32) -> Self {
        Self {
            client,
            company,
            page_size: page_size.clamp(1, DEFAULT_PAGE_SIZE),
            next_start: 0,
            buffer: VecDeque::new(),
            finished: false,
            pages_fetched: 0,
        }
    }

    /// Number of pages requested so far.
    #[must_use]
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Returns the next filing, or `None` once the history is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`RequestFailure`] when a page cannot be fetched; the
    /// paginator yields nothing afterwards.
    pub async fn next_record(&mut self) -> Result<Option<DocumentRecord>, RequestFailure> {
        if self.buffer.is_empty() && !self.finished {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }

    #[instrument(skip(self), fields(company = %self.company, start_index = self.next_start))]
    async fn fetch_page(&mut self) -> Result<(), RequestFailure> {
        let page = match self
            .client
            .filing_history_page(&self.company, self.next_start, self.page_size)
            .await
        {
            Ok(page) => page,
            Err(failure) => {
                self.finished = true;
                return Err(failure);
            }
        };
        self.pages_fetched += 1;

        let count = page.items.len() as u64;
        self.next_start += count;

        let short_page = count < u64::from(self.page_size);
        let reached_total = page
            .total_count
            .is_some_and(|total| self.next_start >= total);
        if count == 0 || short_page || reached_total {
            self.finished = true;
        }

        debug!(
            items = count,
            total_count = page.total_count,
            finished = self.finished,
            "fetched filing history page"
        );

        self.buffer
            .extend(page.items.into_iter().map(DocumentRecord::from));
        Ok(())
    }
}
