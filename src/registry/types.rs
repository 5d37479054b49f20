//! Wire types for the Companies House REST API and the normalized
//! [`DocumentRecord`] the rest of the crate works with.
//!
//! Only the fields needed to name, dedupe and fetch documents are modelled;
//! everything else in the payloads is ignored.

use chrono::NaiveDate;
use serde::Deserialize;

/// `description` values that mark a filing whose real label lives in
/// `description_values.description`.
const LEGACY_DESCRIPTIONS: [&str; 2] = ["legacy", "miscellaneous"];

/// One page of `GET /company/{id}/filing-history`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilingHistoryPage {
    /// Filings on this page, newest first.
    #[serde(default)]
    pub items: Vec<FilingHistoryItem>,
    /// Total filings across all pages, when the API reports it.
    #[serde(default)]
    pub total_count: Option<u64>,
}

/// A raw filing-history item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilingHistoryItem {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_values: Option<DescriptionValues>,
    /// Form type (`AA`, `CS01`, ...).
    #[serde(default, rename = "type")]
    pub form_type: Option<String>,
    #[serde(default)]
    pub links: Option<FilingLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptionValues {
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilingLinks {
    #[serde(default)]
    pub document_metadata: Option<String>,
}

/// `GET /company/{id}`; only the name is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanyProfile {
    #[serde(default)]
    pub company_name: Option<String>,
}

/// `GET {document_metadata}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub links: Option<DocumentLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentLinks {
    #[serde(default)]
    pub document: Option<String>,
}

impl DocumentMetadata {
    /// Returns the binary content link, if present and non-empty.
    #[must_use]
    pub fn document_link(&self) -> Option<&str> {
        self.links
            .as_ref()
            .and_then(|links| non_empty(links.document.as_deref()))
    }
}

/// Which metadata era a filing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape {
    /// Type label comes from `description`.
    Current,
    /// Type label comes from `description_values.description`.
    Legacy,
}

/// A filing, normalized once at ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub shape: RecordShape,
    /// Already-selected type label: the era's description, then `category`,
    /// then the form type. `None` when no field carried one.
    pub document_type: Option<String>,
    /// `None` when the date was missing or unparseable.
    pub filing_date: Option<NaiveDate>,
    pub transaction_id: String,
    /// Document metadata link used to locate the binary.
    pub content_url: Option<String>,
}

impl From<FilingHistoryItem> for DocumentRecord {
    fn from(item: FilingHistoryItem) -> Self {
        let description = non_empty(item.description.as_deref());
        let category = non_empty(item.category.as_deref());
        let form_type = non_empty(item.form_type.as_deref());

        let shape = match description {
            Some(desc) if LEGACY_DESCRIPTIONS.contains(&desc) => RecordShape::Legacy,
            _ => RecordShape::Current,
        };

        let primary = match shape {
            RecordShape::Legacy => item
                .description_values
                .as_ref()
                .and_then(|values| non_empty(values.description.as_deref())),
            RecordShape::Current => description,
        };

        let filing_date = item
            .date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok());

        let content_url = item
            .links
            .as_ref()
            .and_then(|links| non_empty(links.document_metadata.as_deref()))
            .map(str::to_string);

        Self {
            shape,
            document_type: primary.or(category).or(form_type).map(str::to_string),
            filing_date,
            transaction_id: item.transaction_id.unwrap_or_default(),
            content_url,
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
