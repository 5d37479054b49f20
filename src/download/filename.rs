//! Filename derivation and sanitization for archived documents.
//!
//! Every filing maps to `{date}_{company}_{type}.pdf`. Resolution is a pure
//! function of its inputs and never fails: missing fields degrade to fixed
//! placeholders.

use std::collections::HashSet;

use super::constants::{DOCUMENT_EXTENSION, MAX_STEM_BYTES, UNKNOWN_DATE, UNKNOWN_DOCUMENT};
use crate::registry::DocumentRecord;

/// Resolves the output filename for one filing.
///
/// `used_names` holds names already assigned in the same folder; a clash is
/// disambiguated with `_2`, `_3`, ... before the extension.
///
/// # Example
///
/// ```
/// use std::collections::HashSet;
/// use dumpany_core::download::resolve_filename;
/// use dumpany_core::registry::{DocumentRecord, RecordShape};
///
/// let record = DocumentRecord {
///     shape: RecordShape::Current,
///     document_type: Some("confirmation-statement".to_string()),
///     filing_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1),
///     transaction_id: "T1".to_string(),
///     content_url: None,
/// };
///
/// let name = resolve_filename(&record, "ACME LIMITED", &HashSet::new());
/// assert_eq!(name, "2024-03-01_ACME_LIMITED_confirmation-statement.pdf");
/// ```
#[must_use]
pub fn resolve_filename<S>(
    record: &DocumentRecord,
    display_name: &str,
    used_names: &HashSet<String, S>,
) -> String
where
    S: std::hash::BuildHasher,
{
    let date = record.filing_date.map_or_else(
        || UNKNOWN_DATE.to_string(),
        |date| date.format("%Y-%m-%d").to_string(),
    );

    let type_slug = record
        .document_type
        .as_deref()
        .map(sanitize_filename_component)
        .filter(|slug| !slug.is_empty())
        .unwrap_or_else(|| UNKNOWN_DOCUMENT.to_string());

    let stem = sanitize_filename_component(&format!("{date}_{display_name}_{type_slug}"));
    let stem = truncate_stem(&stem, MAX_STEM_BYTES);

    disambiguate(stem, used_names)
}

/// Folder name for an entity: its sanitized display name, or the sanitized
/// identifier when the name has no usable characters.
#[must_use]
pub fn entity_folder_name(display_name: &str, entity_id: &str) -> String {
    let name = truncate_stem(&sanitize_filename_component(display_name), MAX_STEM_BYTES);
    if name.is_empty() {
        sanitize_filename_component(entity_id)
    } else {
        name
    }
}

/// Replaces path-unsafe characters and whitespace with `_`, collapses runs of
/// `_`, and trims them from both ends.
pub(crate) fn sanitize_filename_component(value: &str) -> String {
    let mut out = String::new();
    let mut prev_sep = false;
    for ch in value.chars() {
        let mapped = match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\'' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') => c,
            _ => '_',
        };
        if mapped == '_' {
            if !prev_sep {
                out.push('_');
                prev_sep = true;
            }
        } else {
            out.push(mapped);
            prev_sep = false;
        }
    }
    // Leading dots would make hidden files or `..` segments.
    out.trim_start_matches(['_', '.'])
        .trim_end_matches('_')
        .to_string()
}

/// Cuts `stem` to at most `max_bytes` without splitting a character.
fn truncate_stem(stem: &str, max_bytes: usize) -> String {
    if stem.len() <= max_bytes {
        return stem.to_string();
    }
    let mut end = max_bytes;
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    stem[..end].trim_end_matches(['_', '.']).to_string()
}

fn disambiguate<S>(stem: String, used_names: &HashSet<String, S>) -> String
where
    S: std::hash::BuildHasher,
{
    let candidate = format!("{stem}{DOCUMENT_EXTENSION}");
    if !used_names.contains(&candidate) {
        return candidate;
    }

    (2u32..)
        .map(|n| format!("{stem}_{n}{DOCUMENT_EXTENSION}"))
        .find(|name| !used_names.contains(name))
        .unwrap_or(candidate)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::registry::RecordShape;

    fn record(date: Option<(i32, u32, u32)>, document_type: Option<&str>) -> DocumentRecord {
        DocumentRecord {
            shape: RecordShape::Current,
            document_type: document_type.map(str::to_string),
            filing_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            transaction_id: "T".to_string(),
            content_url: Some("https://doc.example.com/document/T".to_string()),
        }
    }

    #[test]
    fn test_sanitize_filename_component_replaces_unsafe_chars() {
        assert_eq!(sanitize_filename_component("a/b\\c:d*e"), "a_b_c_d_e");
        assert_eq!(sanitize_filename_component("what?\"<x>|"), "what_x");
    }

    #[test]
    fn test_sanitize_filename_component_collapses_whitespace_and_runs() {
        assert_eq!(
            sanitize_filename_component("  ACME   (UK)  LIMITED  "),
            "ACME_UK_LIMITED"
        );
        assert_eq!(sanitize_filename_component("a___b"), "a_b");
    }

    #[test]
    fn test_sanitize_filename_component_keeps_safe_chars() {
        assert_eq!(
            sanitize_filename_component("accounts-with-accounts-type-full"),
            "accounts-with-accounts-type-full"
        );
        assert_eq!(sanitize_filename_component("SOCIÉTÉ"), "SOCIÉTÉ");
    }

    #[test]
    fn test_sanitize_filename_component_strips_dot_segments() {
        assert_eq!(sanitize_filename_component(".."), "");
        assert_eq!(sanitize_filename_component("../etc"), "etc");
    }

    #[test]
    fn test_resolve_filename_full_record() {
        let name = resolve_filename(
            &record(Some((2023, 4, 5)), Some("accounts-with-accounts-type-full")),
            "ACME LIMITED",
            &HashSet::new(),
        );
        assert_eq!(
            name,
            "2023-04-05_ACME_LIMITED_accounts-with-accounts-type-full.pdf"
        );
    }

    #[test]
    fn test_resolve_filename_is_deterministic() {
        let rec = record(Some((2020, 1, 31)), Some("capital"));
        let used: HashSet<String> = HashSet::new();
        assert_eq!(
            resolve_filename(&rec, "ACME", &used),
            resolve_filename(&rec, "ACME", &used)
        );
    }

    #[test]
    fn test_resolve_filename_missing_date_and_type_degrades() {
        let name = resolve_filename(&record(None, None), "ACME", &HashSet::new());
        assert_eq!(name, "UNKNOWN-DATE_ACME_unknown_document.pdf");
    }

    #[test]
    fn test_resolve_filename_legacy_record_without_date() {
        let rec = DocumentRecord {
            shape: RecordShape::Legacy,
            document_type: Some("Annual return / shuttle".to_string()),
            filing_date: None,
            transaction_id: "L1".to_string(),
            content_url: None,
        };
        let name = resolve_filename(&rec, "OLD CO", &HashSet::new());
        assert!(name.starts_with("UNKNOWN-DATE_"));
        assert_eq!(name, "UNKNOWN-DATE_OLD_CO_Annual_return_shuttle.pdf");
    }

    #[test]
    fn test_resolve_filename_type_that_sanitizes_to_empty_uses_placeholder() {
        let name = resolve_filename(&record(Some((2021, 6, 1)), Some("???")), "ACME", &HashSet::new());
        assert_eq!(name, "2021-06-01_ACME_unknown_document.pdf");
    }

    #[test]
    fn test_resolve_filename_collision_gets_numeric_suffix() {
        let rec = record(Some((2022, 2, 2)), Some("capital"));
        let mut used = HashSet::new();

        let first = resolve_filename(&rec, "ACME", &used);
        used.insert(first.clone());
        let second = resolve_filename(&rec, "ACME", &used);
        used.insert(second.clone());
        let third = resolve_filename(&rec, "ACME", &used);

        assert_eq!(first, "2022-02-02_ACME_capital.pdf");
        assert_eq!(second, "2022-02-02_ACME_capital_2.pdf");
        assert_eq!(third, "2022-02-02_ACME_capital_3.pdf");
    }

    #[test]
    fn test_resolve_filename_truncates_long_names_on_char_boundary() {
        let long_type = "é".repeat(300);
        let name = resolve_filename(&record(Some((2022, 2, 2)), Some(&long_type)), "ACME", &HashSet::new());

        let stem = name.strip_suffix(".pdf").unwrap();
        assert!(stem.len() <= MAX_STEM_BYTES);
        assert!(stem.starts_with("2022-02-02_ACME_"));
        assert!(stem.ends_with('é'));
    }

    #[test]
    fn test_entity_folder_name_falls_back_to_id() {
        assert_eq!(entity_folder_name("ACME LIMITED", "00445790"), "ACME_LIMITED");
        assert_eq!(entity_folder_name("***", "00445790"), "00445790");
    }
}
