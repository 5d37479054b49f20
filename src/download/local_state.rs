//! Snapshot of the documents already present in an entity folder.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, instrument};

use super::DownloadError;
use super::constants::PARTIAL_SUFFIX;

/// Lists the regular files in `folder`.
///
/// A missing folder is an empty set. Unfinished `.part` downloads are left
/// out, so they are fetched again rather than skipped.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] when the folder exists but cannot be read.
#[instrument(skip_all, fields(folder = %folder.display()))]
pub async fn existing_documents(folder: &Path) -> Result<HashSet<String>, DownloadError> {
    let mut names = HashSet::new();

    let mut entries = match tokio::fs::read_dir(folder).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("folder does not exist yet");
            return Ok(names);
        }
        Err(e) => return Err(DownloadError::io(folder, e)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| DownloadError::io(folder, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| DownloadError::io(entry.path(), e))?;
        if !file_type.is_file() {
            continue;
        }

        // Non-UTF-8 names can never match a resolved filename.
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if name.ends_with(PARTIAL_SUFFIX) {
            continue;
        }
        names.insert(name);
    }

    debug!(count = names.len(), "indexed existing documents");
    Ok(names)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_existing_documents_missing_folder_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let names = existing_documents(&temp_dir.path().join("nope"))
            .await
            .unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn test_existing_documents_lists_regular_files_only() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join("2020-01-01_ACME_capital.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.join("2021-01-01_ACME_capital.pdf.part"), b"%PD").unwrap();
        std::fs::create_dir(dir.join("subdir")).unwrap();

        let names = existing_documents(dir).await.unwrap();

        assert_eq!(names.len(), 2);
        assert!(names.contains("2020-01-01_ACME_capital.pdf"));
        assert!(names.contains("notes.txt"));
        assert!(!names.contains("2021-01-01_ACME_capital.pdf.part"));
        assert!(!names.contains("subdir"));
    }
}
