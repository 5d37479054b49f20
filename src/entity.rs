//! Company number parsing and normalization.
//!
//! Company numbers are eight characters: digits only for England and Wales
//! (`00445790`), or a two-letter prefix for other registers (`SC123456`,
//! `NI012345`). Users often drop the leading zeros, so short numeric input is
//! padded.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Canonical company number length.
const COMPANY_NUMBER_LEN: usize = 8;

/// 1-8 ASCII alphanumerics, checked after trimming and upper-casing.
#[allow(clippy::expect_used)]
static COMPANY_NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z0-9]{1,8}$").expect("company number regex is valid") // Static pattern, safe to panic
});

/// Separators accepted between company numbers in one line of input.
#[allow(clippy::expect_used)]
static LIST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,;\s]+").expect("separator regex is valid"));

/// Errors from company number parsing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityIdError {
    /// Input is not 1-8 letters or digits.
    #[error(
        "invalid company number '{input}'\n  Suggestion: company numbers are up to 8 letters or digits, e.g. 00445790 or SC123456"
    )]
    Invalid {
        /// The offending input, as typed.
        input: String,
    },

    /// No company numbers were given at all.
    #[error("no company numbers given")]
    Empty,
}

/// A normalized company number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(String);

impl EntityId {
    /// Parses and normalizes one company number.
    ///
    /// # Errors
    ///
    /// Returns [`EntityIdError::Invalid`] when the input is not 1-8 ASCII
    /// letters or digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use dumpany_core::EntityId;
    ///
    /// assert_eq!(EntityId::parse(" 445790 ").unwrap().as_str(), "00445790");
    /// assert_eq!(EntityId::parse("sc123456").unwrap().as_str(), "SC123456");
    /// assert!(EntityId::parse("not a number").is_err());
    /// ```
    pub fn parse(raw: &str) -> Result<Self, EntityIdError> {
        let candidate = raw.trim().to_ascii_uppercase();
        if !COMPANY_NUMBER_PATTERN.is_match(&candidate) {
            return Err(EntityIdError::Invalid {
                input: raw.trim().to_string(),
            });
        }

        let normalized = if candidate.len() < COMPANY_NUMBER_LEN
            && candidate.bytes().all(|b| b.is_ascii_digit())
        {
            format!("{candidate:0>width$}", width = COMPANY_NUMBER_LEN)
        } else {
            candidate
        };

        Ok(Self(normalized))
    }

    /// Returns the normalized company number.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parses a list of company numbers separated by commas, semicolons or
/// whitespace. Duplicates are dropped, keeping the first occurrence.
///
/// # Errors
///
/// Returns the first invalid entry, or [`EntityIdError::Empty`] when the
/// input holds no entries.
pub fn parse_entity_list<I, S>(inputs: I) -> Result<Vec<EntityId>, EntityIdError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids: Vec<EntityId> = Vec::new();
    for input in inputs {
        for token in LIST_SEPARATOR.split(input.as_ref()) {
            if token.is_empty() {
                continue;
            }
            let id = EntityId::parse(token)?;
            if ids.contains(&id) {
                debug!(company = %id, "dropping duplicate company number");
            } else {
                ids.push(id);
            }
        }
    }

    if ids.is_empty() {
        return Err(EntityIdError::Empty);
    }
    Ok(ids)
}

/// A company to archive: its number and the name its folder is derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: EntityId,
    /// Registered name, or the company number when the name could not be
    /// looked up.
    pub display_name: String,
}

impl Entity {
    #[must_use]
    pub fn new(id: EntityId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    /// An entity whose name is unknown; the company number stands in.
    #[must_use]
    pub fn unnamed(id: EntityId) -> Self {
        let display_name = id.to_string();
        Self { id, display_name }
    }
}
