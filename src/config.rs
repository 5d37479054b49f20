//! Run configuration: the API credential and where documents go.
//!
//! Values come from the process environment first, then from a `.env` file in
//! the working directory, then from defaults. CLI flags are applied on top by
//! the binary.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

use crate::registry::Endpoints;

/// Registry API key (required).
pub const API_KEY_VAR: &str = "API_KEY";

/// Root folder for per-company document folders.
pub const DUMP_DIR_VAR: &str = "DUMP_DIR";

/// Overrides the public API base URL.
pub const API_BASE_URL_VAR: &str = "API_BASE_URL";

/// Overrides the document API base URL.
pub const DOCUMENT_API_URL_VAR: &str = "DOCUMENT_API_URL";

/// Default root folder, relative to the working directory.
pub const DEFAULT_DUMP_DIR: &str = "dump";

/// Name of the optional dotenv file read from the working directory.
pub const DOTENV_FILE: &str = ".env";

/// Loaded configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub api_key: String,
    pub dump_dir: PathBuf,
    pub endpoints: Endpoints,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("dump_dir", &self.dump_dir)
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

impl Config {
    /// Loads configuration from the environment and `./.env`.
    ///
    /// # Errors
    ///
    /// Fails when `.env` exists but cannot be read or parsed, or when no
    /// `API_KEY` is set anywhere.
    pub fn load() -> Result<Self> {
        let dotenv = read_dotenv(Path::new(DOTENV_FILE))?;
        Self::from_sources(|key| env::var(key).ok(), &dotenv)
    }

    /// Builds configuration from a variable lookup and parsed dotenv entries.
    ///
    /// `lookup` wins over `dotenv`; empty values count as unset.
    ///
    /// # Errors
    ///
    /// Fails when no `API_KEY` is available.
    pub fn from_sources<F>(lookup: F, dotenv: &HashMap<String, String>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .or_else(|| dotenv.get(key).filter(|v| !v.trim().is_empty()).cloned())
                .map(|value| value.trim().to_string())
        };

        let Some(api_key) = get(API_KEY_VAR) else {
            bail!(
                "{API_KEY_VAR} is not set\n  Suggestion: export {API_KEY_VAR}=<your registry API key> or add it to {DOTENV_FILE}"
            );
        };

        let dump_dir = get(DUMP_DIR_VAR).map_or_else(|| PathBuf::from(DEFAULT_DUMP_DIR), PathBuf::from);

        let defaults = Endpoints::default();
        let endpoints = Endpoints {
            api_base: get(API_BASE_URL_VAR).unwrap_or(defaults.api_base),
            document_base: get(DOCUMENT_API_URL_VAR).unwrap_or(defaults.document_base),
        };

        debug!(dump_dir = %dump_dir.display(), api_base = %endpoints.api_base, "configuration loaded");

        Ok(Self {
            api_key,
            dump_dir,
            endpoints,
        })
    }
}

/// Reads a dotenv file; a missing file yields no entries.
fn read_dotenv(path: &Path) -> Result<HashMap<String, String>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read '{}'", path.display()));
        }
    };
    parse_dotenv_str(&raw).with_context(|| format!("Failed to parse '{}'", path.display()))
}

/// Parses `KEY=value` lines.
///
/// Blank lines and `#` comments are ignored, an `export ` prefix is allowed,
/// and values may be wrapped in single or double quotes. Unquoted values may
/// carry a trailing ` # comment`.
fn parse_dotenv_str(raw: &str) -> Result<HashMap<String, String>> {
    let mut entries = HashMap::new();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid syntax on line {}: expected KEY=value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("Invalid variable name '{}' on line {}", key, line_index + 1);
        }

        let value = parse_value(raw_value.trim())
            .with_context(|| format!("Invalid `{key}` value on line {}", line_index + 1))?;
        entries.insert(key.to_string(), value);
    }
    Ok(entries)
}

fn parse_value(raw_value: &str) -> Result<String> {
    for quote in ['"', '\''] {
        if let Some(rest) = raw_value.strip_prefix(quote) {
            let Some(end) = rest.find(quote) else {
                bail!("Unterminated quoted value");
            };
            return Ok(rest[..end].to_string());
        }
    }
    Ok(strip_inline_comment(raw_value).trim_end().to_string())
}

fn strip_inline_comment(value: &str) -> &str {
    match value.find(" #") {
        Some(index) => &value[..index],
        None => value,
    }
}
