//! User-Agent string sent with every registry request.

/// Product token identifying the tool to the registry.
const PRODUCT: &str = "dumpany";

/// Default User-Agent (identifies the tool and its version).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("{PRODUCT}/{version} (companies-house-document-archiver)")
}
