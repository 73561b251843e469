//! Android manifest inspection.
//!
//! The package name in `AndroidManifest.xml` decides which apk names to look
//! for. Manifests in the wild are not always complete documents: templated
//! projects ship fragments without a `manifest` root, sometimes with an XML
//! declaration still attached. Wrapping the content in a synthetic root
//! makes both shapes parse the same way.

use super::LocateError;
use std::path::Path;
use tracing::debug;

/// Reads `path` and extracts the `package` attribute of the `manifest`
/// element. `Ok(None)` when the document has no such attribute.
pub(crate) fn android_package_name(path: &Path) -> Result<Option<String>, LocateError> {
    let content = std::fs::read_to_string(path).map_err(|source| LocateError::ManifestRead {
        path: path.to_path_buf(),
        source,
    })?;
    let package = package_name_from_fragment(&content)?;
    debug!(manifest = %path.display(), package = ?package, "inspected android manifest");
    Ok(package)
}

fn package_name_from_fragment(content: &str) -> Result<Option<String>, LocateError> {
    // An XML declaration is only legal at the very start of a document; it
    // has to go before the fragment is wrapped.
    let body = match content.trim_start().strip_prefix("<?xml") {
        Some(rest) => rest.split_once("?>").map(|(_, tail)| tail).unwrap_or(rest),
        None => content,
    };
    let wrapped = format!("<wrapper>{}</wrapper>", body);

    let doc = roxmltree::Document::parse(&wrapped).map_err(LocateError::ManifestParse)?;
    let package = doc
        .descendants()
        .find(|node| node.has_tag_name("manifest"))
        .and_then(|node| node.attribute("package"))
        .map(str::to_string);
    Ok(package)
}
