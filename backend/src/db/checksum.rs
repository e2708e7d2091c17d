//! Checksums for skipping unchanged cache rows.

use sha2::{Digest, Sha256};

use crate::models::{GeCategory, WebsocResponse};

/// Calculate the hex SHA-256 checksum of `content`.
pub fn calculate_checksum(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

/// Checksum of a stored fragment together with its GE tags, so a re-tagged
/// section is rewritten even when its WebSoc data did not change.
pub fn section_checksum(
    fragment: &WebsocResponse,
    ge_categories: &[GeCategory],
) -> Result<String, serde_json::Error> {
    let content = serde_json::to_string(&(fragment, ge_categories))?;
    Ok(calculate_checksum(&content))
}
