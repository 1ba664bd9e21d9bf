//! Section list encoding.
//!
//! Content is encoded as a JSON array of sections. Storage uses the compact
//! form; exports use the indented form. Both decode to the same list.

use crate::error::{PassfileError, Result};
use crate::model::Section;

/// Encode sections to bytes.
///
/// `user_friendly` selects indented output for export and manual inspection.
pub fn serialize<S: Section>(sections: &[S], user_friendly: bool) -> Result<Vec<u8>> {
    let bytes = if user_friendly {
        serde_json::to_vec_pretty(sections)
    } else {
        serde_json::to_vec(sections)
    };
    bytes.map_err(|e| PassfileError::ContentCorrupt(format!("Failed to encode content: {}", e)))
}

/// Decode bytes into sections.
///
/// Empty input decodes to an empty list. Anything that is not a list of
/// well-formed sections fails with `ContentCorrupt`.
pub fn deserialize<S: Section>(bytes: &[u8]) -> Result<Vec<S>> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    serde_json::from_slice(bytes)
        .map_err(|e| PassfileError::ContentCorrupt(format!("Failed to decode content: {}", e)))
}
