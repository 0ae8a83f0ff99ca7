//! Loading schema documents and payloads.

use std::borrow::Cow;
use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;

/// Load a JSON document (schema document or payload) from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if the file isn't valid JSON.
pub fn load_document(path: &Path) -> Result<Value, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_document_str(&content)
}

/// Load a JSON document from a string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't valid JSON.
pub fn load_document_str(content: &str) -> Result<Value, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source })
}

/// Navigate a JSON Pointer fragment (e.g., "#/definitions/foo" or
/// "#/components/schemas/bar").
///
/// Returns the value at the given JSON Pointer path within the document.
/// The leading '#' is optional.
pub fn navigate_fragment<'a>(document: &'a Value, fragment: &str) -> Result<&'a Value, LoadError> {
    let path = fragment.trim_start_matches('#').trim_start_matches('/');
    if path.is_empty() {
        return Ok(document);
    }

    let mut current = document;
    for part in path.split('/') {
        let key = unescape(part);
        current = current
            .get(key.as_str())
            .ok_or_else(|| LoadError::FragmentNotFound {
                fragment: fragment.to_string(),
            })?;
    }
    Ok(current)
}

/// Last segment of a local reference, unescaped.
///
/// `#/definitions/io.k8s.api.core.v1.Pod` yields `io.k8s.api.core.v1.Pod`.
pub fn reference_id(reference: &str) -> Cow<'_, str> {
    let segment = reference.rsplit('/').next().unwrap_or(reference);
    if segment.contains('~') {
        Cow::Owned(unescape(segment))
    } else {
        Cow::Borrowed(segment)
    }
}

// JSON Pointer decoding (~1 = /, ~0 = ~)
fn unescape(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}
