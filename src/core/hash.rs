//! Content hashing for tamper-evident entity rows.
//!
//! Every hashed value has the form `v1:<64 lowercase hex>`. The version prefix lets a
//! future algorithm coexist with rows already written under `v1`.

use crate::core::error::{Result, WorkflowError};
use sha2::{Digest, Sha256};

pub const HASH_VERSION: &str = "v1";

/// Separator between fields. Keeps `("ab", "c")` and `("a", "bc")` distinct.
const FIELD_SEPARATOR: &str = "\0";

/// CRLF to LF, then trim surrounding whitespace.
pub fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").trim().to_string()
}

fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{}:{:x}", HASH_VERSION, hasher.finalize())
}

pub fn hash(text: &str) -> String {
    digest(normalize(text).as_bytes())
}

pub fn hash_fields(fields: &[&str]) -> String {
    let joined = fields
        .iter()
        .map(|f| normalize(f))
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR);
    digest(joined.as_bytes())
}

/// Everything before the first `:`; `None` for unversioned input.
pub fn extract_version(hash: &str) -> Option<&str> {
    hash.split_once(':').map(|(version, _)| version)
}

/// Everything after the first `:`, or the whole input when there is no prefix.
pub fn extract_value(hash: &str) -> &str {
    hash.split_once(':').map(|(_, value)| value).unwrap_or(hash)
}

pub fn is_well_formed(hash: &str) -> bool {
    extract_version(hash) == Some(HASH_VERSION)
        && extract_value(hash).len() == 64
        && extract_value(hash)
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Byte-for-byte comparison of a stored hash against one recomputed from current fields.
pub fn verify(
    entity_type: &'static str,
    entity_id: &str,
    stored: &str,
    recomputed: &str,
) -> Result<()> {
    if stored == recomputed {
        return Ok(());
    }
    tracing::error!(
        entity_type,
        entity_id,
        expected = stored,
        actual = recomputed,
        "content hash mismatch"
    );
    Err(WorkflowError::HashVerification {
        entity_type,
        entity_id: entity_id.to_string(),
        expected: stored.to_string(),
        actual: recomputed.to_string(),
    })
}

pub fn phase_hash(name: &str, description: &str) -> String {
    hash_fields(&[name, description])
}

pub fn decision_hash(phase_id: &str, title: &str, statement: &str, rationale: &str) -> String {
    hash_fields(&[phase_id, title, statement, rationale])
}

pub fn task_hash(decision_id: &str, title: &str, description: &str) -> String {
    hash_fields(&[decision_id, title, description])
}

/// Shared by documents and their close-time snapshots.
pub fn document_hash(phase_id: &str, title: &str, content: &str) -> String {
    hash_fields(&[phase_id, title, content])
}
