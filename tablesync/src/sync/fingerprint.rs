//! Content fingerprints for inserted and updated records

use std::collections::BTreeSet;

use sha2::{Digest, Sha256};

use super::types::Record;

/// SHA-256 over the record's `(field, value)` pairs restricted to `columns`.
///
/// Fields are visited in sorted name order and values are normalized first,
/// so the digest only depends on content. A column missing from the record
/// hashes as null.
pub fn content_fingerprint(record: &Record, columns: &BTreeSet<String>) -> String {
    let mut hasher = Sha256::new();
    for field in columns {
        let value = record
            .get(field)
            .map(|v| v.normalized().to_json())
            .unwrap_or(serde_json::Value::Null);
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
        hasher.update(value.to_string().as_bytes());
        hasher.update([0x1e]);
    }
    format!("{:x}", hasher.finalize())
}
