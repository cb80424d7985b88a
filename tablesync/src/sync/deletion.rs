//! Deletion set computation per deletion policy

use std::collections::HashSet;

use super::types::DeletionPolicy;

/// Persisted keys to delete under `policy`.
///
/// `persisted` is the full key universe exactly as stored; returned keys keep
/// their stored spelling so the delete hits the real row. Comparison against
/// the upload uses trimmed keys, and every persisted key appears at most once.
pub fn deletion_set(policy: DeletionPolicy, persisted: &[String], uploaded: &[String]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();

    match policy {
        DeletionPolicy::None => Vec::new(),
        DeletionPolicy::All => persisted
            .iter()
            .filter(|k| seen.insert(k.as_str()))
            .cloned()
            .collect(),
        DeletionPolicy::Missing => {
            let upload: HashSet<&str> = uploaded.iter().map(|k| k.trim()).collect();
            persisted
                .iter()
                .filter(|k| !upload.contains(k.trim()))
                .filter(|k| seen.insert(k.as_str()))
                .cloned()
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_none_is_empty() {
        let persisted = keys(&["A", "B"]);
        assert!(deletion_set(DeletionPolicy::None, &persisted, &[]).is_empty());
    }

    #[test]
    fn test_missing_is_difference() {
        let persisted = keys(&["A", "B ", "C", "C"]);
        let uploaded = keys(&[" B", "A"]);

        let doomed = deletion_set(DeletionPolicy::Missing, &persisted, &uploaded);

        assert_eq!(doomed, keys(&["C"]));
    }

    #[test]
    fn test_missing_keeps_stored_spelling() {
        let persisted = keys(&[" D "]);
        let doomed = deletion_set(DeletionPolicy::Missing, &persisted, &keys(&["A"]));
        assert_eq!(doomed, keys(&[" D "]));
    }

    #[test]
    fn test_all_is_universe() {
        let persisted = keys(&["A", "B", "A"]);
        let doomed = deletion_set(DeletionPolicy::All, &persisted, &keys(&["A"]));
        assert_eq!(doomed, keys(&["A", "B"]));
    }
}
