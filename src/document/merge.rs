//! Identity-based merging of document collections.

use std::collections::HashSet;
use std::hash::Hash;

use super::Document;

/// Combines two collections, keeping the first item seen for each key.
///
/// Items from `original` are visited before items from `discovered`, so when a
/// discovered item collides with an original one the original wins. Duplicate
/// keys inside either input are collapsed as well.
pub fn merge_by_key<T, K, F>(original: Vec<T>, discovered: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut seen = HashSet::with_capacity(original.len() + discovered.len());
    original
        .into_iter()
        .chain(discovered)
        .filter(|item| seen.insert(key(item)))
        .collect()
}

/// Merges newly discovered documents into a working set by document id.
#[must_use]
pub fn merge_documents(original: Vec<Document>, discovered: Vec<Document>) -> Vec<Document> {
    merge_by_key(original, discovered, |document| document.id.clone())
}
