//! Shared helpers for integration tests.

#[allow(dead_code)]
pub mod socket_guard;

use harvester_core::{Document, DocumentMetadata};

/// Document with the given id, content and child URLs.
#[allow(dead_code)]
pub fn document(id: &str, content: &str, child_urls: &[String]) -> Document {
    Document::new(
        DocumentMetadata::new(id, format!("https://notes.test/{id}"), format!("Note {id}")),
        content,
    )
    .with_child_urls(child_urls.to_vec())
}
