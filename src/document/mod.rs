//! Document model shared by the crawl and scoring stages.
//!
//! A [`Document`] is created by a fetch (or loaded from disk), then mutated in
//! place by scoring and summarization. Mutators return `&mut Self` so calls can
//! be chained. Documents are never deleted; stages rebuild collections instead.
//!
//! Identity is the opaque `id` string. Equality on [`Document`] is structural
//! (every field), so identity-based deduplication goes through
//! [`merge_documents`] with an explicit key function instead.

mod merge;
mod store;

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use merge::{merge_by_key, merge_documents};
pub use store::{StoreError, WriteOptions, read_documents, write_documents};

/// Length of generated document identifiers (hex characters).
pub const DOCUMENT_ID_LEN: usize = 32;

/// Generates a random lowercase hex identifier of the given length.
#[must_use]
pub fn generate_hex_id(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let nibble: u32 = rng.gen_range(0..16);
            char::from_digit(nibble, 16).unwrap_or('0')
        })
        .collect()
}

/// Generates a fresh document identifier.
#[must_use]
pub fn generate_document_id() -> String {
    generate_hex_id(DOCUMENT_ID_LEN)
}

/// Content quality in `[0.0, 1.0]`.
///
/// `0.0` means noise with no informational value, `1.0` means fully relevant.
/// Construction rejects values outside the range (and NaN), so a stored score
/// is always valid.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct QualityScore(f64);

impl QualityScore {
    /// Score for documents with no informational value.
    pub const NOISE: Self = Self(0.0);

    /// Creates a score, returning `None` when `value` is not within `[0.0, 1.0]`.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the raw score value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for QualityScore {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("quality score {value} is outside [0.0, 1.0]"))
    }
}

impl From<QualityScore> for f64 {
    fn from(score: QualityScore) -> Self {
        score.0
    }
}

impl fmt::Display for QualityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Identifying information and free-form properties of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Same identity as the owning document.
    pub id: String,
    /// Source URL.
    pub url: String,
    /// Page or document title (may be empty).
    pub title: String,
    /// Free-form properties captured at fetch time.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl DocumentMetadata {
    /// Creates metadata with an empty property map.
    pub fn new(id: impl Into<String>, url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: title.into(),
            properties: Map::new(),
        }
    }

    /// Replaces the identifier with a random hex id and rewrites it inside the URL.
    ///
    /// Dashes are stripped from the old id before replacement, so Notion-style
    /// UUIDs embedded dash-free in URLs are rewritten too. The new id has the
    /// same length as the dash-free original.
    pub fn anonymise(&mut self) -> &mut Self {
        let original_id = self.id.replace('-', "");
        let anonymised_id = generate_hex_id(original_id.len());

        if !original_id.is_empty() {
            self.url = self.url.replace(&original_id, &anonymised_id);
        }
        self.id = anonymised_id;
        self
    }
}

/// A document flowing through the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stable identity, assigned once.
    #[serde(default = "generate_document_id")]
    pub id: String,
    /// Metadata owned by this document.
    pub metadata: DocumentMetadata,
    /// Metadata of the document this one was discovered from (relation only).
    #[serde(default)]
    pub parent_metadata: Option<DocumentMetadata>,
    /// Text body.
    pub content: String,
    /// Quality score; absent until a scorer assigns one.
    #[serde(default, alias = "content_quality_score")]
    pub quality_score: Option<QualityScore>,
    /// Optional summary.
    #[serde(default)]
    pub summary: Option<String>,
    /// URLs discovered inside the content, in discovery order.
    #[serde(default)]
    pub child_urls: Vec<String>,
}

impl Document {
    /// Creates a document whose id matches `metadata.id`.
    pub fn new(metadata: DocumentMetadata, content: impl Into<String>) -> Self {
        Self {
            id: metadata.id.clone(),
            metadata,
            parent_metadata: None,
            content: content.into(),
            quality_score: None,
            summary: None,
            child_urls: Vec::new(),
        }
    }

    /// Sets the parent back-reference.
    #[must_use]
    pub fn with_parent(mut self, parent: DocumentMetadata) -> Self {
        self.parent_metadata = Some(parent);
        self
    }

    /// Sets the discovered child URLs.
    #[must_use]
    pub fn with_child_urls(mut self, child_urls: Vec<String>) -> Self {
        self.child_urls = child_urls;
        self
    }

    /// Records a quality score.
    pub fn add_quality_score(&mut self, score: QualityScore) -> &mut Self {
        self.quality_score = Some(score);
        self
    }

    /// Records a summary.
    pub fn add_summary(&mut self, summary: impl Into<String>) -> &mut Self {
        self.summary = Some(summary.into());
        self
    }

    /// Returns true once any scorer has assigned a quality score.
    #[must_use]
    pub fn is_scored(&self) -> bool {
        self.quality_score.is_some()
    }

    /// Content length in characters.
    #[must_use]
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Anonymises this document and its parent back-reference in place.
    pub fn anonymise(&mut self) -> &mut Self {
        self.metadata.anonymise();
        if let Some(parent) = self.parent_metadata.as_mut() {
            parent.anonymise();
        }
        self.id.clone_from(&self.metadata.id);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample(id: &str) -> Document {
        Document::new(
            DocumentMetadata::new(
                id,
                format!("https://www.notion.so/page-{}", id.replace('-', "")),
                "Page",
            ),
            "body",
        )
    }

    #[test]
    fn test_generate_document_id_is_32_lowercase_hex() {
        let id = generate_document_id();
        assert_eq!(id.len(), DOCUMENT_ID_LEN);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(generate_document_id(), generate_document_id());
    }

    #[test]
    fn test_quality_score_range() {
        assert!(QualityScore::new(0.0).is_some());
        assert!(QualityScore::new(1.0).is_some());
        assert!(QualityScore::new(-0.01).is_none());
        assert!(QualityScore::new(1.01).is_none());
        assert!(QualityScore::new(f64::NAN).is_none());
    }

    #[test]
    fn test_add_quality_score_chains() {
        let mut doc = sample("abc");
        doc.add_quality_score(QualityScore::new(0.8).unwrap())
            .add_summary("short");
        assert_eq!(doc.quality_score.unwrap().value(), 0.8);
        assert_eq!(doc.summary.as_deref(), Some("short"));
        assert!(doc.is_scored());
    }

    #[test]
    fn test_content_len_counts_chars() {
        let doc = Document::new(DocumentMetadata::new("x", "u", "t"), "héllo");
        assert_eq!(doc.content_len(), 5);
    }

    #[test]
    fn test_anonymise_rewrites_id_and_url() {
        let mut doc = sample("1234-abcd");
        doc.parent_metadata = Some(DocumentMetadata::new("9999", "https://x/9999", "Parent"));
        doc.anonymise();

        assert_eq!(doc.id, doc.metadata.id);
        assert_eq!(doc.id.len(), "1234abcd".len());
        assert!(!doc.metadata.url.contains("1234abcd"));
        assert!(doc.metadata.url.ends_with(&doc.id));
        let parent = doc.parent_metadata.unwrap();
        assert_eq!(parent.id.len(), 4);
        assert!(parent.url.ends_with(&parent.id));
    }

    #[test]
    fn test_deserialize_accepts_legacy_score_field() {
        let json = r#"{
            "id": "a1",
            "metadata": {"id": "a1", "url": "https://example.com", "title": "T", "properties": {}},
            "content": "text",
            "content_quality_score": 0.4,
            "child_urls": ["https://example.com/x/"]
        }"#;
        let doc: Document = serde_json::from_str(json).unwrap();
        assert_eq!(doc.quality_score, QualityScore::new(0.4));
        assert_eq!(doc.child_urls.len(), 1);
        assert!(doc.parent_metadata.is_none());
    }

    #[test]
    fn test_deserialize_rejects_out_of_range_score() {
        let json = r#"{
            "id": "a1",
            "metadata": {"id": "a1", "url": "u", "title": "T"},
            "content": "text",
            "quality_score": 3.0
        }"#;
        assert!(serde_json::from_str::<Document>(json).is_err());
    }

    #[test]
    fn test_structural_equality_compares_content() {
        let a = sample("same");
        let mut b = sample("same");
        assert_eq!(a, b);
        b.content.push('!');
        assert_ne!(a, b);
    }
}
