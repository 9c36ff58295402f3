//! Deterministic rule tier.
//!
//! Scores documents that are empty or mostly links without any network call.
//! Everything else is deferred to the model tier.

use crate::document::{Document, QualityScore};

/// At or above this URL ratio a document is pure noise.
pub const NOISE_URL_RATIO: f64 = 0.7;

/// At or above this URL ratio (and below [`NOISE_URL_RATIO`]) a document is
/// mostly links.
pub const LINK_HEAVY_URL_RATIO: f64 = 0.5;

/// Score given to link-heavy documents.
pub const LINK_HEAVY_SCORE: f64 = 0.2;

/// What the rule tier did with a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleOutcome {
    /// The document already had a score; nothing was evaluated.
    AlreadyScored,
    /// A rule assigned this score.
    Scored(QualityScore),
    /// No rule applied; the model tier decides.
    Deferred,
}

/// Total characters of child URLs divided by content characters.
///
/// The denominator is at least one, so empty content never divides by zero.
#[must_use]
pub fn url_ratio(document: &Document) -> f64 {
    let url_chars: usize = document.child_urls.iter().map(|u| u.chars().count()).sum();
    let content_chars = document.content_len().max(1);
    #[allow(clippy::cast_precision_loss)]
    let ratio = url_chars as f64 / content_chars as f64;
    ratio
}

/// Applies the URL-ratio rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleScorer;

impl RuleScorer {
    /// Creates a rule scorer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Decides without mutating.
    #[must_use]
    pub fn evaluate(&self, document: &Document) -> RuleOutcome {
        if document.is_scored() {
            return RuleOutcome::AlreadyScored;
        }
        if document.content_len() == 0 {
            return RuleOutcome::Scored(QualityScore::NOISE);
        }

        let ratio = url_ratio(document);
        if ratio >= NOISE_URL_RATIO {
            RuleOutcome::Scored(QualityScore::NOISE)
        } else if ratio >= LINK_HEAVY_URL_RATIO {
            QualityScore::new(LINK_HEAVY_SCORE).map_or(RuleOutcome::Deferred, RuleOutcome::Scored)
        } else {
            RuleOutcome::Deferred
        }
    }

    /// Evaluates and records any rule score on the document.
    pub fn apply(&self, document: &mut Document) -> RuleOutcome {
        let outcome = self.evaluate(document);
        if let RuleOutcome::Scored(score) = outcome {
            document.add_quality_score(score);
        }
        outcome
    }
}
