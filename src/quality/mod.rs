//! Two-tier quality scoring.
//!
//! # Overview
//!
//! Every document moves through a small state machine:
//!
//! ```text
//! Unscored -> RuleScored                      (rule tier, terminal)
//!          -> ModelPending -> ModelScored     (model tier succeeded)
//!                          -> ModelUnresolved (failed after all sweeps)
//! ```
//!
//! The rule tier ([`RuleScorer`]) runs first, synchronously, and scores empty
//! or link-heavy documents. Only documents it defers reach the model tier
//! ([`ModelScorer`]), which runs completions through the batch engine and
//! retries unresolved documents in slower sweeps. Documents that already
//! carry a score are left alone by both tiers.

mod model;
mod prompt;
mod response;
mod rules;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

pub use model::{ModelScorer, ModelTierReport, ScoringJob};
pub use prompt::{
    CHARS_PER_TOKEN, ClipError, DEFAULT_MAX_PROMPT_TOKENS, PromptBuilder, estimate_tokens,
};
pub use response::parse_score;
pub use rules::{
    LINK_HEAVY_SCORE, LINK_HEAVY_URL_RATIO, NOISE_URL_RATIO, RuleOutcome, RuleScorer, url_ratio,
};

use crate::batch::{BatchObserver, BatchRunner, BatchStats, EngineError, NoopObserver, SweepPolicy};
use crate::config::QualityConfig;
use crate::document::Document;
use crate::llm::{CompletionClient, MockClient};

/// Where a document ended up after scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreState {
    /// Not yet evaluated.
    Unscored,
    /// Already carried a score on input; not re-evaluated.
    Preserved,
    /// Scored by the rule tier.
    RuleScored,
    /// Deferred to the model tier, not yet resolved.
    ModelPending,
    /// Scored by the model tier.
    ModelScored,
    /// The model tier could not produce a score.
    ModelUnresolved,
}

impl ScoreState {
    /// Returns true for states that carry a score.
    #[must_use]
    pub fn has_score(self) -> bool {
        matches!(self, Self::Preserved | Self::RuleScored | Self::ModelScored)
    }
}

/// Scored documents and stage counters.
#[derive(Debug)]
pub struct QualityReport {
    /// Documents in input order.
    pub documents: Vec<Document>,
    /// Final state of each document, parallel to `documents`.
    pub states: Vec<ScoreState>,
    /// Counters per model-tier pass.
    pub passes: Vec<BatchStats>,
    /// True if a model-tier pass hit its deadline.
    pub timed_out: bool,
}

impl QualityReport {
    fn count(&self, state: ScoreState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }

    /// Number of documents processed.
    #[must_use]
    pub fn total(&self) -> usize {
        self.documents.len()
    }

    /// Documents that carry a score.
    #[must_use]
    pub fn scored(&self) -> usize {
        self.states.iter().filter(|s| s.has_score()).count()
    }

    /// Documents scored by the rule tier.
    #[must_use]
    pub fn rule_scored(&self) -> usize {
        self.count(ScoreState::RuleScored)
    }

    /// Documents scored by the model tier.
    #[must_use]
    pub fn model_scored(&self) -> usize {
        self.count(ScoreState::ModelScored)
    }

    /// Documents left without a score.
    #[must_use]
    pub fn unresolved(&self) -> usize {
        self.count(ScoreState::ModelUnresolved)
    }

    /// Documents that were already scored on input.
    #[must_use]
    pub fn preserved(&self) -> usize {
        self.count(ScoreState::Preserved)
    }
}

/// Rule tier followed by model tier.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    rules: RuleScorer,
    model: ModelScorer,
}

impl QualityScorer {
    /// Builds a scorer from configuration.
    ///
    /// In mock mode `client` is replaced by an offline [`MockClient`] that
    /// always answers 0.5, and pacing is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] for an out-of-range
    /// concurrency.
    pub fn new(
        config: &QualityConfig,
        client: Arc<dyn CompletionClient>,
    ) -> Result<Self, EngineError> {
        Self::with_observer(config, client, Arc::new(NoopObserver))
    }

    /// Builds a scorer that reports model-tier progress to `observer`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] for an out-of-range
    /// concurrency.
    pub fn with_observer(
        config: &QualityConfig,
        client: Arc<dyn CompletionClient>,
        observer: Arc<dyn BatchObserver>,
    ) -> Result<Self, EngineError> {
        let runner = BatchRunner::new(config.concurrency)?
            .with_label("quality")
            .with_deadline(config.deadline())
            .with_observer(observer);

        let (client, policy): (Arc<dyn CompletionClient>, SweepPolicy) = if config.use_mock {
            (
                Arc::new(MockClient::default()),
                SweepPolicy::new(Duration::ZERO, Duration::ZERO, config.retry_sweeps),
            )
        } else {
            (
                client,
                SweepPolicy::new(
                    config.first_pass_pacing(),
                    config.retry_pacing(),
                    config.retry_sweeps,
                ),
            )
        };

        let model = ModelScorer::new(
            client,
            &config.model_id,
            PromptBuilder::new(config.max_prompt_tokens),
            runner,
            policy,
        );
        Ok(Self {
            rules: RuleScorer::new(),
            model,
        })
    }

    /// Scores a batch of documents.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError`] from the batch runner. Individual scoring
    /// failures only leave documents unscored.
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn score_batch(
        &self,
        mut documents: Vec<Document>,
    ) -> Result<QualityReport, EngineError> {
        let mut states = vec![ScoreState::Unscored; documents.len()];
        let mut pending = Vec::new();

        for (slot, document) in documents.iter_mut().enumerate() {
            states[slot] = match self.rules.apply(document) {
                RuleOutcome::AlreadyScored => ScoreState::Preserved,
                RuleOutcome::Scored(_) => ScoreState::RuleScored,
                RuleOutcome::Deferred => {
                    pending.push(slot);
                    ScoreState::ModelPending
                }
            };
        }

        info!(
            rule_scored = states.iter().filter(|s| **s == ScoreState::RuleScored).count(),
            deferred = pending.len(),
            "rule tier complete"
        );

        let tier = self.model.score(&mut documents, &pending).await?;
        for &slot in &tier.scored {
            states[slot] = ScoreState::ModelScored;
        }
        for &slot in &tier.unresolved {
            states[slot] = ScoreState::ModelUnresolved;
        }

        let report = QualityReport {
            documents,
            states,
            passes: tier.passes,
            timed_out: tier.timed_out,
        };
        info!(
            total = report.total(),
            scored = report.scored(),
            rule_scored = report.rule_scored(),
            model_scored = report.model_scored(),
            unresolved = report.unresolved(),
            "quality scoring complete"
        );
        Ok(report)
    }

    /// Scores a single document.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError`] from the batch runner.
    pub async fn score_one(
        &self,
        document: Document,
    ) -> Result<(Document, ScoreState), EngineError> {
        let report = self.score_batch(vec![document]).await?;
        let state = report.states.first().copied().unwrap_or(ScoreState::Unscored);
        match report.documents.into_iter().next() {
            Some(document) => Ok((document, state)),
            None => Err(EngineError::EmptyBatch { stage: "score_one" }),
        }
    }
}
