//! Model tier: one completion per deferred document, with retry sweeps.

use std::fmt;
use std::sync::Arc;

use tracing::{info, instrument};

use super::prompt::PromptBuilder;
use super::response::parse_score;
use crate::batch::{
    BatchItem, BatchRunner, BatchStats, EngineError, ItemError, SweepPolicy, run_with_retry,
};
use crate::document::{Document, QualityScore};
use crate::llm::CompletionClient;

/// One model-tier request.
///
/// Jobs carry the prompt and the document's position, not the document, so a
/// job that is abandoned leaves its document untouched and unscored.
#[derive(Debug, Clone)]
pub struct ScoringJob {
    slot: usize,
    document_id: String,
    prompt: String,
}

impl BatchItem for ScoringJob {
    fn key(&self) -> String {
        self.document_id.clone()
    }
}

/// Result of the model tier over one batch.
#[derive(Debug, Default)]
pub struct ModelTierReport {
    /// Positions that received a score.
    pub scored: Vec<usize>,
    /// Positions left without a score.
    pub unresolved: Vec<usize>,
    /// Counters per pass, first pass first.
    pub passes: Vec<BatchStats>,
    /// True if a pass hit its deadline.
    pub timed_out: bool,
}

/// Scores documents with a completion model.
#[derive(Clone)]
pub struct ModelScorer {
    client: Arc<dyn CompletionClient>,
    model_id: Arc<str>,
    prompts: PromptBuilder,
    runner: BatchRunner,
    policy: SweepPolicy,
}

impl fmt::Debug for ModelScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelScorer")
            .field("model_id", &self.model_id)
            .field("prompts", &self.prompts)
            .field("runner", &self.runner)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ModelScorer {
    /// Creates a model scorer.
    ///
    /// `runner` supplies concurrency, deadline and observer; `policy` supplies
    /// pacing and retry sweeps.
    #[must_use]
    pub fn new(
        client: Arc<dyn CompletionClient>,
        model_id: &str,
        prompts: PromptBuilder,
        runner: BatchRunner,
        policy: SweepPolicy,
    ) -> Self {
        Self {
            client,
            model_id: Arc::from(model_id),
            prompts,
            runner,
            policy,
        }
    }

    /// Scores the documents at `pending` positions in place.
    ///
    /// Documents that end up without a score are reported as unresolved;
    /// this is never an error.
    ///
    /// # Errors
    ///
    /// Propagates [`EngineError`] from the batch runner.
    #[instrument(skip_all, fields(model = %self.model_id, pending = pending.len()))]
    pub async fn score(
        &self,
        documents: &mut [Document],
        pending: &[usize],
    ) -> Result<ModelTierReport, EngineError> {
        if pending.is_empty() {
            return Ok(ModelTierReport::default());
        }

        let jobs: Vec<ScoringJob> = pending
            .iter()
            .filter_map(|&slot| {
                let document = documents.get(slot)?;
                Some(ScoringJob {
                    slot,
                    document_id: document.id.clone(),
                    prompt: self.prompts.build(&document.id, &document.content),
                })
            })
            .collect();

        let client = Arc::clone(&self.client);
        let model_id = Arc::clone(&self.model_id);
        let op = move |job: ScoringJob| {
            let client = Arc::clone(&client);
            let model_id = Arc::clone(&model_id);
            async move {
                match request_score(client.as_ref(), &job.prompt, &model_id).await {
                    Ok(score) => Ok((job.slot, score)),
                    Err(error) => Err((job, error)),
                }
            }
        };

        let outcome = run_with_retry(&self.runner, &self.policy, jobs, op).await?;

        let mut report = ModelTierReport {
            passes: outcome.passes,
            timed_out: outcome.timed_out,
            ..ModelTierReport::default()
        };
        for (_, (slot, score)) in outcome.successes {
            if let Some(document) = documents.get_mut(slot) {
                document.add_quality_score(score);
                report.scored.push(slot);
            }
        }
        report.unresolved = pending
            .iter()
            .copied()
            .filter(|&slot| documents.get(slot).is_some_and(|d| !d.is_scored()))
            .collect();

        info!(
            scored = report.scored.len(),
            unresolved = report.unresolved.len(),
            passes = report.passes.len(),
            "model tier complete"
        );
        Ok(report)
    }
}

async fn request_score(
    client: &dyn CompletionClient,
    prompt: &str,
    model_id: &str,
) -> Result<QualityScore, ItemError> {
    let completion = client.complete(prompt, model_id).await?;
    parse_score(completion.text.as_deref())
}
