//! Quality scoring stage entry point.

use std::sync::Arc;

use tracing::instrument;

use crate::batch::{BatchObserver, EngineError};
use crate::config::QualityConfig;
use crate::document::Document;
use crate::llm::CompletionClient;
use crate::quality::{QualityReport, QualityScorer};

/// Scores `documents` with the rule tier, then the model tier.
///
/// With `config.use_mock` set, `client` is not called.
///
/// # Errors
///
/// Returns [`EngineError::EmptyBatch`] for empty input and
/// [`EngineError::InvalidConcurrency`] for an out-of-range concurrency.
#[instrument(
    skip_all,
    fields(documents = documents.len(), model = %config.model_id, mock = config.use_mock)
)]
pub async fn run_quality_scoring(
    documents: Vec<Document>,
    config: &QualityConfig,
    client: Arc<dyn CompletionClient>,
    observer: Arc<dyn BatchObserver>,
) -> Result<QualityReport, EngineError> {
    if documents.is_empty() {
        return Err(EngineError::EmptyBatch {
            stage: "quality scoring",
        });
    }
    QualityScorer::with_observer(config, client, observer)?
        .score_batch(documents)
        .await
}
