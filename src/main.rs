//! CLI entry point for the harvester tool.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use harvester_core::{
    BatchObserver, CompletionClient, CrawlConfig, Document, HarvesterConfig, HttpPageSource,
    MockClient, OpenAiClient, QualityConfig, WriteOptions, read_documents, run_crawl,
    run_quality_scoring, write_documents,
};
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::{Args, BatchArgs, Command, ModelArgs, OutputArgs};
use progress::CliObserver;

/// Nesting level of exported pages under `<storage>/notion`.
const ETL_SOURCE_NESTING: usize = 1;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let mut config = match &args.config {
        Some(path) => HarvesterConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => HarvesterConfig::default(),
    };

    let observer: Arc<dyn BatchObserver> =
        Arc::new(CliObserver::new(!args.quiet && io::stderr().is_terminal()));

    match args.command {
        Command::Crawl(crawl) => {
            apply_crawl_overrides(&mut config.crawl, &crawl.batch);
            let documents = load(&crawl.io.input, crawl.io.nesting_level)?;
            let documents = crawl_stage(documents, &config.crawl, observer).await?;
            store(&crawl.io.output, &documents, &crawl.output)?;
        }
        Command::Score(score) => {
            apply_quality_overrides(&mut config.quality, &score.batch, &score.model);
            let documents = load(&score.io.input, score.io.nesting_level)?;
            let documents =
                scoring_stage(documents, &config.quality, &score.model, observer).await?;
            store(&score.io.output, &documents, &score.output)?;
        }
        Command::Etl(etl) => {
            apply_crawl_overrides(&mut config.crawl, &etl.batch);
            apply_quality_overrides(&mut config.quality, &etl.batch, &etl.model);
            let documents = load(&etl.storage.join("notion"), ETL_SOURCE_NESTING)?;
            let documents = crawl_stage(documents, &config.crawl, Arc::clone(&observer)).await?;
            let documents =
                scoring_stage(documents, &config.quality, &etl.model, observer).await?;
            store(&etl.storage.join("crawled"), &documents, &etl.output)?;
        }
    }

    Ok(())
}

fn apply_crawl_overrides(config: &mut CrawlConfig, batch: &BatchArgs) {
    if let Some(concurrency) = batch.concurrency {
        config.concurrency = usize::from(concurrency);
    }
    if let Some(secs) = batch.deadline_secs {
        config.deadline_ms = Some(secs.saturating_mul(1000));
    }
}

fn apply_quality_overrides(config: &mut QualityConfig, batch: &BatchArgs, model: &ModelArgs) {
    if let Some(concurrency) = batch.concurrency {
        config.concurrency = usize::from(concurrency);
    }
    if let Some(secs) = batch.deadline_secs {
        config.deadline_ms = Some(secs.saturating_mul(1000));
    }
    if let Some(model_id) = &model.model {
        config.model_id.clone_from(model_id);
    }
    config.use_mock |= model.mock;
}

fn load(dir: &Path, nesting_level: usize) -> Result<Vec<Document>> {
    let documents = read_documents(dir, nesting_level)?;
    info!(
        documents = documents.len(),
        dir = %dir.display(),
        "Loaded documents"
    );
    Ok(documents)
}

fn store(dir: &Path, documents: &[Document], output: &OutputArgs) -> Result<()> {
    let options = WriteOptions {
        anonymise: output.anonymise,
        text_copy: output.text_copy,
    };
    let written = write_documents(dir, documents, options)?;
    info!(written, dir = %dir.display(), "Wrote documents");
    Ok(())
}

async fn crawl_stage(
    documents: Vec<Document>,
    config: &CrawlConfig,
    observer: Arc<dyn BatchObserver>,
) -> Result<Vec<Document>> {
    let source =
        HttpPageSource::new(config.max_body_bytes).context("failed to build HTTP client")?;
    let report = run_crawl(documents, config, Arc::new(source), observer).await?;

    info!(
        initial = report.initial_count,
        attempted = report.attempted(),
        discovered = report.discovered,
        added = report.newly_added(),
        total = report.final_count,
        "Crawl finished"
    );
    if report.timed_out {
        warn!("Crawl hit its deadline; some pages were not fetched");
    }
    Ok(report.documents)
}

async fn scoring_stage(
    documents: Vec<Document>,
    config: &QualityConfig,
    model: &ModelArgs,
    observer: Arc<dyn BatchObserver>,
) -> Result<Vec<Document>> {
    let client = completion_client(config, model)?;
    let report = run_quality_scoring(documents, config, client, observer).await?;

    info!(
        total = report.total(),
        scored = report.scored(),
        preserved = report.preserved(),
        rule_scored = report.rule_scored(),
        model_scored = report.model_scored(),
        unresolved = report.unresolved(),
        "Quality scoring finished"
    );
    if report.unresolved() > 0 {
        warn!(
            unresolved = report.unresolved(),
            "Some documents were left unscored"
        );
    }
    Ok(report.documents)
}

fn completion_client(
    config: &QualityConfig,
    model: &ModelArgs,
) -> Result<Arc<dyn CompletionClient>> {
    if config.use_mock {
        return Ok(Arc::new(MockClient::default()));
    }
    let api_key = model.api_key.clone().unwrap_or_default();
    let client = OpenAiClient::new(api_key, model.base_url.clone())
        .context("set OPENAI_API_KEY or pass --api-key, or use --mock")?;
    Ok(Arc::new(client))
}
