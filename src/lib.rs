//! Harvester Core Library
//!
//! Bounded-concurrency crawling and quality scoring for a document-ingestion
//! pipeline. A set of seed documents is enlarged by fetching the pages they
//! link to, then every document is scored for informational quality by a
//! cheap rule tier and, where the rules cannot decide, a completion model.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`document`] - Document model, identity merge and JSON directory store
//! - [`batch`] - Concurrency limiter, batch runner and retry sweeps
//! - [`fetch`] - Page source seam, HTTP page source and content fetcher
//! - [`llm`] - Completion client seam and OpenAI-compatible client
//! - [`quality`] - Rule tier, model tier and the two-tier scorer
//! - [`pipeline`] - Stage entry points used by the orchestrator
//! - [`config`] - Stage configuration values

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod document;
pub mod fetch;
pub mod llm;
pub mod pipeline;
pub mod quality;

// Re-export commonly used types
pub use batch::{
    BatchObserver, BatchReport, BatchRunner, BatchStats, ConcurrencyLimiter, DEFAULT_CONCURRENCY,
    EngineError, FailureKind, ItemError, NoopObserver, SweepPolicy, run_with_retry,
};
pub use config::{ConfigError, CrawlConfig, HarvesterConfig, QualityConfig};
pub use document::{
    Document, DocumentMetadata, QualityScore, StoreError, WriteOptions, merge_documents,
    read_documents, write_documents,
};
pub use fetch::{ContentFetcher, FetchError, HttpPageSource, PageSource};
pub use llm::{CompletionClient, LlmError, MockClient, OpenAiClient};
pub use pipeline::{CrawlReport, run_crawl, run_quality_scoring};
pub use quality::{QualityReport, QualityScorer, RuleScorer, ScoreState};
