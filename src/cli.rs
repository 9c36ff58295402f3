//! CLI argument definitions using clap derive macros.

use std::fmt;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use harvester_core::llm::DEFAULT_BASE_URL;

/// Crawl linked pages and score document quality.
///
/// Harvester enlarges a set of JSON documents with the pages they link to and
/// annotates every document with a quality score in [0, 1].
#[derive(Parser, Debug)]
#[command(name = "harvester")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// JSON config file with optional `crawl` and `quality` sections
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch every child URL and merge the discovered pages in
    Crawl(CrawlArgs),
    /// Score documents with the rule tier and the model tier
    Score(ScoreArgs),
    /// Crawl `<storage>/notion`, score, and write `<storage>/crawled`
    Etl(EtlArgs),
}

/// Input and output directories.
#[derive(ClapArgs, Debug, Clone)]
pub struct IoArgs {
    /// Directory to read `<id>.json` documents from
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// Directory to write `<id>.json` documents to
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Subdirectory depth of the input files (0 = directly in the input directory)
    #[arg(long, default_value_t = 0)]
    pub nesting_level: usize,
}

/// Output options shared by every subcommand.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Replace document ids with random ones before writing
    #[arg(long)]
    pub anonymise: bool,

    /// Also write each document's content as `<id>.txt`
    #[arg(long)]
    pub text_copy: bool,
}

/// Batch tuning shared by every subcommand.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Maximum concurrent operations (1-100), overrides the config file
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Wall-clock budget per batch pass in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub deadline_secs: Option<u64>,
}

/// Completion model selection.
#[derive(ClapArgs, Clone)]
pub struct ModelArgs {
    /// Model used for quality scoring, overrides the config file
    #[arg(short, long)]
    pub model: Option<String>,

    /// Score with a fixed 0.5 instead of calling the model
    #[arg(long)]
    pub mock: bool,

    /// API key for the completion endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

impl fmt::Debug for ModelArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArgs")
            .field("model", &self.model)
            .field("mock", &self.mock)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(ClapArgs, Debug)]
pub struct CrawlArgs {
    #[command(flatten)]
    pub io: IoArgs,
    #[command(flatten)]
    pub batch: BatchArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(ClapArgs, Debug)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub io: IoArgs,
    #[command(flatten)]
    pub batch: BatchArgs,
    #[command(flatten)]
    pub model: ModelArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(ClapArgs, Debug)]
pub struct EtlArgs {
    /// Storage root containing `notion/` and receiving `crawled/`
    #[arg(short, long, value_name = "DIR")]
    pub storage: PathBuf,
    #[command(flatten)]
    pub batch: BatchArgs,
    #[command(flatten)]
    pub model: ModelArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}
