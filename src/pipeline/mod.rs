//! Stage entry points for the orchestrator.
//!
//! - [`run_crawl`] - fetch every child URL of a document set and merge the
//!   discovered pages in
//! - [`run_quality_scoring`] - two-tier quality scoring over a document set
//!
//! Both take explicit configuration and collaborators and hold no state
//! between calls.

mod crawl;
mod scoring;

pub use crawl::{CrawlReport, run_crawl};
pub use scoring::run_quality_scoring;
