//! # arxivdigest
//!
//! Fetch recent arXiv Computer Vision papers and classify them against your
//! research topics with an LLM.
//!
//! ## Modules
//!
//! - [`arxiv`] - arXiv query API client (pagination, date filtering, dedup)
//! - [`listing`] - Markdown paper listings written by `fetch`, read by `analyze`
//! - [`llm`] - OpenAI-compatible chat client with retries
//! - [`analysis`] - Relevance judgments and per-topic results
//! - [`report`] - Markdown report and CSV export
//! - [`config`] - Environment configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use arxivdigest::arxiv::{ArxivClient, FetchOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ArxivClient::new()?;
//!     let papers = client.fetch(&FetchOptions::last_days(3)?).await?;
//!     println!("Found {} papers", papers.len());
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod arxiv;
pub mod config;
pub mod error;
pub mod listing;
pub mod llm;
pub mod paper;
pub mod prompts;
pub mod report;
pub mod window;

pub use error::{DigestError, Result};
pub use paper::Paper;
pub use window::DateWindow;
