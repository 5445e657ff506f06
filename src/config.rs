//! Environment configuration for the analyzer.
//!
//! Values are read from the process environment after loading an optional `.env`
//! file from the working directory.

use crate::error::{DigestError, Result};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible endpoint
pub const DEFAULT_BASE_URL: &str = "https://aihubmix.com/v1";

/// LLM settings plus the default topic list
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Raw `RESEARCH_TOPICS` value, if set
    pub research_topics: Option<String>,
}

impl AiConfig {
    /// Load from `AI_API_KEY`, `AI_MODEL`, `AI_BASE_URL` and `RESEARCH_TOPICS`.
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!(path = ?path, "Loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(DigestError::Config(format!("Failed to load .env: {}", e))),
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("AI_API_KEY").ok_or_else(|| {
            DigestError::Config(
                "AI_API_KEY environment variable is not set. Set it in .env or the environment."
                    .to_string(),
            )
        })?;

        let base_url = non_empty("AI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url)
            .map_err(|e| DigestError::Config(format!("Invalid AI_BASE_URL {:?}: {}", base_url, e)))?;

        Ok(Self {
            api_key,
            model: non_empty("AI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url,
            research_topics: non_empty("RESEARCH_TOPICS"),
        })
    }

    /// Topics from `--topics` if given, otherwise `RESEARCH_TOPICS`.
    pub fn resolve_topics(&self, cli_topics: Option<&str>) -> Result<Vec<String>> {
        let raw = cli_topics
            .or(self.research_topics.as_deref())
            .ok_or_else(|| {
                DigestError::Config(
                    "No research topics: pass --topics or set RESEARCH_TOPICS".to_string(),
                )
            })?;
        parse_topics(raw)
    }
}

/// Split a comma-separated topic list.
///
/// Entries are trimmed; empty entries and case-insensitive duplicates are dropped.
pub fn parse_topics(raw: &str) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let topics: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(String::from)
        .collect();

    if topics.is_empty() {
        return Err(DigestError::Validation(
            "Research topic list is empty".to_string(),
        ));
    }
    Ok(topics)
}
