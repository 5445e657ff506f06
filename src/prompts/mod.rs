//! Prompt module for LLM-based operations.

pub mod relevance;

pub use relevance::*;
