//! OpenAI-compatible chat client for relevance judgments.
//!
//! One request per paper, issued sequentially. Transient failures are retried a
//! fixed number of times before the caller skips the paper.

use crate::analysis::{parse_judgment, Judgment};
use crate::config::AiConfig;
use crate::error::{DigestError, Result};
use crate::paper::Paper;
use crate::prompts::relevance::{build_user_prompt, SYSTEM_PROMPT};
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl From<&AiConfig> for LlmConfig {
    fn from(config: &AiConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

/// Fixed-count retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per paper, including the first
    pub max_attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Token usage tracking
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// OpenAI-compatible API response structures
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

/// Chat completion client
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("arxivdigest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DigestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Ask the model whether `paper` matches any of `topics`.
    ///
    /// Retries transient failures up to the policy's attempt count. Non-transient
    /// errors (e.g. HTTP 401) are returned immediately.
    pub async fn classify(&self, paper: &Paper, topics: &[String]) -> Result<(Judgment, TokenUsage)> {
        let user_prompt = build_user_prompt(topics, &paper.title, &paper.abstract_text);
        let attempts = self.retry.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.complete(&user_prompt).await {
                Ok((content, usage)) => {
                    debug!(id = %paper.id, attempt = attempt, "LLM response received");
                    return Ok((parse_judgment(&content), usage));
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        id = %paper.id,
                        attempt = attempt,
                        max_attempts = attempts,
                        error = %e,
                        "LLM request failed, retrying"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send one chat completion and return the message content
    async fn complete(&self, user_prompt: &str) -> Result<(String, TokenUsage)> {
        let seed: u64 = rand::thread_rng().gen_range(1..=1_000_000_000);

        let request_body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user_prompt}
            ],
            "temperature": 0.7,
            "max_tokens": 1024,
            "top_p": 1,
            "frequency_penalty": 0,
            "presence_penalty": 0,
            "seed": seed
        });

        let api_url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(DigestError::Api {
                code: status.as_u16() as i32,
                message: format!("LLM API error: {} - {}", status, error_text),
            });
        }

        let api_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| DigestError::Parse(format!("Failed to parse LLM response: {}", e)))?;

        let usage = api_response
            .usage
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok((content, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_usage_add() {
        let mut total = TokenUsage::default();
        total.add(&TokenUsage { prompt_tokens: 10, completion_tokens: 5, total_tokens: 15 });
        total.add(&TokenUsage { prompt_tokens: 1, completion_tokens: 2, total_tokens: 3 });
        assert_eq!(total, TokenUsage { prompt_tokens: 11, completion_tokens: 7, total_tokens: 18 });
    }

    #[test]
    fn test_config_from_ai_config() {
        let ai = AiConfig {
            api_key: "sk".to_string(),
            model: "m".to_string(),
            base_url: "http://localhost/v1".to_string(),
            research_topics: None,
        };
        let config = LlmConfig::from(&ai);
        assert_eq!(config.model, "m");
        assert_eq!(config.base_url, "http://localhost/v1");
    }

    #[test]
    fn test_response_without_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
    }
}
