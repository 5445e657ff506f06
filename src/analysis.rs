//! Relevance judgments and per-paper analysis results.

use crate::llm::{LlmClient, TokenUsage};
use crate::paper::Paper;
use tracing::{info, warn};

/// Parsed model answer for one paper
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Judgment {
    pub relevant: bool,
    pub reason: String,
    /// Topics as named by the model
    pub topics: Vec<String>,
    pub main_contribution: String,
}

/// Relevance of one paper to one requested topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicFlag {
    pub topic: String,
    pub relevant: bool,
}

/// Outcome of analyzing one paper. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisResult {
    pub paper: Paper,
    /// One flag per requested topic, in request order
    pub flags: Vec<TopicFlag>,
    pub reason: String,
    pub main_contribution: String,
}

impl AnalysisResult {
    /// Resolve a judgment against the requested topics.
    ///
    /// Model topics are matched case-insensitively; topics outside the requested
    /// list are ignored. A negative judgment clears every flag.
    pub fn from_judgment(paper: Paper, judgment: Judgment, topics: &[String]) -> Self {
        let named: Vec<String> = judgment
            .topics
            .iter()
            .map(|t| normalize_topic(t))
            .collect();

        let flags = topics
            .iter()
            .map(|topic| TopicFlag {
                topic: topic.clone(),
                relevant: judgment.relevant && named.contains(&normalize_topic(topic)),
            })
            .collect();

        Self {
            paper,
            flags,
            reason: judgment.reason,
            main_contribution: judgment.main_contribution,
        }
    }

    pub fn is_relevant_to(&self, topic: &str) -> bool {
        self.flags.iter().any(|f| f.relevant && f.topic == topic)
    }

    pub fn matched_topics(&self) -> Vec<&str> {
        self.flags
            .iter()
            .filter(|f| f.relevant)
            .map(|f| f.topic.as_str())
            .collect()
    }

    /// Relevant iff at least one requested topic matched
    pub fn is_relevant(&self) -> bool {
        self.flags.iter().any(|f| f.relevant)
    }
}

/// A paper that could not be classified
#[derive(Debug, Clone)]
pub struct SkippedPaper {
    pub paper: Paper,
    pub error: String,
}

/// Results of one analyzer run
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub results: Vec<AnalysisResult>,
    pub skipped: Vec<SkippedPaper>,
    pub usage: TokenUsage,
}

impl Analysis {
    pub fn relevant_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_relevant()).count()
    }

    /// Share of analyzed papers that matched a topic, in percent
    pub fn relevance_rate(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.relevant_count() as f64 / self.results.len() as f64 * 100.0
    }
}

/// Classify every paper sequentially, skipping papers whose requests fail.
pub async fn analyze_papers(client: &LlmClient, papers: &[Paper], topics: &[String]) -> Analysis {
    let total = papers.len();
    let mut analysis = Analysis::default();

    info!(count = total, model = %client.model(), "Starting relevance analysis");
    println!("\nStarting analysis of {} papers...", total);

    for (idx, paper) in papers.iter().enumerate() {
        let n = idx + 1;
        println!("\nAnalyzing paper {}/{}: {}", n, total, paper.title);

        match client.classify(paper, topics).await {
            Ok((judgment, usage)) => {
                analysis.usage.add(&usage);
                let result = AnalysisResult::from_judgment(paper.clone(), judgment, topics);
                if result.is_relevant() {
                    println!("✓ Paper {} is relevant: {}", n, result.matched_topics().join(", "));
                } else {
                    println!("✗ Paper {} is not relevant", n);
                }
                analysis.results.push(result);
            }
            Err(e) => {
                warn!(id = %paper.id, error = %e, "Skipping paper after failed analysis");
                println!("! Skipping paper {}: {}", n, e);
                analysis.skipped.push(SkippedPaper {
                    paper: paper.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        analyzed = analysis.results.len(),
        relevant = analysis.relevant_count(),
        skipped = analysis.skipped.len(),
        prompt_tokens = analysis.usage.prompt_tokens,
        completion_tokens = analysis.usage.completion_tokens,
        "Relevance analysis complete"
    );

    analysis
}

/// Parse the line-structured model answer.
///
/// Expected keys: `RELEVANT:`, `REASON:`, `TOPICS:`, `MAIN_CONTRIBUTION:`. Keys are
/// case-insensitive and may be wrapped in markdown bullets or bold markers. An
/// answer without a `RELEVANT:` line is treated as not relevant.
pub fn parse_judgment(content: &str) -> Judgment {
    let mut judgment = Judgment::default();
    let mut saw_relevant = false;

    for raw in content.lines() {
        let line = raw.trim().trim_start_matches(['-', '*', '#', ' ']);
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().trim_matches('*').trim().to_ascii_uppercase();
        let value = value.trim().trim_matches('*').trim();

        match key.as_str() {
            "RELEVANT" => {
                saw_relevant = true;
                let answer = value.trim_matches(['[', ']']).trim().to_ascii_lowercase();
                judgment.relevant = answer == "yes" || answer == "true";
            }
            "REASON" => judgment.reason = value.to_string(),
            "TOPICS" => {
                judgment.topics = value
                    .trim_matches(['[', ']'])
                    .split(',')
                    .map(|t| t.trim().trim_matches(['"', '\'', '`']).trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect();
            }
            "MAIN_CONTRIBUTION" | "MAIN CONTRIBUTION" => {
                judgment.main_contribution = value.to_string()
            }
            _ => {}
        }
    }

    if !saw_relevant {
        let preview: String = content.chars().take(200).collect();
        info!(content_preview = %preview, "LLM output parse failed - treating as not relevant");
        judgment.relevant = false;
        if judgment.reason.is_empty() {
            judgment.reason = "Parse error: response has no RELEVANT line".to_string();
        }
    }

    judgment
}

fn normalize_topic(topic: &str) -> String {
    topic.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}
