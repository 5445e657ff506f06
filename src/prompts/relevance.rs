//! Relevance prompts for research-topic classification.
//!
//! The model answers in a line-oriented format that `analysis::parse_judgment` reads.

/// System prompt for paper relevance analysis
pub const SYSTEM_PROMPT: &str = "You are a research paper analyzer. Provide responses in a structured format with RELEVANT, REASON, TOPICS, and MAIN_CONTRIBUTION sections. For MAIN_CONTRIBUTION, focus on extracting the key technical contribution or innovation from the abstract.";

/// User prompt template for a single paper
/// Placeholders: {topics}, {title}, {abstract}
pub const USER_PROMPT_TEMPLATE: &str = r#"Given the following research topics:
{topics}

And this paper:
Title: {title}
Abstract: {abstract}

Analyze if this paper is relevant to any of the research topics and extract its main contribution. Provide your response in the following format:

RELEVANT: [yes/no]
REASON: [brief explanation of why it's relevant or not]
TOPICS: [comma-separated list of relevant topics from the provided list]
MAIN_CONTRIBUTION: [a concise summary of the paper's main contribution based on the abstract]
"#;

/// Build user prompt for one paper
pub fn build_user_prompt(topics: &[String], title: &str, abstract_text: &str) -> String {
    let topics = topics.join(", ");
    fill_template(
        USER_PROMPT_TEMPLATE,
        &[("{topics}", topics.as_str()), ("{title}", title), ("{abstract}", abstract_text)],
    )
}

/// Substitute placeholders in one pass over the template. Inserted values are not rescanned.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match values.iter().find(|(key, _)| tail.starts_with(*key)) {
            Some((key, value)) => {
                out.push_str(value);
                rest = &tail[key.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_prompt() {
        let topics = vec!["3D reconstruction".to_string(), "video generation".to_string()];
        let prompt = build_user_prompt(&topics, "NeRF in the Wild", "We reconstruct scenes.");
        assert!(prompt.contains("3D reconstruction, video generation"));
        assert!(prompt.contains("Title: NeRF in the Wild"));
        assert!(prompt.contains("Abstract: We reconstruct scenes."));
        assert!(!prompt.contains("{title}"));
    }

    #[test]
    fn test_placeholders_in_paper_text_are_kept() {
        let topics = vec!["segmentation".to_string()];
        let prompt = build_user_prompt(&topics, "Why {abstract} matters", "Uses {title} and {x}.");
        assert!(prompt.contains("Title: Why {abstract} matters\n"));
        assert!(prompt.contains("Abstract: Uses {title} and {x}.\n"));
        assert!(prompt.contains("topics:\nsegmentation\n"));
    }
}
