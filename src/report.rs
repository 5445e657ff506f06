//! Markdown analysis reports and CSV export.

use crate::analysis::{Analysis, AnalysisResult};
use crate::error::Result;
use crate::window::DateWindow;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Results grouped by requested topic
#[derive(Debug)]
pub struct TopicGroups<'a> {
    /// One entry per requested topic, in request order (possibly empty)
    pub groups: Vec<(&'a str, Vec<&'a AnalysisResult>)>,
    /// Papers that matched no topic
    pub unmatched: Vec<&'a AnalysisResult>,
}

impl TopicGroups<'_> {
    pub fn count(&self, topic: &str) -> usize {
        self.groups
            .iter()
            .find(|(t, _)| *t == topic)
            .map_or(0, |(_, papers)| papers.len())
    }
}

/// Group results by topic. A paper appears under every topic it matched.
pub fn group_by_topic<'a>(results: &'a [AnalysisResult], topics: &'a [String]) -> TopicGroups<'a> {
    let groups = topics
        .iter()
        .map(|topic| {
            let papers = results.iter().filter(|r| r.is_relevant_to(topic)).collect();
            (topic.as_str(), papers)
        })
        .collect();

    let unmatched = results.iter().filter(|r| !r.is_relevant()).collect();

    TopicGroups { groups, unmatched }
}

/// HTML anchor for a topic heading
pub fn topic_anchor(topic: &str) -> String {
    topic.to_lowercase().replace(' ', "-")
}

/// Render the analysis report.
pub fn render_report(
    analysis: &Analysis,
    topics: &[String],
    window: Option<&DateWindow>,
    generated_at: NaiveDateTime,
) -> String {
    let grouped = group_by_topic(&analysis.results, topics);
    let date_range = window.map_or_else(|| "unknown date range".to_string(), |w| w.to_string());
    let mut out = String::new();

    let _ = writeln!(out, "# AI Analysis of Computer Vision Papers\n");
    let _ = writeln!(out, "*Date Range: {}*", date_range);
    let _ = writeln!(out, "*Generated on {}*\n", generated_at.format("%Y-%m-%d %H:%M:%S"));

    let _ = writeln!(out, "## Research Topics\n");
    for topic in topics {
        let _ = writeln!(out, "- {}", topic);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Summary\n");
    let _ = writeln!(out, "- Total papers analyzed: {}", analysis.results.len());
    let _ = writeln!(out, "- Relevant papers found: {}", analysis.relevant_count());
    let _ = writeln!(out, "- Relevance rate: {:.1}%", analysis.relevance_rate());
    if !analysis.skipped.is_empty() {
        let _ = writeln!(out, "- Papers skipped after errors: {}", analysis.skipped.len());
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "## Topic Distribution\n");
    let _ = writeln!(out, "| Topic | Number of Papers |");
    let _ = writeln!(out, "|-------|-----------------|");
    for (topic, papers) in &grouped.groups {
        let _ = writeln!(out, "| [{}](#{}) | {} |", topic, topic_anchor(topic), papers.len());
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "> Note: Papers may appear under multiple topics if they are relevant to more than one research area.\n"
    );

    let _ = writeln!(out, "## Papers by Topic\n");
    for (topic, papers) in grouped.groups.iter().filter(|(_, p)| !p.is_empty()) {
        let _ = writeln!(out, "### <a id='{}'></a>{}\n", topic_anchor(topic), topic);
        let _ = writeln!(out, "*Found {} relevant papers*\n", papers.len());
        for result in papers {
            write_paper(&mut out, result);
        }
    }

    let _ = writeln!(out, "## Papers With No Relevance\n");
    if grouped.unmatched.is_empty() {
        let _ = writeln!(out, "*Every analyzed paper matched at least one topic.*\n");
    } else {
        let _ = writeln!(out, "*{} papers matched none of the research topics*\n", grouped.unmatched.len());
        for result in &grouped.unmatched {
            let paper = &result.paper;
            let reason = if result.reason.is_empty() { "-" } else { result.reason.as_str() };
            let _ = writeln!(out, "- [{}]({}): {}", paper.title, paper.link, reason);
        }
        let _ = writeln!(out);
    }

    if !analysis.skipped.is_empty() {
        let _ = writeln!(out, "## Skipped Papers\n");
        for skipped in &analysis.skipped {
            let _ = writeln!(
                out,
                "- [{}]({}): {}",
                skipped.paper.title, skipped.paper.link, skipped.error
            );
        }
        let _ = writeln!(out);
    }

    out
}

fn write_paper(out: &mut String, result: &AnalysisResult) {
    let paper = &result.paper;
    let _ = writeln!(out, "#### {}\n", paper.title);
    let _ = writeln!(out, "**Date:** {}\n", paper.published);
    let _ = writeln!(out, "**Authors:** {}\n", paper.author_line());
    let _ = writeln!(out, "**Main Contribution:**");
    let _ = writeln!(out, "{}\n", result.main_contribution);
    let _ = writeln!(out, "**Relevant Topics:**");
    for topic in result.matched_topics() {
        let _ = writeln!(out, "- {}", topic);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "**Reason for Relevance:**");
    let _ = writeln!(out, "{}\n", result.reason);
    let _ = writeln!(out, "**Abstract:**");
    let _ = writeln!(out, "{}\n", paper.abstract_text);
    let _ = writeln!(out, "**Links:**");
    let _ = writeln!(out, "- [arXiv Page]({})", paper.link);
    let _ = writeln!(out, "- [PDF]({})\n", paper.pdf_url);
    let _ = writeln!(out, "---\n");
}

/// Render and write the report, creating parent directories as needed.
pub fn write_report(
    path: &Path,
    analysis: &Analysis,
    topics: &[String],
    window: Option<&DateWindow>,
    generated_at: NaiveDateTime,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_report(analysis, topics, window, generated_at))?;
    info!(path = ?path, "Wrote report");
    Ok(())
}

/// Flat CSV row for one analysis result
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    id: &'a str,
    title: &'a str,
    published: String,
    relevant: bool,
    topics: String,
    reason: &'a str,
    main_contribution: &'a str,
    link: &'a str,
}

/// Export every result as CSV.
pub fn write_csv(path: &Path, results: &[AnalysisResult]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(path)?;

    for result in results {
        wtr.serialize(CsvRow {
            id: &result.paper.id,
            title: &result.paper.title,
            published: result.paper.published.to_string(),
            relevant: result.is_relevant(),
            topics: result.matched_topics().join("; "),
            reason: &result.reason,
            main_contribution: &result.main_contribution,
            link: &result.paper.link,
        })?;
    }

    wtr.flush()?;
    info!(path = ?path, rows = results.len(), "Wrote CSV export");
    Ok(())
}
