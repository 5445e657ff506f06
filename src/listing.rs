//! Markdown paper listings written by `fetch` and read back by `analyze`.
//!
//! File naming: `cv_papers_YYYY-MM-DD_to_YYYY-MM-DD.md`. The matching report is
//! `analyzed_papers_YYYY-MM-DD_to_YYYY-MM-DD.md`.

use crate::arxiv::{ArxivClient, FetchOptions};
use crate::error::{DigestError, OptionExt, Result};
use crate::paper::{arxiv_id_from_url, dedup_by_id, Paper};
use crate::window::DateWindow;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name prefix of fetcher output
pub const LISTING_PREFIX: &str = "cv_papers_";

/// File name prefix of analyzer output
pub const REPORT_PREFIX: &str = "analyzed_papers_";

/// Default directory for listings and reports
pub const DEFAULT_PAPERS_DIR: &str = "papers";

const PAPER_HEADING: &str = "## 📄 Paper #";

/// Listing file name for a window
pub fn listing_file_name(window: &DateWindow) -> String {
    format!("{}{}.md", LISTING_PREFIX, window.file_key())
}

/// Default report path for a listing, next to the listing.
///
/// Listings that don't follow the naming convention get `analyzed_<name>`.
pub fn report_path_for(input: &Path) -> PathBuf {
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    match DateWindow::from_file_name(&name) {
        Some(window) => dir.join(format!("{}{}.md", REPORT_PREFIX, window.file_key())),
        None => dir.join(format!("analyzed_{}", name)),
    }
}

/// Find the listing with the latest end date in `dir`.
pub fn find_latest_listing(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        DigestError::InputNotFound(format!("Cannot read papers directory {:?}: {}", dir, e))
    })?;

    let mut latest: Option<(DateWindow, PathBuf)> = None;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with(LISTING_PREFIX) || !name.ends_with(".md") {
            continue;
        }
        let Some(window) = DateWindow::from_file_name(&name) else {
            debug!(file = %name, "Ignoring listing without date range");
            continue;
        };
        let newer = latest
            .as_ref()
            .map_or(true, |(best, _)| (window.end, window.start) > (best.end, best.start));
        if newer {
            latest = Some((window, entry.path()));
        }
    }

    latest.map(|(_, path)| path).ok_or_else(|| {
        DigestError::InputNotFound(format!(
            "No {}*_to_*.md listings found in {:?}",
            LISTING_PREFIX, dir
        ))
    })
}

/// Number of papers per publication date
pub fn daily_counts(papers: &[Paper]) -> BTreeMap<NaiveDate, usize> {
    let mut counts = BTreeMap::new();
    for paper in papers {
        *counts.entry(paper.published).or_insert(0) += 1;
    }
    counts
}

/// Render papers as a markdown listing, most recent first.
pub fn render_listing(papers: &[Paper], window: &DateWindow) -> String {
    let mut sorted: Vec<&Paper> = papers.iter().collect();
    // stable: arXiv order is kept within a day
    sorted.sort_by(|a, b| b.published.cmp(&a.published));

    let days = (window.end - window.start).num_days();
    let mut out = String::new();

    let _ = writeln!(out, "# Computer Vision Papers from arXiv\n");
    let _ = writeln!(out, "*Last {} Days ({} to {})*\n", days, window.start, window.end);
    let _ = writeln!(out, "---\n");

    let _ = writeln!(out, "## 📊 Daily Paper Count Summary\n");
    let _ = writeln!(out, "| Date | Number of Papers |");
    let _ = writeln!(out, "|------|-----------------|");
    for (date, count) in daily_counts(papers).iter().rev() {
        let _ = writeln!(out, "| {} | {} |", date, count);
    }
    let _ = writeln!(out, "\n*Total: {} papers*\n", papers.len());
    let _ = writeln!(out, "---\n");

    for (i, paper) in sorted.iter().enumerate() {
        let _ = writeln!(out, "{}{}\n", PAPER_HEADING, i + 1);
        let _ = writeln!(out, "### {}\n", paper.title);
        let _ = writeln!(out, "**ID:** {}\n", paper.id);
        let _ = writeln!(out, "**Date:** {}\n", paper.published);
        let _ = writeln!(out, "**Authors:** {}\n", paper.author_line());
        if !paper.categories.is_empty() {
            let _ = writeln!(out, "**Categories:** {}\n", paper.categories.join(", "));
        }
        let _ = writeln!(out, "**Abstract:**\n");
        let _ = writeln!(out, "{}\n", paper.abstract_text);
        let _ = writeln!(out, "**Links:**\n");
        let _ = writeln!(out, "- [arXiv Page]({})", paper.link);
        let _ = writeln!(out, "- [PDF]({})\n", paper.pdf_url);
        let _ = writeln!(out, "---\n");
    }

    out
}

/// Write a listing into `dir`, creating the directory if needed.
pub fn write_listing(dir: &Path, papers: &[Paper], window: &DateWindow) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(listing_file_name(window));
    std::fs::write(&path, render_listing(papers, window))?;
    info!(path = ?path, count = papers.len(), "Wrote listing");
    Ok(path)
}

/// Fetch papers for `options` and write them as a listing into `dir`.
///
/// Nothing is written when the fetch fails, including when no paper falls in
/// the window.
pub async fn fetch_to_listing(
    client: &ArxivClient,
    options: &FetchOptions,
    dir: &Path,
) -> Result<(PathBuf, Vec<Paper>)> {
    let papers = client.fetch(options).await?;
    let path = write_listing(dir, &papers, &options.window)?;
    Ok((path, papers))
}

/// Read a listing file from disk.
pub fn load_listing(path: &Path) -> Result<Vec<Paper>> {
    if !path.exists() {
        return Err(DigestError::InputNotFound(format!("{:?}", path)));
    }
    let text = std::fs::read_to_string(path)?;
    parse_listing(&text)
}

/// Parse papers back out of listing markdown.
///
/// Duplicate ids are dropped, keeping the first occurrence.
pub fn parse_listing(text: &str) -> Result<Vec<Paper>> {
    let mut papers = Vec::new();
    let mut current: Option<Draft> = None;

    for raw in text.lines() {
        let line = raw.trim();

        if line.starts_with(PAPER_HEADING) || line.starts_with("## Paper #") {
            if let Some(draft) = current.take() {
                papers.push(draft.finish()?);
            }
            current = Some(Draft {
                number: line.rsplit('#').next().unwrap_or_default().trim().to_string(),
                ..Default::default()
            });
            continue;
        }

        let Some(draft) = current.as_mut() else {
            continue;
        };

        if let Some(title) = line.strip_prefix("### ") {
            draft.title = title.trim().to_string();
        } else if let Some(id) = line.strip_prefix("**ID:**") {
            draft.id = id.trim().to_string();
        } else if let Some(date) = field(line, &["**Date:**", "**Date (UTC):**"]) {
            draft.date = date.to_string();
        } else if let Some(authors) = line.strip_prefix("**Authors:**") {
            draft.authors = split_list(authors);
        } else if let Some(categories) = line.strip_prefix("**Categories:**") {
            draft.categories = split_list(categories);
        } else if let Some(rest) = line.strip_prefix("**Abstract:**") {
            draft.in_abstract = true;
            draft.push_abstract(rest);
        } else if line.starts_with("**Links:**") {
            draft.in_abstract = false;
        } else if let Some(url) = link_target(line, "- [arXiv Page](") {
            draft.link = url.to_string();
        } else if let Some(url) = link_target(line, "- [PDF](") {
            draft.pdf_url = url.to_string();
        } else if draft.in_abstract && !line.starts_with("---") {
            draft.push_abstract(line);
        }
    }

    if let Some(draft) = current.take() {
        papers.push(draft.finish()?);
    }

    let duplicates = dedup_by_id(&mut papers);
    if duplicates > 0 {
        warn!(duplicates = duplicates, "Listing contained duplicate paper ids");
    }

    Ok(papers)
}

#[derive(Default)]
struct Draft {
    number: String,
    id: String,
    title: String,
    date: String,
    authors: Vec<String>,
    categories: Vec<String>,
    abstract_text: String,
    in_abstract: bool,
    link: String,
    pdf_url: String,
}

impl Draft {
    fn push_abstract(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.abstract_text.is_empty() {
            self.abstract_text.push(' ');
        }
        self.abstract_text.push_str(text);
    }

    fn finish(self) -> Result<Paper> {
        let number = self.number;
        if self.title.is_empty() {
            return Err(DigestError::Parse(format!("Paper #{} has no title", number)));
        }

        let published = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").map_err(|e| {
            DigestError::Parse(format!("Paper #{} has invalid date {:?}: {}", number, self.date, e))
        })?;

        let id = if self.id.is_empty() {
            arxiv_id_from_url(&self.link)
                .ok_or_parse(&format!("Paper #{} has neither an ID nor an arXiv link", number))?
        } else {
            self.id
        };

        Ok(Paper {
            id,
            title: self.title,
            authors: self.authors,
            abstract_text: self.abstract_text,
            published,
            categories: self.categories,
            link: self.link,
            pdf_url: self.pdf_url,
        })
    }
}

fn field<'a>(line: &'a str, prefixes: &[&str]) -> Option<&'a str> {
    prefixes
        .iter()
        .find_map(|p| line.strip_prefix(p))
        .map(str::trim)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn link_target<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    Some(rest.rsplit_once(')').map_or(rest, |(url, _)| url).trim())
}
