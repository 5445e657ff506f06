//! Paper metadata shared by the fetcher and the analyzer.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static VERSION_SUFFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"v\d+$").expect("valid version suffix regex"));

/// A single arXiv paper. Immutable once fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paper {
    /// Versionless arXiv identifier (e.g. `2410.01234`)
    pub id: String,
    pub title: String,
    /// Authors in the order arXiv lists them
    pub authors: Vec<String>,
    pub abstract_text: String,
    /// Publication date (UTC)
    pub published: NaiveDate,
    pub categories: Vec<String>,
    /// arXiv abstract page
    pub link: String,
    pub pdf_url: String,
}

impl Paper {
    /// Authors joined for display.
    pub fn author_line(&self) -> String {
        self.authors.join(", ")
    }
}

/// Extract the versionless arXiv id from an abs/pdf URL or a bare id.
///
/// Handles new-style (`2410.01234v2`) and old-style (`cs/0601001v1`) identifiers.
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
    let url = url.trim();
    let tail = ["/abs/", "/pdf/"]
        .iter()
        .find_map(|marker| url.find(marker).map(|ix| &url[ix + marker.len()..]))
        .unwrap_or(url);
    let tail = tail.trim_end_matches(".pdf").trim_end_matches('/');
    if tail.is_empty() || tail.contains("://") {
        return None;
    }
    Some(VERSION_SUFFIX_RE.replace(tail, "").to_string())
}

/// Collapse runs of whitespace (arXiv wraps titles and abstracts at ~80 columns).
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop papers whose id has already been seen, keeping the first occurrence.
///
/// Returns the number of duplicates removed.
pub fn dedup_by_id(papers: &mut Vec<Paper>) -> usize {
    let before = papers.len();
    let mut seen = HashSet::new();
    papers.retain(|p| seen.insert(p.id.clone()));
    before - papers.len()
}

#[cfg(test)]
pub(crate) fn sample_paper(id: &str, title: &str, published: NaiveDate) -> Paper {
    Paper {
        id: id.to_string(),
        title: title.to_string(),
        authors: vec!["Ada Lovelace".to_string(), "Alan Turing".to_string()],
        abstract_text: format!("We study {}.", title.to_lowercase()),
        published,
        categories: vec!["cs.CV".to_string()],
        link: format!("http://arxiv.org/abs/{}v1", id),
        pdf_url: format!("http://arxiv.org/pdf/{}v1", id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arxiv_id_from_url() {
        assert_eq!(
            arxiv_id_from_url("http://arxiv.org/abs/2410.01234v2").as_deref(),
            Some("2410.01234")
        );
        assert_eq!(
            arxiv_id_from_url("https://arxiv.org/pdf/2410.01234v1.pdf").as_deref(),
            Some("2410.01234")
        );
        assert_eq!(
            arxiv_id_from_url("http://arxiv.org/abs/cs/0601001v1").as_deref(),
            Some("cs/0601001")
        );
        assert_eq!(arxiv_id_from_url("2410.01234").as_deref(), Some("2410.01234"));
        assert_eq!(arxiv_id_from_url("https://example.com/"), None);
        assert_eq!(arxiv_id_from_url(""), None);
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(
            normalize_whitespace("  Segment\n  Anything   in\tVideo "),
            "Segment Anything in Video"
        );
    }

    #[test]
    fn test_dedup_by_id_keeps_first() {
        let day = NaiveDate::from_ymd_opt(2024, 10, 1).unwrap();
        let mut papers = vec![
            sample_paper("2410.00001", "First", day),
            sample_paper("2410.00002", "Second", day),
            sample_paper("2410.00001", "First again", day),
        ];
        assert_eq!(dedup_by_id(&mut papers), 1);
        assert_eq!(papers.len(), 2);
        assert_eq!(papers[0].title, "First");
    }
}
