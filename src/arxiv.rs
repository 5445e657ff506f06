//! arXiv query API client.
//!
//! Fetches papers for one category within a date window, paging through the
//! Atom feed sequentially with a polite delay between requests.
//!
//! API notes (per arXiv API user manual):
//! - `submittedDate:[YYYYMMDDHHMM TO YYYYMMDDHHMM]` restricts by submission time (GMT)
//! - `start`/`max_results` page through results
//! - Consecutive calls should be spaced ~3 seconds apart

use crate::error::{DigestError, Result};
use crate::paper::{arxiv_id_from_url, dedup_by_id, normalize_whitespace, Paper};
use crate::window::DateWindow;
use chrono::{DateTime, Days, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// arXiv API endpoint
pub const ARXIV_API_URL: &str = "https://export.arxiv.org/api/query";

/// Computer Vision and Pattern Recognition
pub const DEFAULT_CATEGORY: &str = "cs.CV";

/// Default results per page request
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Interval between page requests requested by arXiv
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_secs(3);

/// Options for a fetch run
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// arXiv category (e.g. "cs.CV")
    pub category: String,
    /// Inclusive publication date window
    pub window: DateWindow,
    /// Upper bound on results requested from the API
    pub max_results: usize,
    /// Results per page request
    pub page_size: usize,
    /// Pause between page requests
    pub request_delay: Duration,
    /// Retries per page on transient failures
    pub max_retries: u32,
    /// Base backoff, doubled on every retry
    pub retry_backoff: Duration,
}

impl FetchOptions {
    /// Options for the last `days` days ending today (UTC, the clock arXiv dates use).
    pub fn last_days(days: u32) -> Result<Self> {
        Ok(Self {
            window: DateWindow::last_days(days, Utc::now().date_naive())?,
            ..Default::default()
        })
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        let today = Utc::now().date_naive();
        Self {
            category: DEFAULT_CATEGORY.to_string(),
            window: DateWindow::new(today.checked_sub_days(Days::new(3)).unwrap_or(today), today),
            max_results: 1000,
            page_size: DEFAULT_PAGE_SIZE,
            request_delay: DEFAULT_REQUEST_DELAY,
            max_retries: 3,
            retry_backoff: Duration::from_secs(2),
        }
    }
}

/// arXiv API client
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
}

impl ArxivClient {
    /// Create a client for the public arXiv endpoint
    pub fn new() -> Result<Self> {
        Self::with_base_url(ARXIV_API_URL)
    }

    /// Create a client for a custom endpoint (mirrors, tests)
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("arxivdigest/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DigestError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch all papers in the window, up to `max_results`.
    ///
    /// Pages that fail after retries are logged and skipped. Papers outside the
    /// window are dropped and duplicate ids are removed.
    ///
    /// # Errors
    ///
    /// Returns [`DigestError::EmptyResult`] when no paper survives filtering.
    pub async fn fetch(&self, options: &FetchOptions) -> Result<Vec<Paper>> {
        if options.page_size == 0 || options.max_results == 0 {
            return Err(DigestError::Validation(
                "page size and max results must be positive".to_string(),
            ));
        }

        let query = build_search_query(&options.category, &options.window);
        info!(
            query = %query,
            max_results = options.max_results,
            page_size = options.page_size,
            "Starting arXiv fetch"
        );

        let mut papers: Vec<Paper> = Vec::new();
        let mut start = 0usize;

        while start < options.max_results {
            let page_size = options.page_size.min(options.max_results - start);

            if start > 0 && !options.request_delay.is_zero() {
                tokio::time::sleep(options.request_delay).await;
            }

            let url = self.page_url(&query, start, page_size);
            debug!(url = %url, start = start, "Fetching arXiv page");

            let page = self
                .fetch_page(&url, options)
                .await
                .and_then(|xml| parse_feed(&xml));

            let FeedPage { papers: entries, received } = match page {
                Ok(page) => page,
                Err(e) => {
                    warn!(start = start, error = %e, "Failed to fetch page, skipping");
                    println!("  Page at offset {} failed: {}", start, e);
                    start += page_size;
                    continue;
                }
            };

            let before = papers.len();
            papers.extend(
                entries
                    .into_iter()
                    .filter(|p| options.window.contains(p.published)),
            );
            println!(
                "  Offset {}: {} entries, {} in window",
                start,
                received,
                papers.len() - before
            );

            // malformed entries still count towards a full page
            if received < page_size {
                break;
            }
            start += page_size;
        }

        let duplicates = dedup_by_id(&mut papers);
        if duplicates > 0 {
            debug!(duplicates = duplicates, "Removed duplicate papers");
        }

        info!(total = papers.len(), "arXiv fetch complete");

        if papers.is_empty() {
            return Err(DigestError::EmptyResult {
                category: options.category.clone(),
                start: options.window.start.to_string(),
                end: options.window.end.to_string(),
            });
        }

        Ok(papers)
    }

    fn page_url(&self, query: &str, start: usize, page_size: usize) -> String {
        format!(
            "{}?search_query={}&start={}&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.base_url,
            urlencoding::encode(query),
            start,
            page_size
        )
    }

    /// Fetch one page, retrying transient failures with exponential backoff
    async fn fetch_page(&self, url: &str, options: &FetchOptions) -> Result<String> {
        let mut retries = 0;
        let mut backoff = options.retry_backoff;

        loop {
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && retries < options.max_retries => {
                    let wait = match e {
                        DigestError::RateLimited(secs) => Duration::from_secs(secs).max(backoff),
                        _ => backoff,
                    };
                    warn!(
                        retries = retries,
                        backoff_ms = wait.as_millis() as u64,
                        error = %e,
                        "arXiv request failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                    retries += 1;
                    backoff *= 2;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.text().await?);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(3);
            return Err(DigestError::RateLimited(retry_after));
        }

        Err(DigestError::Api {
            code: status.as_u16() as i32,
            message: format!("arXiv API error: {}", status),
        })
    }
}

/// Build the arXiv `search_query` for a category and submission window.
pub fn build_search_query(category: &str, window: &DateWindow) -> String {
    format!(
        "cat:{} AND submittedDate:[{}0000 TO {}2359]",
        category,
        window.start.format("%Y%m%d"),
        window.end.format("%Y%m%d")
    )
}

// === Atom feed types ===

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Feed {
    #[serde(rename = "entry")]
    entries: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Entry {
    id: String,
    title: String,
    summary: String,
    published: String,
    #[serde(rename = "author")]
    authors: Vec<Author>,
    #[serde(rename = "link")]
    links: Vec<Link>,
    #[serde(rename = "category")]
    categories: Vec<Category>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Author {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@rel")]
    rel: Option<String>,
    #[serde(rename = "@type")]
    link_type: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Category {
    #[serde(rename = "@term")]
    term: String,
}

/// One parsed page of the feed
#[derive(Debug)]
struct FeedPage {
    papers: Vec<Paper>,
    /// Entries on the page before malformed ones were dropped
    received: usize,
}

/// Parse an arXiv Atom feed into papers.
///
/// Entries without a usable id or publication date are skipped with a warning.
fn parse_feed(xml: &str) -> Result<FeedPage> {
    let feed: Feed = from_str(xml)
        .map_err(|e| DigestError::Parse(format!("Failed to parse arXiv feed: {}", e)))?;

    // arXiv reports query errors as a single pseudo-entry
    if let Some(error) = feed.entries.iter().find(|e| e.id.contains("/api/errors")) {
        return Err(DigestError::Parse(format!(
            "arXiv rejected query: {}",
            normalize_whitespace(&error.summary)
        )));
    }

    let received = feed.entries.len();
    let mut papers = Vec::with_capacity(received);
    for entry in feed.entries {
        match paper_from_entry(entry) {
            Ok(paper) => papers.push(paper),
            Err(e) => warn!(error = %e, "Skipping malformed feed entry"),
        }
    }
    Ok(FeedPage { papers, received })
}

fn paper_from_entry(entry: Entry) -> Result<Paper> {
    let id = arxiv_id_from_url(&entry.id)
        .ok_or_else(|| DigestError::Parse(format!("Unrecognised entry id: {:?}", entry.id)))?;

    let published = DateTime::parse_from_rfc3339(entry.published.trim())
        .map(|dt| dt.with_timezone(&Utc).date_naive())
        .map_err(|e| DigestError::Parse(format!("Bad published date for {}: {}", id, e)))?;

    let link = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate"))
        .map(|l| l.href.clone())
        .unwrap_or_else(|| entry.id.trim().to_string());

    let pdf_url = entry
        .links
        .iter()
        .find(|l| {
            l.title.as_deref() == Some("pdf") || l.link_type.as_deref() == Some("application/pdf")
        })
        .map(|l| l.href.clone())
        .unwrap_or_else(|| link.replacen("/abs/", "/pdf/", 1));

    Ok(Paper {
        id,
        title: normalize_whitespace(&entry.title),
        authors: entry
            .authors
            .into_iter()
            .map(|a| normalize_whitespace(&a.name))
            .filter(|a| !a.is_empty())
            .collect(),
        abstract_text: normalize_whitespace(&entry.summary),
        published,
        categories: entry
            .categories
            .into_iter()
            .map(|c| c.term)
            .filter(|t| !t.is_empty())
            .collect(),
        link,
        pdf_url,
    })
}
