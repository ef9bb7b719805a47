//! arXiv paper index client.
//!
//! All outbound arXiv traffic goes through [`ArxivClient`], which pages
//! through results, spaces requests at least three seconds apart across the
//! whole process, and retries failed pages. [`cache::CachedPaperSource`]
//! layers a Redis cache on top.

pub mod cache;
pub mod feed;
pub mod query;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::arxiv::feed::{parse_feed, ArxivPaper};
use crate::arxiv::query::ArxivQuery;
use crate::errors::AppError;

const PAGE_SIZE: usize = 100;
const MAX_RETRIES: u32 = 3;
/// arXiv asks API clients for no more than one request every three seconds.
const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum ArxivError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("arXiv returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed Atom feed: {0}")]
    Parse(#[from] quick_xml::DeError),

    #[error("arXiv returned an empty page at offset {0}")]
    EmptyPage(usize),
}

impl From<ArxivError> for AppError {
    fn from(e: ArxivError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

/// Anything that can answer an arXiv search.
#[async_trait]
pub trait PaperSource: Send + Sync {
    async fn search(&self, query: &ArxivQuery) -> Result<Vec<ArxivPaper>, ArxivError>;
}

#[derive(Clone)]
pub struct ArxivClient {
    client: Client,
    base_url: String,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl ArxivClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .context("Failed to build arXiv HTTP client")?,
            base_url: base_url.to_string(),
            min_interval: MIN_REQUEST_INTERVAL,
            last_request: Arc::new(Mutex::new(None)),
        })
    }

    #[cfg(test)]
    fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Waits until the shared request slot is free, then claims it.
    async fn wait_turn(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Fetches one page, retrying transport errors, 429 and 5xx.
    ///
    /// arXiv intermittently answers a later page with no entries, so an
    /// empty page past offset 0 is retried too. An empty first page means
    /// the query has no results.
    async fn fetch_page(
        &self,
        query: &ArxivQuery,
        start: usize,
        page_size: usize,
    ) -> Result<Vec<ArxivPaper>, ArxivError> {
        let start_param = start.to_string();
        let size_param = page_size.to_string();
        let params = [
            ("search_query", query.search_query.as_str()),
            ("start", start_param.as_str()),
            ("max_results", size_param.as_str()),
            ("sortBy", query.sort_by.as_param()),
            ("sortOrder", "descending"),
        ];

        let mut last_error: Option<ArxivError> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                warn!("arXiv page at offset {start} failed, retry {attempt}/{MAX_RETRIES}");
            }
            self.wait_turn().await;

            let response = match self.client.get(&self.base_url).query(&params).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ArxivError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(ArxivError::Status {
                    status: status.as_u16(),
                    body,
                });
                continue;
            }
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ArxivError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let body = response.text().await?;
            let page = parse_feed(&body)?;
            if page.is_empty() && start > 0 {
                last_error = Some(ArxivError::EmptyPage(start));
                continue;
            }
            return Ok(page);
        }

        Err(last_error.unwrap_or(ArxivError::Status {
            status: 0,
            body: "no attempt was made".to_string(),
        }))
    }
}

#[async_trait]
impl PaperSource for ArxivClient {
    /// Pages through results until `max_results` papers are collected or
    /// arXiv runs out. A failure after the first page returns what was
    /// already collected.
    async fn search(&self, query: &ArxivQuery) -> Result<Vec<ArxivPaper>, ArxivError> {
        info!(
            "Searching arXiv (max {}): {}",
            query.max_results, query.search_query
        );

        let mut papers: Vec<ArxivPaper> = Vec::new();
        let mut start = 0;

        while papers.len() < query.max_results {
            let page_size = PAGE_SIZE.min(query.max_results - papers.len());
            let page = match self.fetch_page(query, start, page_size).await {
                Ok(page) => page,
                Err(e) if !papers.is_empty() => {
                    warn!(
                        "arXiv search stopped early after {} papers: {e}",
                        papers.len()
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            let fetched = page.len();
            debug!("arXiv page at offset {start} returned {fetched} papers");
            papers.extend(page);

            if fetched < page_size {
                break;
            }
            start += fetched;
        }

        info!("arXiv returned {} papers", papers.len());
        Ok(papers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arxiv::query::{recommendation_pool_query, title_survey_query};
    use axum::{extract::Query, http::StatusCode, routing::get, Router};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn entry(n: usize) -> String {
        format!(
            r#"<entry>
  <id>http://arxiv.org/abs/2400.{n:05}v1</id>
  <published>2024-01-01T00:00:00Z</published>
  <title>Survey number {n}</title>
  <summary>Deep learning survey abstract number {n}.</summary>
  <author><name>Author {n}</name></author>
  <link title="pdf" href="http://arxiv.org/pdf/2400.{n:05}v1" rel="related"/>
  <category term="cs.LG"/>
</entry>"#
        )
    }

    /// Atom page for `[start, start + max_results)` out of `total` papers.
    fn atom_page(start: usize, max_results: usize, total: usize) -> String {
        let end = (start + max_results).min(total);
        let entries: String = (start..end).map(entry).collect();
        format!(r#"<feed xmlns="http://www.w3.org/2005/Atom">{entries}</feed>"#)
    }

    /// Stand-in arXiv API holding `total` papers. Fails with 500 for any
    /// offset at or beyond `fail_from`.
    async fn spawn_fake_arxiv(
        total: usize,
        fail_from: Option<usize>,
    ) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handler = move |Query(params): Query<HashMap<String, String>>| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let start: usize = params.get("start").and_then(|s| s.parse().ok()).unwrap_or(0);
                let max: usize = params
                    .get("max_results")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10);
                assert!(params.contains_key("search_query"));
                assert_eq!(params.get("sortOrder").map(String::as_str), Some("descending"));
                if fail_from.is_some_and(|f| start >= f) {
                    return Err(StatusCode::INTERNAL_SERVER_ERROR);
                }
                Ok(atom_page(start, max, total))
            }
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/api/query", get(handler)))
                .await
                .unwrap();
        });
        (format!("http://{addr}/api/query"), hits)
    }

    /// Like `spawn_fake_arxiv`, but the first `empty_replies` requests at
    /// offset 100 get a feed with no entries.
    async fn spawn_flaky_arxiv(total: usize, empty_replies: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let empties = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handler = move |Query(params): Query<HashMap<String, String>>| {
            let counter = counter.clone();
            let empties = empties.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                let start: usize = params.get("start").and_then(|s| s.parse().ok()).unwrap_or(0);
                let max: usize = params
                    .get("max_results")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10);
                if start == 100 && empties.fetch_add(1, Ordering::SeqCst) < empty_replies {
                    return atom_page(0, 0, 0);
                }
                atom_page(start, max, total)
            }
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, Router::new().route("/api/query", get(handler)))
                .await
                .unwrap();
        });
        (format!("http://{addr}/api/query"), hits)
    }

    fn client(url: &str) -> ArxivClient {
        ArxivClient::new(url)
            .unwrap()
            .with_min_interval(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_pages_until_limit() {
        let (url, hits) = spawn_fake_arxiv(1_000, None).await;
        let papers = client(&url)
            .search(&recommendation_pool_query(250))
            .await
            .unwrap();
        assert_eq!(papers.len(), 250);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(papers[0].arxiv_id, "2400.00000v1");
        assert_eq!(papers[249].arxiv_id, "2400.00249v1");
    }

    #[tokio::test]
    async fn test_short_page_ends_search() {
        let (url, hits) = spawn_fake_arxiv(42, None).await;
        let papers = client(&url)
            .search(&title_survey_query("survey", 500))
            .await
            .unwrap();
        assert_eq!(papers.len(), 42);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_later_page_failure_keeps_collected_results() {
        let (url, hits) = spawn_fake_arxiv(1_000, Some(100)).await;
        let papers = client(&url)
            .search(&title_survey_query("survey", 300))
            .await
            .unwrap();
        assert_eq!(papers.len(), 100);
        // one successful page, then the failing page plus its retries
        assert_eq!(hits.load(Ordering::SeqCst), 1 + 1 + MAX_RETRIES as usize);
    }

    #[tokio::test]
    async fn test_first_page_failure_is_an_error() {
        let (url, _) = spawn_fake_arxiv(1_000, Some(0)).await;
        let result = client(&url).search(&title_survey_query("survey", 10)).await;
        assert!(matches!(result, Err(ArxivError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_requests_are_spaced() {
        let (url, _) = spawn_fake_arxiv(1_000, None).await;
        let client = ArxivClient::new(&url)
            .unwrap()
            .with_min_interval(Duration::from_millis(200));
        let started = Instant::now();
        client
            .search(&title_survey_query("survey", 200))
            .await
            .unwrap();
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_empty_later_page_is_retried() {
        let (url, hits) = spawn_flaky_arxiv(1_000, 2).await;
        let papers = client(&url)
            .search(&title_survey_query("survey", 200))
            .await
            .unwrap();
        assert_eq!(papers.len(), 200);
        assert_eq!(papers[199].arxiv_id, "2400.00199v1");
        assert_eq!(hits.load(Ordering::SeqCst), 1 + 2 + 1);
    }

    #[tokio::test]
    async fn test_persistently_empty_page_keeps_collected_results() {
        let (url, hits) = spawn_flaky_arxiv(1_000, usize::MAX).await;
        let papers = client(&url)
            .search(&title_survey_query("survey", 300))
            .await
            .unwrap();
        assert_eq!(papers.len(), 100);
        assert_eq!(hits.load(Ordering::SeqCst), 1 + 1 + MAX_RETRIES as usize);
    }

    #[tokio::test]
    async fn test_empty_first_page_means_no_results() {
        let (url, hits) = spawn_fake_arxiv(0, None).await;
        let papers = client(&url)
            .search(&title_survey_query("nothing", 50))
            .await
            .unwrap();
        assert!(papers.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
