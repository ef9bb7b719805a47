use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client as RedisClient;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::arxiv::feed::ArxivPaper;
use crate::arxiv::query::ArxivQuery;
use crate::arxiv::{ArxivError, PaperSource};

const RECONNECT_RETRIES: usize = 1;
const RECONNECT_BACKOFF_MS: u64 = 100;

pub fn cache_key(query: &ArxivQuery) -> String {
    format!(
        "arxiv:{}:{}:{}",
        query.sort_by.as_param(),
        query.max_results,
        query.search_query
    )
}

/// Serves repeated arXiv queries from Redis.
///
/// The API asks clients for one request every three seconds and a
/// 500-result query takes five pages, so identical searches within the TTL
/// are answered from cache. Redis failures fall through to the inner source.
/// One reconnecting Redis connection is opened on first use and shared.
pub struct CachedPaperSource {
    inner: Arc<dyn PaperSource>,
    redis: RedisClient,
    connection: OnceCell<ConnectionManager>,
    ttl_secs: u64,
}

impl CachedPaperSource {
    pub fn new(inner: Arc<dyn PaperSource>, redis: RedisClient, ttl_secs: u64) -> Self {
        Self {
            inner,
            redis,
            connection: OnceCell::new(),
            ttl_secs,
        }
    }

    async fn connection(&self) -> redis::RedisResult<ConnectionManager> {
        let con = self
            .connection
            .get_or_try_init(|| {
                ConnectionManager::new_with_backoff(
                    self.redis.clone(),
                    2,
                    RECONNECT_BACKOFF_MS,
                    RECONNECT_RETRIES,
                )
            })
            .await?;
        Ok(con.clone())
    }

    async fn lookup(&self, key: &str) -> redis::RedisResult<Option<Vec<ArxivPaper>>> {
        let mut con = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET").arg(key).query_async(&mut con).await?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    async fn store(&self, key: &str, papers: &[ArxivPaper]) -> redis::RedisResult<()> {
        let Ok(payload) = serde_json::to_string(papers) else {
            return Ok(());
        };
        let mut con = self.connection().await?;
        redis::cmd("SETEX")
            .arg(key)
            .arg(self.ttl_secs)
            .arg(payload)
            .query_async::<_, ()>(&mut con)
            .await
    }
}

#[async_trait]
impl PaperSource for CachedPaperSource {
    async fn search(&self, query: &ArxivQuery) -> Result<Vec<ArxivPaper>, ArxivError> {
        let key = cache_key(query);

        match self.lookup(&key).await {
            Ok(Some(papers)) => {
                debug!("arXiv cache hit for {key} ({} papers)", papers.len());
                return Ok(papers);
            }
            Ok(None) => {}
            Err(e) => warn!("arXiv cache lookup failed, querying arXiv directly: {e}"),
        }

        let papers = self.inner.search(query).await?;

        if !papers.is_empty() {
            if let Err(e) = self.store(&key, &papers).await {
                warn!("Failed to cache arXiv results for {key}: {e}");
            }
        }
        Ok(papers)
    }
}
