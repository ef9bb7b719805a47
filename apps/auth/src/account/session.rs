use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::Client as RedisClient;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::errors::AppError;

/// Session payload stored in Redis next to each live token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: i32,
    pub username: String,
    pub email: String,
}

/// Redis-backed session registry. A token is only honoured while its key exists.
///
/// Clones share one reconnecting connection, opened on first use.
#[derive(Clone)]
pub struct SessionStore {
    client: RedisClient,
    connection: Arc<OnceCell<ConnectionManager>>,
    ttl_secs: u64,
}

/// One reconnect attempt with a short backoff, so a Redis outage fails fast.
const RECONNECT_RETRIES: usize = 1;
const RECONNECT_BACKOFF_MS: u64 = 100;

pub fn session_key(token: &str) -> String {
    format!("session:{token}")
}

impl SessionStore {
    pub fn new(client: RedisClient, ttl_secs: u64) -> Self {
        Self {
            client,
            connection: Arc::new(OnceCell::new()),
            ttl_secs,
        }
    }

    /// A failed first connect leaves the cell empty, so the next call retries.
    async fn connection(&self) -> redis::RedisResult<ConnectionManager> {
        let con = self
            .connection
            .get_or_try_init(|| {
                ConnectionManager::new_with_backoff(
                    self.client.clone(),
                    2,
                    RECONNECT_BACKOFF_MS,
                    RECONNECT_RETRIES,
                )
            })
            .await?;
        Ok(con.clone())
    }

    pub async fn create(&self, token: &str, session: &Session) -> Result<(), AppError> {
        let payload = serde_json::to_string(session).map_err(anyhow::Error::from)?;
        let mut con = self.connection().await?;
        redis::cmd("SETEX")
            .arg(session_key(token))
            .arg(self.ttl_secs)
            .arg(payload)
            .query_async::<_, ()>(&mut con)
            .await?;
        debug!("Stored session for user {}", session.user_id);
        Ok(())
    }

    pub async fn get(&self, token: &str) -> Result<Option<Session>, AppError> {
        let mut con = self.connection().await?;
        let raw: Option<String> = redis::cmd("GET")
            .arg(session_key(token))
            .query_async(&mut con)
            .await?;
        // An unreadable payload is treated like an absent session.
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    pub async fn delete(&self, token: &str) -> Result<(), AppError> {
        let mut con = self.connection().await?;
        redis::cmd("DEL")
            .arg(session_key(token))
            .query_async::<_, i64>(&mut con)
            .await?;
        Ok(())
    }
}
