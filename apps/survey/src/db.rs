use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

const CONNECT_ATTEMPTS: u32 = 10;
const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Creates the PostgreSQL pool and applies this service's migrations.
/// The database container may still be starting, so connecting is retried.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let mut attempt = 1;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                warn!(
                    "PostgreSQL connection attempt {attempt}/{CONNECT_ATTEMPTS} failed: {e}; retrying in {}s",
                    CONNECT_RETRY_DELAY.as_secs()
                );
                attempt += 1;
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
            }
            Err(e) => {
                return Err(e).context(format!(
                    "Could not connect to PostgreSQL after {CONNECT_ATTEMPTS} attempts"
                ))
            }
        }
    };

    info!("PostgreSQL connection pool established");

    // The auth service may share this database and record its own migrations.
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
        .run(&pool)
        .await
        .context("Failed to apply survey migrations")?;

    info!("Survey schema is up to date");
    Ok(pool)
}
