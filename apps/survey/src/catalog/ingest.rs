//! Stores fetched arXiv papers in the shared catalog.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::arxiv::feed::ArxivPaper;
use crate::errors::AppError;
use crate::models::survey::SurveyRow;
use crate::text::keywords::KeywordExtractor;

const WORDS_TO_PAGES: f64 = 0.8;
const MIN_PAGES: f64 = 15.0;
const MAX_PAGES: f64 = 60.0;

/// Minutes per page for each reader level.
const BEGINNER_MINUTES_PER_PAGE: f64 = 20.0;
const INTERMEDIATE_MINUTES_PER_PAGE: f64 = 12.0;
const ADVANCED_MINUTES_PER_PAGE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadingTime {
    pub beginner: i32,
    pub intermediate: i32,
    pub advanced: i32,
}

/// Guesses full-paper reading time from the abstract length.
pub fn estimate_reading_time(abstract_text: &str) -> ReadingTime {
    let words = abstract_text.split_whitespace().count() as f64;
    let pages = (words * WORDS_TO_PAGES).clamp(MIN_PAGES, MAX_PAGES);
    ReadingTime {
        beginner: (pages * BEGINNER_MINUTES_PER_PAGE) as i32,
        intermediate: (pages * INTERMEDIATE_MINUTES_PER_PAGE) as i32,
        advanced: (pages * ADVANCED_MINUTES_PER_PAGE) as i32,
    }
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// How many extracted keywords to keep per paper.
    pub keyword_count: usize,
    /// Stored in `tags` on newly inserted rows.
    pub tags: Option<String>,
}

fn join_keywords(keywords: Vec<String>) -> Option<String> {
    if keywords.is_empty() {
        None
    } else {
        Some(keywords.join(", "))
    }
}

/// Keywords for each `(title, abstract)` pair, computed off the async runtime.
async fn extract_all(
    extractor: &Arc<KeywordExtractor>,
    texts: Vec<(String, String)>,
    top_n: usize,
) -> Result<Vec<Option<String>>, AppError> {
    if texts.is_empty() {
        return Ok(Vec::new());
    }
    let extractor = Arc::clone(extractor);
    let keywords = tokio::task::spawn_blocking(move || {
        texts
            .iter()
            .map(|(title, abstract_text)| {
                join_keywords(extractor.extract_from_title_and_abstract(
                    title,
                    abstract_text,
                    top_n,
                ))
            })
            .collect()
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Keyword extraction task failed: {e}")))?;
    Ok(keywords)
}

/// Returns one catalog row per fetched paper, in fetch order.
///
/// Known arXiv ids reuse the stored row, backfilling keywords when the row
/// has none. Unknown papers get keywords and reading times and are inserted.
pub async fn store_papers(
    db: &PgPool,
    extractor: &Arc<KeywordExtractor>,
    papers: Vec<ArxivPaper>,
    opts: &IngestOptions,
) -> Result<Vec<SurveyRow>, AppError> {
    if papers.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = papers.iter().map(|p| p.arxiv_id.clone()).collect();
    let existing: Vec<SurveyRow> =
        sqlx::query_as("SELECT * FROM surveys WHERE arxiv_id = ANY($1)")
            .bind(&ids)
            .fetch_all(db)
            .await?;
    let mut known: HashMap<String, SurveyRow> = existing
        .into_iter()
        .map(|row| (row.arxiv_id.clone(), row))
        .collect();

    // Backfill keywords on stored rows that never got any.
    let missing: Vec<(i32, String, String)> = known
        .values()
        .filter(|row| row.keywords.as_deref().map_or(true, str::is_empty))
        .map(|row| {
            (
                row.id,
                row.title.clone(),
                row.abstract_text.clone().unwrap_or_default(),
            )
        })
        .collect();
    let backfill = extract_all(
        extractor,
        missing.iter().map(|(_, t, a)| (t.clone(), a.clone())).collect(),
        opts.keyword_count,
    )
    .await?;
    for ((id, _, _), keywords) in missing.iter().zip(backfill) {
        if keywords.is_none() {
            continue;
        }
        let row: SurveyRow =
            sqlx::query_as("UPDATE surveys SET keywords = $1 WHERE id = $2 RETURNING *")
                .bind(&keywords)
                .bind(id)
                .fetch_one(db)
                .await?;
        debug!("Backfilled keywords for {}", row.arxiv_id);
        known.insert(row.arxiv_id.clone(), row);
    }

    let fresh: Vec<&ArxivPaper> = papers
        .iter()
        .filter(|p| !known.contains_key(&p.arxiv_id))
        .collect();
    let fresh_keywords = extract_all(
        extractor,
        fresh
            .iter()
            .map(|p| (p.title.clone(), p.abstract_text.clone()))
            .collect(),
        opts.keyword_count,
    )
    .await?;

    let mut inserted = 0usize;
    for (paper, keywords) in fresh.into_iter().zip(fresh_keywords) {
        if known.contains_key(&paper.arxiv_id) {
            continue;
        }
        let reading = estimate_reading_time(&paper.abstract_text);
        // A concurrent ingest may have stored the same paper; keep its row.
        let row: SurveyRow = sqlx::query_as(
            r#"
            INSERT INTO surveys (
                arxiv_id, title, abstract, keywords, authors, published_date, pdf_url,
                categories, estimated_reading_time_beginner,
                estimated_reading_time_intermediate, estimated_reading_time_advanced, tags
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (arxiv_id) DO UPDATE SET arxiv_id = EXCLUDED.arxiv_id
            RETURNING *
            "#,
        )
        .bind(&paper.arxiv_id)
        .bind(&paper.title)
        .bind(&paper.abstract_text)
        .bind(&keywords)
        .bind(&paper.authors)
        .bind(paper.published_date)
        .bind(&paper.pdf_url)
        .bind(&paper.categories)
        .bind(reading.beginner)
        .bind(reading.intermediate)
        .bind(reading.advanced)
        .bind(&opts.tags)
        .fetch_one(db)
        .await?;
        inserted += 1;
        known.insert(row.arxiv_id.clone(), row);
    }

    info!(
        "Catalog ingest: {} fetched, {} new, {} backfilled",
        papers.len(),
        inserted,
        missing.len()
    );

    Ok(papers
        .iter()
        .filter_map(|p| known.get(&p.arxiv_id).cloned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn test_short_abstract_uses_minimum_pages() {
        assert_eq!(
            estimate_reading_time(""),
            ReadingTime {
                beginner: 300,
                intermediate: 180,
                advanced: 120
            }
        );
    }

    #[test]
    fn test_long_abstract_capped_at_maximum_pages() {
        assert_eq!(
            estimate_reading_time(&words(1_000)),
            ReadingTime {
                beginner: 1200,
                intermediate: 720,
                advanced: 480
            }
        );
    }

    #[test]
    fn test_midrange_abstract_truncates_minutes() {
        // 33 words -> 26.4 pages
        let t = estimate_reading_time(&words(33));
        assert_eq!(t.beginner, 528);
        assert_eq!(t.intermediate, 316);
        assert_eq!(t.advanced, 211);
    }

    #[test]
    fn test_whitespace_runs_count_once() {
        assert_eq!(
            estimate_reading_time("a  \n b\t c"),
            estimate_reading_time("a b c")
        );
    }

    #[test]
    fn test_empty_keyword_list_stores_null() {
        assert_eq!(join_keywords(Vec::new()), None);
        assert_eq!(
            join_keywords(vec!["graph".into(), "vision".into()]),
            Some("graph, vision".to_string())
        );
    }
}
