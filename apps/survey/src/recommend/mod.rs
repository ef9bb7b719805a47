//! Content-based recommendations: TF-IDF vectors plus cosine similarity.
//!
//! `AppState` holds an `Arc<dyn Recommender>`. Ranking is CPU-bound, so
//! handlers call it through `spawn_blocking`.

pub mod handlers;

use std::collections::HashSet;

use tracing::debug;

use crate::models::survey::SurveyRow;
use crate::text::tfidf::{cosine, mean_vector, TfIdfVectorizer};

/// The parts of a paper the recommender reads.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperText {
    pub id: i32,
    pub title: String,
    pub abstract_text: String,
    pub keywords: String,
}

impl From<&SurveyRow> for PaperText {
    fn from(row: &SurveyRow) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            abstract_text: row.abstract_text.clone().unwrap_or_default(),
            keywords: row.keywords.clone().unwrap_or_default(),
        }
    }
}

/// Title three times and keywords twice, so both outweigh the abstract.
pub fn prepare_text(title: &str, abstract_text: &str, keywords: &str) -> String {
    let title = [title; 3].join(" ");
    let keywords = if keywords.is_empty() {
        String::new()
    } else {
        [keywords; 2].join(" ")
    };
    format!("{title} {abstract_text} {keywords}").trim().to_string()
}

fn document(paper: &PaperText) -> String {
    prepare_text(&paper.title, &paper.abstract_text, &paper.keywords)
}

/// `(paper id, similarity)` pairs, best first.
pub type Ranking = Vec<(i32, f64)>;

pub trait Recommender: Send + Sync {
    /// Candidates most similar to the average of the papers the user read.
    /// Papers already read are never recommended.
    fn recommend(&self, read: &[PaperText], candidates: &[PaperText], top_n: usize) -> Ranking;

    /// Candidates most similar to the interest fields taken as one document.
    fn recommend_by_interest(
        &self,
        interests: &[String],
        candidates: &[PaperText],
        top_n: usize,
    ) -> Ranking;
}

/// Refits the vectorizer on the candidate pool for every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct TfIdfRecommender;

fn rank(mut scored: Ranking, top_n: usize) -> Ranking {
    // stable: equal scores keep candidate order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_n);
    scored
}

impl Recommender for TfIdfRecommender {
    fn recommend(&self, read: &[PaperText], candidates: &[PaperText], top_n: usize) -> Ranking {
        if read.is_empty() || candidates.is_empty() {
            return Vec::new();
        }

        let docs: Vec<String> = candidates.iter().map(document).collect();
        let (vectorizer, matrix) = TfIdfVectorizer::fit_transform(&docs);
        debug!(
            "TF-IDF fitted {} terms on {} candidates",
            vectorizer.vocabulary_len(),
            docs.len()
        );

        let read_vectors: Vec<Vec<f64>> = read
            .iter()
            .map(|p| vectorizer.transform(&document(p)))
            .collect();
        let profile = mean_vector(&read_vectors);
        let read_ids: HashSet<i32> = read.iter().map(|p| p.id).collect();

        let scored = candidates
            .iter()
            .zip(&matrix)
            .filter(|(p, _)| !read_ids.contains(&p.id))
            .map(|(p, v)| (p.id, cosine(&profile, v)))
            .collect();
        rank(scored, top_n)
    }

    fn recommend_by_interest(
        &self,
        interests: &[String],
        candidates: &[PaperText],
        top_n: usize,
    ) -> Ranking {
        if interests.is_empty() || candidates.is_empty() {
            return Vec::new();
        }

        let docs: Vec<String> = candidates.iter().map(document).collect();
        let (vectorizer, matrix) = TfIdfVectorizer::fit_transform(&docs);
        let interest = vectorizer.transform(&interests.join(" "));

        let scored = candidates
            .iter()
            .zip(&matrix)
            .map(|(p, v)| (p.id, cosine(&interest, v)))
            .collect();
        rank(scored, top_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paper(id: i32, title: &str, abstract_text: &str) -> PaperText {
        PaperText {
            id,
            title: title.to_string(),
            abstract_text: abstract_text.to_string(),
            keywords: String::new(),
        }
    }

    fn pool() -> Vec<PaperText> {
        vec![
            paper(1, "Graph neural networks survey", "message passing on graph data"),
            paper(2, "Vision transformers survey", "attention for image recognition"),
            paper(3, "Speech recognition review", "acoustic models and decoding"),
            paper(4, "Graph attention networks", "attention over graph neighbourhoods"),
            paper(5, "Reinforcement learning survey", "policy gradients and value functions"),
        ]
    }

    #[test]
    fn test_prepare_text_weights_title_and_keywords() {
        assert_eq!(prepare_text("T", "abs", "k1, k2"), "T T T abs k1, k2 k1, k2");
        assert_eq!(prepare_text("T", "abs", ""), "T T T abs");
        assert_eq!(prepare_text("", "", ""), "");
    }

    #[test]
    fn test_empty_inputs_give_nothing() {
        let r = TfIdfRecommender;
        assert!(r.recommend(&[], &pool(), 10).is_empty());
        assert!(r.recommend(&pool()[..1], &[], 10).is_empty());
        assert!(r.recommend_by_interest(&[], &pool(), 10).is_empty());
    }

    #[test]
    fn test_similar_paper_ranks_first_and_read_papers_are_excluded() {
        let r = TfIdfRecommender;
        let candidates = pool();
        let read = vec![candidates[0].clone()];
        let ranking = r.recommend(&read, &candidates, 10);

        assert_eq!(ranking.len(), 4);
        assert!(ranking.iter().all(|(id, _)| *id != 1));
        assert_eq!(ranking[0].0, 4);
        assert!(ranking.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_top_n_limits_results() {
        let r = TfIdfRecommender;
        let candidates = pool();
        assert_eq!(r.recommend(&candidates[..1], &candidates, 2).len(), 2);
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        let r = TfIdfRecommender;
        let candidates = pool();
        let read = vec![paper(99, "quantum chemistry", "")];
        let ids: Vec<i32> = r
            .recommend(&read, &candidates, 10)
            .into_iter()
            .map(|(id, score)| {
                assert_eq!(score, 0.0);
                id
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_single_candidate_scores_zero() {
        let r = TfIdfRecommender;
        let candidates = vec![paper(1, "graph survey", "graph")];
        let read = vec![paper(2, "graph survey", "graph")];
        assert_eq!(r.recommend(&read, &candidates, 10), vec![(1, 0.0)]);
    }

    #[test]
    fn test_interest_ranking() {
        let r = TfIdfRecommender;
        let ranking = r.recommend_by_interest(&["speech".to_string()], &pool(), 1);
        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].0, 3);
        assert!(ranking[0].1 > 0.0);
    }
}
