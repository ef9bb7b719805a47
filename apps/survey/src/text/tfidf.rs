//! TF-IDF vectorizer over unigrams and bigrams.
//!
//! Vocabulary is fitted per call: terms found in more than 80% of documents
//! are dropped, the 1000 most frequent survive, idf is smoothed
//! (`ln((1 + n) / (1 + df)) + 1`) and every row is L2-normalised.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::text::stopwords::is_stopword;

const MAX_DOC_FRACTION: f64 = 0.8;
const MAX_FEATURES: usize = 1000;

fn word_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("valid word regex"))
}

/// Lowercased unigrams and bigrams of `text`, stop words removed first.
pub fn analyze(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = word_regex()
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|w| !is_stopword(w))
        .collect();

    let mut grams: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    grams.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    grams
}

fn term_counts(text: &str) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for gram in analyze(text) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

#[derive(Debug, Clone, Default)]
pub struct TfIdfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfVectorizer {
    /// Fits the vocabulary on `documents` and returns their vectors.
    pub fn fit_transform(documents: &[String]) -> (Self, Vec<Vec<f64>>) {
        let counts: Vec<HashMap<String, usize>> =
            documents.iter().map(|d| term_counts(d)).collect();
        let n_docs = documents.len();

        let mut df: HashMap<&str, usize> = HashMap::new();
        let mut total: HashMap<&str, usize> = HashMap::new();
        for doc in &counts {
            for (term, &c) in doc {
                *df.entry(term.as_str()).or_insert(0) += 1;
                *total.entry(term.as_str()).or_insert(0) += c;
            }
        }

        let max_doc_count = MAX_DOC_FRACTION * n_docs as f64;
        let mut kept: Vec<(&str, usize)> = total
            .into_iter()
            .filter(|(term, _)| df[term] as f64 <= max_doc_count)
            .collect();
        kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        kept.truncate(MAX_FEATURES);

        let mut terms: Vec<&str> = kept.into_iter().map(|(t, _)| t).collect();
        terms.sort_unstable();

        let vocabulary: HashMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();
        let idf: Vec<f64> = terms
            .iter()
            .map(|t| ((1.0 + n_docs as f64) / (1.0 + df[t] as f64)).ln() + 1.0)
            .collect();

        let vectorizer = Self { vocabulary, idf };
        let vectors = counts.iter().map(|c| vectorizer.weigh(c)).collect();
        (vectorizer, vectors)
    }

    pub fn transform(&self, text: &str) -> Vec<f64> {
        self.weigh(&term_counts(text))
    }

    pub fn vocabulary_len(&self) -> usize {
        self.idf.len()
    }

    fn weigh(&self, counts: &HashMap<String, usize>) -> Vec<f64> {
        let mut v = vec![0.0; self.idf.len()];
        for (term, &c) in counts {
            if let Some(&i) = self.vocabulary.get(term) {
                v[i] = c as f64 * self.idf[i];
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

/// Column-wise mean. Empty input gives an empty vector.
pub fn mean_vector(vectors: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let mut out = vec![0.0; first.len()];
    for v in vectors {
        for (o, x) in out.iter_mut().zip(v) {
            *o += x;
        }
    }
    let n = vectors.len() as f64;
    out.iter_mut().for_each(|o| *o /= n);
    out
}

/// Cosine similarity; zero when either side is the zero vector.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}
