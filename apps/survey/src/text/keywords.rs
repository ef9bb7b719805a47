//! Unsupervised keyword extraction in the YAKE style.
//!
//! Every distinct word becomes a term scored from five local statistics
//! (casing, position, frequency, relatedness to context, spread over
//! sentences). Candidate phrases of up to `max_ngram` words are scored from
//! their terms; a lower score is a better keyword.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::text::stopwords::is_stopword;

const DEFAULT_MAX_NGRAM: usize = 3;
const DEFAULT_DEDUP_THRESHOLD: f64 = 0.9;
const DEFAULT_WINDOW: usize = 1;
const DEFAULT_TOP: usize = 10;

/// Words (with inner hyphens, apostrophes or dots) and single punctuation marks.
fn token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+(?:['\-.]\w+)*|[^\w\s]").expect("valid token regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    /// Number.
    Digit,
    /// Mixed letters and digits, or heavy punctuation.
    Unusual,
    /// All caps.
    Acronym,
    /// Capitalised away from the sentence start.
    Noun,
    Plain,
}

impl Tag {
    fn of(word: &str, position_in_sentence: usize) -> Tag {
        if word.replace(',', "").parse::<f64>().is_ok() {
            return Tag::Digit;
        }
        let digits = word.chars().filter(|c| c.is_numeric()).count();
        let alpha = word.chars().filter(|c| c.is_alphabetic()).count();
        let punct = word.chars().filter(|c| c.is_ascii_punctuation()).count();
        if (digits > 0 && alpha > 0) || (digits == 0 && alpha == 0) || punct > 1 {
            return Tag::Unusual;
        }
        let upper = word.chars().filter(|c| c.is_uppercase()).count();
        if upper == word.chars().count() {
            return Tag::Acronym;
        }
        let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
        if upper == 1 && word.chars().count() > 1 && starts_upper && position_in_sentence > 0 {
            return Tag::Noun;
        }
        Tag::Plain
    }

    fn discarded(self) -> bool {
        matches!(self, Tag::Digit | Tag::Unusual)
    }
}

#[derive(Debug, Default)]
struct Term {
    tf: f64,
    tf_acronym: f64,
    tf_noun: f64,
    sentences: BTreeSet<usize>,
    stopword: bool,
    score: f64,
}

#[derive(Debug)]
struct Candidate {
    phrase: String,
    terms: Vec<usize>,
    tf: f64,
}

/// Lowercased, plural-stripped key and stopword flag for a surface word.
fn term_key(word: &str) -> (String, bool) {
    let lower = word.to_lowercase();
    let plain_stop = is_stopword(&lower);
    let key = if lower.ends_with('s') && lower.chars().count() > 3 {
        let mut k = lower.clone();
        k.pop();
        k
    } else {
        lower
    };
    let letters = key.chars().filter(|c| !c.is_ascii_punctuation()).count();
    let stopword = plain_stop || is_stopword(&key) || letters < 3;
    (key, stopword)
}

/// Levenshtein similarity in `[0, 1]`.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    1.0 - prev[b.len()] as f64 / longest as f64
}

fn median(sorted: &[usize]) -> f64 {
    match sorted.len() {
        0 => 0.0,
        n if n % 2 == 1 => sorted[n / 2] as f64,
        n => (sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0,
    }
}

#[derive(Debug, Clone)]
pub struct KeywordExtractor {
    max_ngram: usize,
    dedup_threshold: f64,
    window: usize,
    top: usize,
}

impl Default for KeywordExtractor {
    fn default() -> Self {
        Self {
            max_ngram: DEFAULT_MAX_NGRAM,
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            window: DEFAULT_WINDOW,
            top: DEFAULT_TOP,
        }
    }
}

impl KeywordExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best `top_n` keywords of `text` (never more than ten), lowercase.
    pub fn extract_keywords(&self, text: &str, top_n: usize) -> Vec<String> {
        if text.trim().is_empty() || top_n == 0 {
            return Vec::new();
        }
        let mut ranked = self.rank(text);
        ranked.truncate(top_n);
        ranked
    }

    /// The title is repeated so its words weigh more than the abstract's.
    pub fn extract_from_title_and_abstract(
        &self,
        title: &str,
        abstract_text: &str,
        top_n: usize,
    ) -> Vec<String> {
        self.extract_keywords(&format!("{title} {title} {abstract_text}"), top_n)
    }

    fn rank(&self, text: &str) -> Vec<String> {
        let mut terms: Vec<Term> = Vec::new();
        let mut term_ids: HashMap<String, usize> = HashMap::new();
        let mut cooccur: HashMap<(usize, usize), f64> = HashMap::new();
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut candidate_ids: HashMap<String, usize> = HashMap::new();

        let mut sentence = 0usize;
        let mut position = 0usize;
        // (tag, term id, surface word) for the current punctuation-free chunk
        let mut chunk: Vec<(Tag, usize, &str)> = Vec::new();

        for m in token_regex().find_iter(text) {
            let token = m.as_str();

            if !token.chars().any(char::is_alphanumeric) {
                chunk.clear();
                if matches!(token, "." | "!" | "?") && position > 0 {
                    sentence += 1;
                    position = 0;
                }
                continue;
            }

            let tag = Tag::of(token, position);
            let (key, stopword) = term_key(token);
            let id = *term_ids.entry(key).or_insert_with(|| {
                terms.push(Term {
                    stopword,
                    ..Term::default()
                });
                terms.len() - 1
            });

            let term = &mut terms[id];
            term.tf += 1.0;
            term.sentences.insert(sentence);
            match tag {
                Tag::Acronym => term.tf_acronym += 1.0,
                Tag::Noun => term.tf_noun += 1.0,
                _ => {}
            }

            if !tag.discarded() {
                let from = chunk.len().saturating_sub(self.window);
                for &(prev_tag, prev_id, _) in &chunk[from..] {
                    if !prev_tag.discarded() {
                        *cooccur.entry((prev_id, id)).or_insert(0.0) += 1.0;
                    }
                }
            }

            chunk.push((tag, id, token));
            position += 1;

            for n in 1..=self.max_ngram.min(chunk.len()) {
                let words = &chunk[chunk.len() - n..];
                if words.iter().any(|(t, _, _)| t.discarded()) {
                    continue;
                }
                let (first, last) = (words[0].1, words[n - 1].1);
                if terms[first].stopword || terms[last].stopword {
                    continue;
                }
                let phrase = words
                    .iter()
                    .map(|(_, _, w)| w.to_lowercase())
                    .collect::<Vec<_>>()
                    .join(" ");
                let cid = *candidate_ids.entry(phrase.clone()).or_insert_with(|| {
                    candidates.push(Candidate {
                        phrase,
                        terms: words.iter().map(|(_, id, _)| *id).collect(),
                        tf: 0.0,
                    });
                    candidates.len() - 1
                });
                candidates[cid].tf += 1.0;
            }
        }

        if candidates.is_empty() {
            return Vec::new();
        }

        score_terms(&mut terms, &cooccur, sentence + usize::from(position > 0));

        let mut scored: Vec<(f64, &str)> = candidates
            .iter()
            .map(|c| (candidate_score(c, &terms, &cooccur), c.phrase.as_str()))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut picked: Vec<String> = Vec::new();
        for (_, phrase) in scored {
            if picked
                .iter()
                .any(|p| similarity(p, phrase) > self.dedup_threshold)
            {
                continue;
            }
            picked.push(phrase.to_string());
            if picked.len() == self.top {
                break;
            }
        }
        picked
    }
}

fn score_terms(terms: &mut [Term], cooccur: &HashMap<(usize, usize), f64>, sentence_count: usize) {
    let valid: Vec<f64> = terms.iter().filter(|t| !t.stopword).map(|t| t.tf).collect();
    let mean = valid.iter().sum::<f64>() / valid.len().max(1) as f64;
    let std = (valid.iter().map(|tf| (tf - mean).powi(2)).sum::<f64>()
        / valid.len().max(1) as f64)
        .sqrt();
    let max_tf = terms.iter().map(|t| t.tf).fold(0.0, f64::max);
    let sentence_count = sentence_count.max(1) as f64;

    let mut left: Vec<(f64, f64)> = vec![(0.0, 0.0); terms.len()];
    let mut right: Vec<(f64, f64)> = vec![(0.0, 0.0); terms.len()];
    for (&(from, to), &weight) in cooccur {
        right[from].0 += 1.0;
        right[from].1 += weight;
        left[to].0 += 1.0;
        left[to].1 += weight;
    }
    let ratio = |(distinct, total): (f64, f64)| if total == 0.0 { 0.0 } else { distinct / total };

    for (i, term) in terms.iter_mut().enumerate() {
        let rel = (0.5 + ratio(left[i]) * term.tf / max_tf) + (0.5 + ratio(right[i]) * term.tf / max_tf);
        let freq = if mean + std > 0.0 {
            term.tf / (mean + std)
        } else {
            0.0
        };
        let spread = term.sentences.len() as f64 / sentence_count;
        let case = term.tf_acronym.max(term.tf_noun) / (1.0 + term.tf.ln());
        let ids: Vec<usize> = term.sentences.iter().copied().collect();
        let pos = (3.0 + median(&ids)).ln().ln();
        term.score = (pos * rel) / (case + freq / rel + spread / rel);
    }
}

fn candidate_score(c: &Candidate, terms: &[Term], cooccur: &HashMap<(usize, usize), f64>) -> f64 {
    let mut sum = 0.0;
    let mut prod = 1.0;
    for (i, &id) in c.terms.iter().enumerate() {
        let term = &terms[id];
        if !term.stopword {
            sum += term.score;
            prod *= term.score;
            continue;
        }
        // interior stopword: weigh by how strongly it binds its neighbours
        let prev = c.terms[i - 1];
        let next = c.terms[i + 1];
        let p_left = cooccur.get(&(prev, id)).map_or(0.0, |w| w / terms[prev].tf);
        let p_right = cooccur.get(&(id, next)).map_or(0.0, |w| w / terms[next].tf);
        let prob = p_left * p_right;
        prod *= 1.0 + (1.0 - prob);
        sum -= 1.0 - prob;
    }
    prod / ((sum + 1.0) * c.tf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABSTRACT: &str = "Graph neural networks have become the standard tool for learning on \
        graph structured data. This survey reviews graph neural networks for recommendation, \
        covering message passing, graph attention and graph pooling. We also discuss open \
        problems of graph neural networks in large scale recommendation.";

    #[test]
    fn test_empty_text_yields_nothing() {
        let ex = KeywordExtractor::new();
        assert!(ex.extract_keywords("", 3).is_empty());
        assert!(ex.extract_keywords("   \n ", 3).is_empty());
    }

    #[test]
    fn test_only_stopwords_yields_nothing() {
        let ex = KeywordExtractor::new();
        assert!(ex.extract_keywords("of the and to it is", 5).is_empty());
    }

    #[test]
    fn test_returns_requested_count_lowercase() {
        let ex = KeywordExtractor::new();
        let kws = ex.extract_keywords(ABSTRACT, 5);
        assert_eq!(kws.len(), 5);
        for kw in &kws {
            assert_eq!(kw, &kw.to_lowercase());
            assert!(kw.split(' ').count() <= 3);
        }
    }

    #[test]
    fn test_never_more_than_ten() {
        let ex = KeywordExtractor::new();
        assert!(ex.extract_keywords(ABSTRACT, 50).len() <= 10);
    }

    #[test]
    fn test_repeated_topic_ranks_high() {
        let ex = KeywordExtractor::new();
        let kws = ex.extract_from_title_and_abstract("Graph Neural Networks", ABSTRACT, 3);
        assert!(kws.iter().any(|k| k.contains("graph")), "{kws:?}");
    }

    #[test]
    fn test_candidates_do_not_start_or_end_with_stopwords() {
        let ex = KeywordExtractor::new();
        for kw in ex.extract_keywords(ABSTRACT, 10) {
            let words: Vec<&str> = kw.split(' ').collect();
            assert!(!is_stopword(words[0]), "{kw}");
            assert!(!is_stopword(words[words.len() - 1]), "{kw}");
        }
    }

    #[test]
    fn test_candidates_do_not_cross_punctuation() {
        let ex = KeywordExtractor::new();
        let kws = ex.extract_keywords("transformers, diffusion. transformers, diffusion", 10);
        assert!(kws.iter().all(|k| !k.contains(' ')), "{kws:?}");
    }

    #[test]
    fn test_numbers_are_not_keywords() {
        let ex = KeywordExtractor::new();
        let kws = ex.extract_keywords("In 2023 we trained 175 models on ImageNet benchmarks", 10);
        assert!(kws.iter().all(|k| !k.contains("2023") && !k.contains("175")), "{kws:?}");
    }

    #[test]
    fn test_near_duplicates_are_dropped() {
        let ex = KeywordExtractor::new();
        let kws = ex.extract_keywords(ABSTRACT, 10);
        for (i, a) in kws.iter().enumerate() {
            for b in &kws[i + 1..] {
                assert!(similarity(a, b) <= 0.9, "{a} / {b}");
            }
        }
    }

    #[test]
    fn test_tags() {
        assert_eq!(Tag::of("2024", 3), Tag::Digit);
        assert_eq!(Tag::of("1,000", 3), Tag::Digit);
        assert_eq!(Tag::of("GPT4", 3), Tag::Unusual);
        assert_eq!(Tag::of("CNN", 3), Tag::Acronym);
        assert_eq!(Tag::of("Transformer", 3), Tag::Noun);
        assert_eq!(Tag::of("Transformer", 0), Tag::Plain);
        assert_eq!(Tag::of("learning", 3), Tag::Plain);
    }

    #[test]
    fn test_term_key_strips_plural_and_flags_short_words() {
        assert_eq!(term_key("Networks"), ("network".to_string(), false));
        assert_eq!(term_key("gas"), ("gas".to_string(), false));
        assert!(term_key("AI").1);
        assert!(term_key("the").1);
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("graph", "graph"), 1.0);
        assert!(similarity("neural network", "neural networks") > 0.9);
        assert!(similarity("graph", "vision") < 0.5);
    }
}
