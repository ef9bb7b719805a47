//! Text processing for papers: stop words, keyword extraction and TF-IDF.

pub mod keywords;
pub mod stopwords;
pub mod tfidf;
