//! Atom feed returned by the arXiv query API.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// One paper as reported by arXiv, normalised for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArxivPaper {
    pub arxiv_id: String,
    pub title: String,
    pub abstract_text: String,
    pub authors: String,
    pub published_date: Option<NaiveDate>,
    pub pdf_url: Option<String>,
    pub categories: String,
}

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    published: Option<String>,
    #[serde(rename = "author", default)]
    authors: Vec<Author>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
    #[serde(rename = "category", default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: String,
    #[serde(rename = "@title", default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(rename = "@term")]
    term: String,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Entry {
    /// arXiv reports query errors as a pseudo-entry under `/api/errors`.
    fn is_error(&self) -> bool {
        self.id.contains("/api/errors")
    }

    fn into_paper(self) -> ArxivPaper {
        let arxiv_id = self
            .id
            .trim()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();

        let published_date = self
            .published
            .as_deref()
            .and_then(|p| DateTime::parse_from_rfc3339(p.trim()).ok())
            .map(|dt| dt.date_naive());

        let pdf_url = self
            .links
            .iter()
            .find(|l| l.title.as_deref() == Some("pdf"))
            .map(|l| l.href.clone());

        ArxivPaper {
            arxiv_id,
            title: collapse_whitespace(&self.title),
            abstract_text: self.summary.trim().to_string(),
            authors: self
                .authors
                .iter()
                .map(|a| a.name.trim())
                .collect::<Vec<_>>()
                .join(", "),
            published_date,
            pdf_url,
            categories: self
                .categories
                .iter()
                .map(|c| c.term.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Parses an Atom response body into papers, skipping error entries.
pub fn parse_feed(xml: &str) -> Result<Vec<ArxivPaper>, quick_xml::DeError> {
    let feed: Feed = quick_xml::de::from_str(xml)?;
    Ok(feed
        .entries
        .into_iter()
        .filter(|e| !e.is_error())
        .map(Entry::into_paper)
        .collect())
}
