//! Paper model representing a publication from any provider.

use serde::{Deserialize, Serialize};

/// A publication in canonical form.
///
/// The identifier is provider-scoped and stable across repeated fetches
/// from the same provider. `author_ids` runs parallel to `authors` but may
/// be shorter when some authors could not be resolved upstream. Counts are
/// cumulative metadata and default to zero when the provider omits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    /// Provider-scoped identifier (OpenAlex work id, Scopus EID, DOI, ...)
    pub id: String,

    /// Paper title
    pub title: String,

    /// Author names in publication order
    pub authors: Vec<String>,

    /// Resolved author identifiers, parallel to `authors` (may be shorter)
    pub author_ids: Vec<String>,

    /// Publication year
    pub year: Option<i32>,

    /// Full publication date (ISO format) when the provider exposes one
    pub publish_date: Option<String>,

    /// Journal or venue name
    pub venue: Option<String>,

    /// Digital Object Identifier
    pub doi: Option<String>,

    /// Times this paper has been cited (0 when unknown upstream)
    pub citation_count: u32,

    /// Number of works this paper references (0 when unknown upstream)
    pub reference_count: u32,

    /// Landing page URL
    pub url: Option<String>,

    /// Keywords / subject areas
    pub keywords: Vec<String>,

    /// Abstract text
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,

    /// Language code (e.g. "en")
    pub language: Option<String>,

    /// Volume number
    pub volume: Option<String>,

    /// Issue number
    pub issue: Option<String>,

    /// Page range
    pub pages: Option<String>,

    /// Provider that produced this record
    pub provider: String,
}

impl Paper {
    /// Create a paper with required fields; everything else starts empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            author_ids: Vec::new(),
            year: None,
            publish_date: None,
            venue: None,
            doi: None,
            citation_count: 0,
            reference_count: 0,
            url: None,
            keywords: Vec::new(),
            abstract_text: None,
            language: None,
            volume: None,
            issue: None,
            pages: None,
            provider: provider.into(),
        }
    }

    /// Primary identifier: DOI if available, the provider id otherwise.
    pub fn primary_id(&self) -> &str {
        self.doi.as_deref().unwrap_or(&self.id)
    }

    /// First author, if any.
    pub fn first_author(&self) -> Option<&str> {
        self.authors.first().map(|s| s.as_str())
    }

    /// Whether the paper falls inside an inclusive year range. Papers with
    /// no year never match a bounded range.
    pub fn in_year_range(&self, start_year: Option<i32>, end_year: Option<i32>) -> bool {
        if start_year.is_none() && end_year.is_none() {
            return true;
        }
        match self.year {
            Some(year) => {
                start_year.map_or(true, |s| year >= s) && end_year.map_or(true, |e| year <= e)
            }
            None => false,
        }
    }
}

impl std::fmt::Display for Paper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut byline = self.authors.iter().take(3).cloned().collect::<Vec<_>>().join(", ");
        if self.authors.len() > 3 {
            byline.push_str(" et al.");
        }
        write!(f, "[{}] {} - {}", self.id, self.title, byline)?;
        if let Some(year) = self.year {
            write!(f, " ({})", year)?;
        }
        Ok(())
    }
}
