//! Query parameters and citation relation types.

use serde::{Deserialize, Serialize};

use crate::models::Paper;

/// Paging and year-window parameters for list operations.
///
/// `page` is 1-based; `page_size` is clamped to the provider's maximum
/// before any request is issued, so upstream never rejects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Earliest publication year, inclusive
    pub start_year: Option<i32>,

    /// Latest publication year, inclusive
    pub end_year: Option<i32>,

    /// 1-based page number
    pub page: usize,

    /// Entries per page (clamped per provider)
    pub page_size: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            start_year: None,
            end_year: None,
            page: 1,
            page_size: 20,
        }
    }
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inclusive year window.
    pub fn years(mut self, start_year: Option<i32>, end_year: Option<i32>) -> Self {
        self.start_year = start_year;
        self.end_year = end_year;
        self
    }

    /// Set the 1-based page number.
    pub fn page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    /// Set the page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Copy with `page_size` clamped to a provider maximum.
    pub fn clamped(&self, max_page_size: usize) -> Self {
        Self {
            page_size: self.page_size.min(max_page_size),
            ..self.clone()
        }
    }

    /// Whether any year bound is set.
    pub fn has_year_filter(&self) -> bool {
        self.start_year.is_some() || self.end_year.is_some()
    }
}

/// Which side of the citation graph to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationDirection {
    /// Papers that cite the given paper
    CitedBy,
    /// Identifiers of works the given paper references
    References,
    /// Both sides
    Both,
}

impl CitationDirection {
    pub fn wants_cited_by(self) -> bool {
        matches!(self, CitationDirection::CitedBy | CitationDirection::Both)
    }

    pub fn wants_references(self) -> bool {
        matches!(self, CitationDirection::References | CitationDirection::Both)
    }
}

/// Citation relations of one paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationRelations {
    /// The paper the relations are anchored on
    pub paper_id: String,

    /// Papers that cite this paper (empty unless requested)
    pub cited_by: Vec<Paper>,

    /// Identifiers of works this paper references (empty unless requested,
    /// or when the provider cannot expose them)
    pub references: Vec<String>,
}

impl CitationRelations {
    pub fn empty(paper_id: impl Into<String>) -> Self {
        Self {
            paper_id: paper_id.into(),
            cited_by: Vec::new(),
            references: Vec::new(),
        }
    }
}
