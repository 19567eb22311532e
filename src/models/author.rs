//! Author model.

use serde::{Deserialize, Serialize};

/// An author in canonical form.
///
/// `h_index` stays `None` when the provider does not report it: it is
/// structural metadata, unlike the cumulative counts which default to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Provider-scoped author identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Current or last known affiliation
    pub affiliation: Option<String>,

    /// h-index (unknown when the provider does not report one)
    pub h_index: Option<u32>,

    /// Total citations across all works (0 when unknown upstream)
    pub citation_count: u32,

    /// Number of published works (0 when unknown upstream)
    pub paper_count: u32,

    /// ORCID identifier
    pub orcid: Option<String>,

    /// Homepage URL
    pub homepage: Option<String>,

    /// Contact email
    pub email: Option<String>,

    /// Provider that produced this record
    pub provider: String,
}

impl Author {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            affiliation: None,
            h_index: None,
            citation_count: 0,
            paper_count: 0,
            orcid: None,
            homepage: None,
            email: None,
            provider: provider.into(),
        }
    }
}

impl std::fmt::Display for Author {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.name)?;
        if let Some(ref affiliation) = self.affiliation {
            write!(f, " ({})", affiliation)?;
        }
        Ok(())
    }
}
