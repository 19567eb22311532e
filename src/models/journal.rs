//! Journal model.

use serde::{Deserialize, Serialize};

/// A journal or publication venue in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    /// Provider-scoped journal identifier
    pub id: String,

    /// Journal name
    pub name: String,

    /// Linking ISSN (or first known ISSN)
    pub issn: Option<String>,

    /// Publisher or host organization
    pub publisher: Option<String>,

    /// Impact factor, where the provider reports one
    pub impact_factor: Option<f64>,

    /// CiteScore-style metric (OpenAlex: 2-year mean citedness)
    pub cite_score: Option<f64>,

    /// Subject fields the journal is indexed under
    pub fields: Vec<String>,

    /// Provider that produced this record
    pub provider: String,
}

impl Journal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            issn: None,
            publisher: None,
            impact_factor: None,
            cite_score: None,
            fields: Vec::new(),
            provider: provider.into(),
        }
    }
}

impl std::fmt::Display for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.id, self.name)?;
        if let Some(impact_factor) = self.impact_factor {
            write!(f, " IF:{}", impact_factor)?;
        }
        Ok(())
    }
}
