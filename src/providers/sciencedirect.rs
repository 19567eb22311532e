//! ScienceDirect provider: Elsevier full-text article API.
//!
//! Narrowest capability set of the three upstreams: paper retrieval and
//! keyword search only. The search endpoint cannot filter by year, so year
//! bounds are applied here after fetching, which is why a filtered page may
//! come back shorter than the requested size.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::error::{GatewayError, Lookup};
use crate::models::{Author, CitationDirection, CitationRelations, Paper, SearchOptions};
use crate::providers::{
    self, as_array_or_single, count_or_zero, get_json, lookup_on_404, string_field,
    year_from_date, Provider,
};

const DEFAULT_BASE_URL: &str = "https://api.elsevier.com/content";
const PROVIDER_ID: &str = "sciencedirect";
const MAX_PAGE_SIZE: usize = 100;

/// ScienceDirect client and normalizers.
#[derive(Debug, Clone)]
pub struct ScienceDirectProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ScienceDirectProvider {
    /// Build from provider settings. Fails without an API key.
    pub fn new(settings: &ProviderSettings) -> Result<Self, GatewayError> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            GatewayError::Configuration(
                "sciencedirect requires an API key (SCIENCEDIRECT_API_KEY)".to_string(),
            )
        })?;

        Ok(Self {
            client: providers::build_http_client(settings.timeout())?,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
        })
    }

    async fn fetch(&self, path_and_query: &str) -> Result<Value, GatewayError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        get_json(
            &self.client,
            &url,
            &[
                ("X-ELS-APIKey", self.api_key.as_str()),
                ("Accept", "application/json"),
            ],
        )
        .await
    }

    /// Article retrieval path for an id, dispatching on its shape: DOIs
    /// start with a registrant prefix, EIDs with 2-s2.0-, anything else is
    /// treated as a PII.
    fn article_path(id: &str) -> String {
        if id.starts_with("10.") {
            format!("/article/doi/{}", urlencoding::encode(id))
        } else if id.starts_with("2-s2.0-") {
            format!("/article/eid/{}", urlencoding::encode(id))
        } else {
            format!("/article/pii/{}", urlencoding::encode(id))
        }
    }
}

#[async_trait]
impl Provider for ScienceDirectProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn max_page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    async fn get_paper(&self, id: &str) -> Result<Lookup<Paper>, GatewayError> {
        match lookup_on_404(self.fetch(&Self::article_path(id)).await)? {
            Lookup::Found(raw) => Ok(Lookup::Found(normalize_article(&raw)?)),
            Lookup::NotFound => Ok(Lookup::NotFound),
            Lookup::Unsupported => Ok(Lookup::Unsupported),
        }
    }

    async fn search_papers(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Paper>, GatewayError> {
        let count = options.page_size.min(MAX_PAGE_SIZE);
        let start = (options.page - 1) * count;
        let path = format!(
            "/search/sciencedirect?query={}&count={}&start={}",
            urlencoding::encode(keyword),
            count,
            start
        );

        let data = self.fetch(&path).await?;
        let entries = data
            .pointer("/search-results/entry")
            .map(as_array_or_single)
            .unwrap_or_default();

        let mut papers = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.get("error").is_some() {
                continue;
            }
            let paper = normalize_search_entry(entry)?;
            // Upstream cannot filter by year; drop out-of-range hits here
            if paper.in_year_range(options.start_year, options.end_year) {
                papers.push(paper);
            }
        }
        Ok(papers)
    }

    async fn get_author(&self, _id: &str) -> Result<Lookup<Author>, GatewayError> {
        Ok(Lookup::Unsupported)
    }

    async fn get_author_papers(
        &self,
        _author_id: &str,
        _options: &SearchOptions,
    ) -> Result<Lookup<Vec<Paper>>, GatewayError> {
        Ok(Lookup::Unsupported)
    }

    async fn get_citations(
        &self,
        _paper_id: &str,
        _direction: CitationDirection,
    ) -> Result<Lookup<CitationRelations>, GatewayError> {
        Ok(Lookup::Unsupported)
    }
}

// ===== Normalizers =====

/// Map one `/search/sciencedirect` entry into a canonical [`Paper`].
pub(crate) fn normalize_search_entry(entry: &Value) -> Result<Paper, GatewayError> {
    let id = string_field(entry, "pii")
        .or_else(|| string_field(entry, "prism:doi"))
        .or_else(|| string_field(entry, "dc:identifier"))
        .ok_or_else(|| {
            GatewayError::MalformedPayload("search entry missing identifier".to_string())
        })?;
    let title = string_field(entry, "dc:title")
        .ok_or_else(|| GatewayError::MalformedPayload(format!("entry {} missing title", id)))?;

    let mut paper = Paper::new(id, title, PROVIDER_ID);

    if let Some(authors) = entry.get("authors").and_then(|a| a.get("author")) {
        for author in as_array_or_single(authors) {
            match author {
                Value::String(name) => paper.authors.push(name.clone()),
                other => {
                    if let Some(name) = string_field(other, "$")
                        .or_else(|| string_field(other, "name"))
                    {
                        paper.authors.push(name);
                    }
                }
            }
        }
    } else if let Some(creator) = string_field(entry, "dc:creator") {
        paper.authors.push(creator);
    }

    paper.publish_date = string_field(entry, "prism:coverDate")
        .or_else(|| string_field(entry, "load-date"));
    paper.year = paper.publish_date.as_deref().and_then(year_from_date);
    paper.venue = string_field(entry, "prism:publicationName");
    paper.doi = string_field(entry, "prism:doi");
    paper.volume = string_field(entry, "prism:volume");
    paper.pages = string_field(entry, "prism:pageRange");

    if let Some(link) = entry.get("link").map(as_array_or_single) {
        paper.url = link
            .iter()
            .find(|l| string_field(l, "@ref").as_deref() == Some("scidir"))
            .and_then(|l| string_field(l, "@href"));
    }

    Ok(paper)
}

/// Map an `/article` retrieval response into a canonical [`Paper`].
pub(crate) fn normalize_article(data: &Value) -> Result<Paper, GatewayError> {
    let coredata = data
        .pointer("/full-text-retrieval-response/coredata")
        .ok_or_else(|| {
            GatewayError::MalformedPayload(
                "missing full-text-retrieval-response coredata".to_string(),
            )
        })?;

    let id = string_field(coredata, "pii")
        .or_else(|| string_field(coredata, "prism:doi"))
        .ok_or_else(|| {
            GatewayError::MalformedPayload("article missing pii and doi".to_string())
        })?;
    let title = string_field(coredata, "dc:title")
        .ok_or_else(|| GatewayError::MalformedPayload(format!("article {} missing title", id)))?;

    let mut paper = Paper::new(id, title, PROVIDER_ID);

    if let Some(creators) = coredata.get("dc:creator") {
        for creator in as_array_or_single(creators) {
            match creator {
                Value::String(name) => paper.authors.push(name.clone()),
                other => {
                    if let Some(name) = string_field(other, "$") {
                        paper.authors.push(name);
                    }
                }
            }
        }
    }

    paper.publish_date = string_field(coredata, "prism:coverDate");
    paper.year = paper.publish_date.as_deref().and_then(year_from_date);
    paper.venue = string_field(coredata, "prism:publicationName");
    paper.doi = string_field(coredata, "prism:doi");
    paper.citation_count = count_or_zero(coredata.get("citedby-count"));
    paper.volume = string_field(coredata, "prism:volume");
    paper.issue = string_field(coredata, "prism:issueIdentifier");
    paper.pages = string_field(coredata, "prism:pageRange");
    paper.abstract_text = string_field(coredata, "dc:description");
    paper.url = string_field(coredata, "prism:url");

    if let Some(keywords) = coredata.get("dcterms:subject") {
        paper.keywords = as_array_or_single(keywords)
            .iter()
            .filter_map(|k| string_field(k, "$"))
            .collect();
    }

    Ok(paper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_article_path_dispatch() {
        assert!(ScienceDirectProvider::article_path("10.1016/j.cell.2023.01.001")
            .starts_with("/article/doi/"));
        assert!(ScienceDirectProvider::article_path("2-s2.0-85055555555")
            .starts_with("/article/eid/"));
        assert!(ScienceDirectProvider::article_path("S0092867423000011")
            .starts_with("/article/pii/"));
    }

    #[test]
    fn test_normalize_search_entry() {
        let entry = json!({
            "pii": "S0092867423000011",
            "dc:title": "Cellular reprogramming",
            "dc:creator": "Smith J.",
            "prism:coverDate": "2023-02-02",
            "prism:publicationName": "Cell",
            "prism:doi": "10.1016/j.cell.2023.01.001",
            "link": [
                {"@ref": "scidir", "@href": "https://www.sciencedirect.com/science/article/pii/S0092867423000011"}
            ]
        });

        let paper = normalize_search_entry(&entry).unwrap();
        assert_eq!(paper.id, "S0092867423000011");
        assert_eq!(paper.year, Some(2023));
        assert_eq!(paper.authors, vec!["Smith J."]);
        assert_eq!(paper.venue.as_deref(), Some("Cell"));
        assert!(paper.url.as_deref().unwrap().contains("sciencedirect.com"));
        assert_eq!(paper.provider, "sciencedirect");
    }

    #[test]
    fn test_normalize_article() {
        let data = json!({
            "full-text-retrieval-response": {
                "coredata": {
                    "pii": "S1",
                    "dc:title": "An article",
                    "prism:coverDate": "2020-07-01",
                    "citedby-count": "45",
                    "dc:description": "Abstract body.",
                    "dc:creator": [{"$": "Doe J."}, {"$": "Roe R."}],
                    "dcterms:subject": [{"$": "genomics"}]
                }
            }
        });

        let paper = normalize_article(&data).unwrap();
        assert_eq!(paper.id, "S1");
        assert_eq!(paper.year, Some(2020));
        assert_eq!(paper.citation_count, 45);
        assert_eq!(paper.authors, vec!["Doe J.", "Roe R."]);
        assert_eq!(paper.keywords, vec!["genomics"]);
        assert_eq!(paper.abstract_text.as_deref(), Some("Abstract body."));
    }

    #[test]
    fn test_missing_coredata_is_malformed() {
        let data = json!({"full-text-retrieval-response": {}});
        assert!(matches!(
            normalize_article(&data),
            Err(GatewayError::MalformedPayload(_))
        ));
    }
}
