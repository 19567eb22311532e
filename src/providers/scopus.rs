//! Scopus provider: Elsevier's abstract and citation database.
//!
//! Commercial API; every request carries an `X-ELS-APIKey` header. Search
//! is expressed in the Scopus query language (`TITLE-ABS-KEY`, `AU-ID`,
//! `PUBYEAR`, `REF`), and year filters translate into `PUBYEAR` clauses
//! evaluated upstream.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::error::{GatewayError, Lookup};
use crate::models::{Author, CitationDirection, CitationRelations, Paper, SearchOptions};
use crate::providers::{
    self, as_array_or_single, count_or_unknown, count_or_zero, get_json, lookup_on_404,
    string_field, year_from_date, Provider,
};

const DEFAULT_BASE_URL: &str = "https://api.elsevier.com/content";
const PROVIDER_ID: &str = "scopus";
const MAX_PAGE_SIZE: usize = 25;

/// Scopus client and normalizers.
#[derive(Debug, Clone)]
pub struct ScopusProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ScopusProvider {
    /// Build from provider settings. Fails without an API key; the key is
    /// checked here so a misconfiguration surfaces at startup rather than
    /// on the first request.
    pub fn new(settings: &ProviderSettings) -> Result<Self, GatewayError> {
        let api_key = settings.api_key.clone().ok_or_else(|| {
            GatewayError::Configuration(
                "scopus requires an API key (SCOPUS_API_KEY)".to_string(),
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

    /// Run a Scopus-syntax search query and normalize one page of entries.
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Paper>, GatewayError> {
        let count = options.page_size.min(MAX_PAGE_SIZE);
        let start = (options.page - 1) * count;
        let path = format!(
            "/search/scopus?query={}&count={}&start={}&view=COMPLETE",
            urlencoding::encode(query),
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
            // A page past the end comes back as one entry holding an error
            if entry.get("error").is_some() {
                continue;
            }
            papers.push(normalize_search_entry(entry)?);
        }
        Ok(papers)
    }

    fn with_year_clauses(query: String, options: &SearchOptions) -> String {
        let mut query = query;
        if let Some(start) = options.start_year {
            query = format!("{} AND PUBYEAR > {}", query, start - 1);
        }
        if let Some(end) = options.end_year {
            query = format!("{} AND PUBYEAR < {}", query, end + 1);
        }
        query
    }
}

#[async_trait]
impl Provider for ScopusProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn max_page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    async fn get_paper(&self, id: &str) -> Result<Lookup<Paper>, GatewayError> {
        // EIDs carry the 2-s2.0- prefix; anything else is treated as a DOI
        let path = if id.starts_with("2-s2.0-") {
            format!("/abstract/eid/{}", urlencoding::encode(id))
        } else {
            format!("/abstract/doi/{}", urlencoding::encode(id))
        };

        match lookup_on_404(self.fetch(&path).await)? {
            Lookup::Found(raw) => Ok(Lookup::Found(normalize_abstract(&raw)?)),
            Lookup::NotFound => Ok(Lookup::NotFound),
            Lookup::Unsupported => Ok(Lookup::Unsupported),
        }
    }

    async fn search_papers(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Paper>, GatewayError> {
        let query = Self::with_year_clauses(
            format!("TITLE-ABS-KEY(\"{}\")", keyword),
            options,
        );
        self.search(&query, options).await
    }

    async fn get_author(&self, id: &str) -> Result<Lookup<Author>, GatewayError> {
        let path = format!(
            "/author/author_id/{}?view=ENHANCED",
            urlencoding::encode(id)
        );
        match lookup_on_404(self.fetch(&path).await)? {
            Lookup::Found(raw) => Ok(Lookup::Found(normalize_author(&raw, id)?)),
            Lookup::NotFound => Ok(Lookup::NotFound),
            Lookup::Unsupported => Ok(Lookup::Unsupported),
        }
    }

    async fn get_author_papers(
        &self,
        author_id: &str,
        options: &SearchOptions,
    ) -> Result<Lookup<Vec<Paper>>, GatewayError> {
        let query =
            Self::with_year_clauses(format!("AU-ID({})", author_id), options);
        Ok(Lookup::Found(self.search(&query, options).await?))
    }

    async fn get_citations(
        &self,
        paper_id: &str,
        direction: CitationDirection,
    ) -> Result<Lookup<CitationRelations>, GatewayError> {
        let paper = match self.get_paper(paper_id).await? {
            Lookup::Found(paper) => paper,
            Lookup::NotFound => return Ok(Lookup::NotFound),
            Lookup::Unsupported => return Ok(Lookup::Unsupported),
        };

        // References need a separate entitlement most keys lack, so only
        // the citing side is populated
        let mut relations = CitationRelations::empty(&paper.id);
        if direction.wants_cited_by() {
            let eid = paper.id.clone();
            let options = SearchOptions::default().page_size(MAX_PAGE_SIZE);
            relations.cited_by = self.search(&format!("REF({})", eid), &options).await?;
        }
        Ok(Lookup::Found(relations))
    }
}

// ===== Normalizers =====

/// Strip the `SCOPUS_ID:` prefix Scopus puts on `dc:identifier`.
fn scopus_id(raw: &str) -> String {
    raw.strip_prefix("SCOPUS_ID:").unwrap_or(raw).to_string()
}

/// Map one `/search/scopus` entry into a canonical [`Paper`].
pub(crate) fn normalize_search_entry(entry: &Value) -> Result<Paper, GatewayError> {
    let id = string_field(entry, "eid")
        .or_else(|| string_field(entry, "dc:identifier").map(|id| scopus_id(&id)))
        .ok_or_else(|| {
            GatewayError::MalformedPayload("search entry missing eid".to_string())
        })?;
    let title = string_field(entry, "dc:title")
        .ok_or_else(|| GatewayError::MalformedPayload(format!("entry {} missing title", id)))?;

    let mut paper = Paper::new(id, title, PROVIDER_ID);

    if let Some(authors) = entry.get("author") {
        for author in as_array_or_single(authors) {
            if let Some(name) = string_field(author, "authname") {
                paper.authors.push(name);
            }
            if let Some(auid) = string_field(author, "authid") {
                paper.author_ids.push(auid);
            }
        }
    }
    if paper.authors.is_empty() {
        if let Some(creator) = string_field(entry, "dc:creator") {
            paper.authors.push(creator);
        }
    }

    paper.publish_date = string_field(entry, "prism:coverDate");
    paper.year = paper
        .publish_date
        .as_deref()
        .and_then(year_from_date);
    paper.venue = string_field(entry, "prism:publicationName");
    paper.doi = string_field(entry, "prism:doi");
    paper.citation_count = count_or_zero(entry.get("citedby-count"));
    paper.volume = string_field(entry, "prism:volume");
    paper.issue = string_field(entry, "prism:issueIdentifier");
    paper.pages = string_field(entry, "prism:pageRange");
    paper.abstract_text = string_field(entry, "dc:description");

    if let Some(keywords) = string_field(entry, "authkeywords") {
        paper.keywords = keywords
            .split('|')
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
    }

    if let Some(link) = entry.get("link").map(as_array_or_single) {
        paper.url = link
            .iter()
            .find(|l| string_field(l, "@ref").as_deref() == Some("scopus"))
            .and_then(|l| string_field(l, "@href"));
    }

    Ok(paper)
}

/// Map an `/abstract` retrieval response into a canonical [`Paper`].
pub(crate) fn normalize_abstract(data: &Value) -> Result<Paper, GatewayError> {
    let response = data
        .get("abstracts-retrieval-response")
        .ok_or_else(|| {
            GatewayError::MalformedPayload("missing abstracts-retrieval-response".to_string())
        })?;
    let coredata = response.get("coredata").ok_or_else(|| {
        GatewayError::MalformedPayload("abstract response missing coredata".to_string())
    })?;

    let id = string_field(coredata, "eid")
        .or_else(|| string_field(coredata, "dc:identifier").map(|id| scopus_id(&id)))
        .ok_or_else(|| {
            GatewayError::MalformedPayload("abstract missing eid".to_string())
        })?;
    let title = string_field(coredata, "dc:title")
        .ok_or_else(|| GatewayError::MalformedPayload(format!("abstract {} missing title", id)))?;

    let mut paper = Paper::new(id, title, PROVIDER_ID);

    if let Some(authors) = response.pointer("/authors/author") {
        for author in as_array_or_single(authors) {
            if let Some(name) = string_field(author, "ce:indexed-name") {
                paper.authors.push(name);
            }
            if let Some(auid) = string_field(author, "@auid") {
                paper.author_ids.push(auid);
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

    if let Some(keywords) = response.pointer("/authkeywords/author-keyword") {
        paper.keywords = as_array_or_single(keywords)
            .iter()
            .filter_map(|k| string_field(k, "$"))
            .collect();
    }

    Ok(paper)
}

/// Map an `/author/author_id` response into a canonical [`Author`].
pub(crate) fn normalize_author(data: &Value, requested_id: &str) -> Result<Author, GatewayError> {
    let response = data
        .pointer("/author-retrieval-response")
        .map(as_array_or_single)
        .and_then(|list| list.first().copied().cloned())
        .ok_or_else(|| {
            GatewayError::MalformedPayload("missing author-retrieval-response".to_string())
        })?;
    let null = Value::Null;
    let coredata = response.get("coredata").unwrap_or(&null);

    let id = string_field(coredata, "dc:identifier")
        .map(|id| id.strip_prefix("AUTHOR_ID:").unwrap_or(&id).to_string())
        .unwrap_or_else(|| requested_id.to_string());

    let name = response
        .pointer("/author-profile/preferred-name")
        .map(|preferred| {
            let given = string_field(preferred, "given-name").unwrap_or_default();
            let surname = string_field(preferred, "surname").unwrap_or_default();
            format!("{} {}", given, surname).trim().to_string()
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_default();

    let mut author = Author::new(id, name, PROVIDER_ID);
    author.affiliation = response
        .pointer("/author-profile/affiliation-current/affiliation/ip-doc/afdispname")
        .and_then(Value::as_str)
        .map(str::to_string);
    author.h_index = count_or_unknown(response.get("h-index"));
    author.citation_count = count_or_zero(coredata.get("citation-count"));
    author.paper_count = count_or_zero(coredata.get("document-count"));
    author.orcid = string_field(coredata, "orcid");
    Ok(author)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_search_entry() {
        let entry = json!({
            "dc:identifier": "SCOPUS_ID:85055555555",
            "eid": "2-s2.0-85055555555",
            "dc:title": "Deep Residual Learning",
            "prism:coverDate": "2016-06-27",
            "prism:publicationName": "CVPR",
            "prism:doi": "10.1109/CVPR.2016.90",
            "citedby-count": "180000",
            "prism:volume": "1",
            "prism:pageRange": "770-778",
            "authkeywords": "residual networks | image recognition",
            "author": [
                {"authname": "He K.", "authid": "56273523500"},
                {"authname": "Zhang X.", "authid": "56139687800"}
            ],
            "link": [
                {"@ref": "self", "@href": "https://api.elsevier.com/..."},
                {"@ref": "scopus", "@href": "https://www.scopus.com/record/85055555555"}
            ]
        });

        let paper = normalize_search_entry(&entry).unwrap();
        assert_eq!(paper.id, "2-s2.0-85055555555");
        assert_eq!(paper.year, Some(2016));
        assert_eq!(paper.venue.as_deref(), Some("CVPR"));
        // Stringly-typed count parses as a number
        assert_eq!(paper.citation_count, 180000);
        assert_eq!(paper.authors.len(), 2);
        assert_eq!(paper.author_ids[0], "56273523500");
        assert_eq!(paper.keywords, vec!["residual networks", "image recognition"]);
        assert_eq!(
            paper.url.as_deref(),
            Some("https://www.scopus.com/record/85055555555")
        );
        assert_eq!(paper.provider, "scopus");
    }

    #[test]
    fn test_single_author_object_is_accepted() {
        let entry = json!({
            "eid": "2-s2.0-1",
            "dc:title": "Solo work",
            "author": {"authname": "Only A.", "authid": "1"}
        });
        let paper = normalize_search_entry(&entry).unwrap();
        assert_eq!(paper.authors, vec!["Only A."]);
    }

    #[test]
    fn test_normalize_abstract() {
        let data = json!({
            "abstracts-retrieval-response": {
                "coredata": {
                    "eid": "2-s2.0-99",
                    "dc:title": "An abstract",
                    "prism:coverDate": "2021-01-15",
                    "citedby-count": 12,
                    "dc:description": "Full abstract text."
                },
                "authors": {
                    "author": [{"ce:indexed-name": "Doe J.", "@auid": "123"}]
                },
                "authkeywords": {
                    "author-keyword": [{"$": "topic one"}, {"$": "topic two"}]
                }
            }
        });

        let paper = normalize_abstract(&data).unwrap();
        assert_eq!(paper.id, "2-s2.0-99");
        assert_eq!(paper.year, Some(2021));
        assert_eq!(paper.citation_count, 12);
        assert_eq!(paper.abstract_text.as_deref(), Some("Full abstract text."));
        assert_eq!(paper.keywords, vec!["topic one", "topic two"]);
        assert_eq!(paper.author_ids, vec!["123"]);
    }

    #[test]
    fn test_normalize_author_profile() {
        let data = json!({
            "author-retrieval-response": [{
                "coredata": {
                    "dc:identifier": "AUTHOR_ID:7004212771",
                    "citation-count": "94000",
                    "document-count": "330",
                    "orcid": "0000-0001-0000-0000"
                },
                "h-index": "87",
                "author-profile": {
                    "preferred-name": {"given-name": "Geoffrey", "surname": "Hinton"},
                    "affiliation-current": {
                        "affiliation": {"ip-doc": {"afdispname": "University of Toronto"}}
                    }
                }
            }]
        });

        let author = normalize_author(&data, "7004212771").unwrap();
        assert_eq!(author.id, "7004212771");
        assert_eq!(author.name, "Geoffrey Hinton");
        assert_eq!(author.h_index, Some(87));
        assert_eq!(author.citation_count, 94000);
        assert_eq!(author.paper_count, 330);
        assert_eq!(author.affiliation.as_deref(), Some("University of Toronto"));
    }

    #[test]
    fn test_year_clauses() {
        let options = SearchOptions::default().years(Some(2020), Some(2023));
        let query = ScopusProvider::with_year_clauses("AU-ID(1)".to_string(), &options);
        assert_eq!(query, "AU-ID(1) AND PUBYEAR > 2019 AND PUBYEAR < 2024");

        let open_ended = SearchOptions::default().years(Some(2020), None);
        let query = ScopusProvider::with_year_clauses("X".to_string(), &open_ended);
        assert_eq!(query, "X AND PUBYEAR > 2019");
    }
}
