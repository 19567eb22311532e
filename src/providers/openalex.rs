//! OpenAlex provider: open bibliographic graph API, no authentication.
//!
//! Uses the OpenAlex REST API (works/authors/sources endpoints). Setting
//! `OPENALEX_EMAIL` joins the polite pool for better service.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::ProviderSettings;
use crate::error::{GatewayError, Lookup};
use crate::models::{Author, CitationDirection, CitationRelations, Journal, Paper, SearchOptions};
use crate::providers::{
    self, count_or_unknown, count_or_zero, get_json, lookup_on_404, string_field, trailing_id,
    year_from_date, Provider,
};

const DEFAULT_BASE_URL: &str = "https://api.openalex.org";
const PROVIDER_ID: &str = "openalex";
const MAX_PAGE_SIZE: usize = 200;

/// OpenAlex client and normalizers.
#[derive(Debug, Clone)]
pub struct OpenAlexProvider {
    client: Client,
    base_url: String,
    email: Option<String>,
}

impl OpenAlexProvider {
    /// Build from provider settings. OpenAlex needs no credentials.
    pub fn new(settings: &ProviderSettings) -> Result<Self, GatewayError> {
        Ok(Self {
            client: providers::build_http_client(settings.timeout())?,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            email: std::env::var("OPENALEX_EMAIL").ok(),
        })
    }

    fn url(&self, path_and_query: &str) -> String {
        let mut url = format!("{}{}", self.base_url, path_and_query);
        if let Some(ref email) = self.email {
            let sep = if url.contains('?') { '&' } else { '?' };
            url = format!("{}{}mailto={}", url, sep, urlencoding::encode(email));
        }
        url
    }

    async fn fetch(&self, path_and_query: &str) -> Result<Value, GatewayError> {
        get_json(&self.client, &self.url(path_and_query), &[]).await
    }

    fn year_filter(options: &SearchOptions) -> Option<String> {
        match (options.start_year, options.end_year) {
            (Some(start), Some(end)) => Some(format!("publication_year:{}-{}", start, end)),
            (Some(start), None) => Some(format!("publication_year:>{}", start - 1)),
            (None, Some(end)) => Some(format!("publication_year:<{}", end + 1)),
            (None, None) => None,
        }
    }

    fn collect_page(&self, data: &Value) -> Result<Vec<Paper>, GatewayError> {
        data.get("results")
            .and_then(Value::as_array)
            .map(|results| results.iter().map(normalize_work).collect())
            .unwrap_or_else(|| {
                Err(GatewayError::MalformedPayload(
                    "works response missing results".to_string(),
                ))
            })
    }
}

#[async_trait]
impl Provider for OpenAlexProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn max_page_size(&self) -> usize {
        MAX_PAGE_SIZE
    }

    async fn get_paper(&self, id: &str) -> Result<Lookup<Paper>, GatewayError> {
        let id = trailing_id(id);
        let data = lookup_on_404(self.fetch(&format!("/works/{}", urlencoding::encode(id))).await)?;
        match data {
            Lookup::Found(raw) => Ok(Lookup::Found(normalize_work(&raw)?)),
            Lookup::NotFound => Ok(Lookup::NotFound),
            Lookup::Unsupported => Ok(Lookup::Unsupported),
        }
    }

    async fn search_papers(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Paper>, GatewayError> {
        let mut query = format!(
            "/works?search={}&per-page={}&page={}",
            urlencoding::encode(keyword),
            options.page_size,
            options.page
        );
        if let Some(filter) = Self::year_filter(options) {
            query = format!("{}&filter={}", query, urlencoding::encode(&filter));
        }

        let data = self.fetch(&query).await?;
        self.collect_page(&data)
    }

    async fn get_author(&self, id: &str) -> Result<Lookup<Author>, GatewayError> {
        let id = trailing_id(id);
        let data =
            lookup_on_404(self.fetch(&format!("/authors/{}", urlencoding::encode(id))).await)?;
        match data {
            Lookup::Found(raw) => Ok(Lookup::Found(normalize_author(&raw)?)),
            Lookup::NotFound => Ok(Lookup::NotFound),
            Lookup::Unsupported => Ok(Lookup::Unsupported),
        }
    }

    async fn get_author_papers(
        &self,
        author_id: &str,
        options: &SearchOptions,
    ) -> Result<Lookup<Vec<Paper>>, GatewayError> {
        let author_id = trailing_id(author_id);
        let mut filter = format!("author.id:{}", author_id);
        if let Some(year_filter) = Self::year_filter(options) {
            filter = format!("{},{}", filter, year_filter);
        }

        let query = format!(
            "/works?filter={}&per-page={}&page={}",
            urlencoding::encode(&filter),
            options.page_size,
            options.page
        );
        let data = self.fetch(&query).await?;
        Ok(Lookup::Found(self.collect_page(&data)?))
    }

    async fn get_citations(
        &self,
        paper_id: &str,
        direction: CitationDirection,
    ) -> Result<Lookup<CitationRelations>, GatewayError> {
        let paper_id = trailing_id(paper_id);
        let work =
            lookup_on_404(self.fetch(&format!("/works/{}", urlencoding::encode(paper_id))).await)?;
        let raw = match work {
            Lookup::Found(raw) => raw,
            Lookup::NotFound => return Ok(Lookup::NotFound),
            Lookup::Unsupported => return Ok(Lookup::Unsupported),
        };

        let mut relations = CitationRelations::empty(paper_id);
        if direction.wants_references() {
            relations.references = referenced_ids(&raw);
        }
        if direction.wants_cited_by() {
            let query = format!(
                "/works?filter={}&per-page={}",
                urlencoding::encode(&format!("cites:{}", paper_id)),
                MAX_PAGE_SIZE
            );
            let data = self.fetch(&query).await?;
            relations.cited_by = self.collect_page(&data)?;
        }
        Ok(Lookup::Found(relations))
    }

    async fn get_journal(&self, id: &str) -> Result<Lookup<Journal>, GatewayError> {
        let id = trailing_id(id);
        let data =
            lookup_on_404(self.fetch(&format!("/sources/{}", urlencoding::encode(id))).await)?;
        match data {
            Lookup::Found(raw) => Ok(Lookup::Found(normalize_journal(&raw)?)),
            Lookup::NotFound => Ok(Lookup::NotFound),
            Lookup::Unsupported => Ok(Lookup::Unsupported),
        }
    }
}

// ===== Normalizers =====

/// Map an OpenAlex work into a canonical [`Paper`].
pub(crate) fn normalize_work(data: &Value) -> Result<Paper, GatewayError> {
    let id = string_field(data, "id")
        .map(|id| trailing_id(&id).to_string())
        .ok_or_else(|| GatewayError::MalformedPayload("work missing id".to_string()))?;
    let title = string_field(data, "display_name")
        .or_else(|| string_field(data, "title"))
        .ok_or_else(|| GatewayError::MalformedPayload(format!("work {} missing title", id)))?;

    let mut paper = Paper::new(id, title, PROVIDER_ID);

    if let Some(authorships) = data.get("authorships").and_then(Value::as_array) {
        for authorship in authorships {
            let Some(author) = authorship.get("author") else {
                continue;
            };
            if let Some(name) = string_field(author, "display_name") {
                paper.authors.push(name);
            }
            if let Some(author_id) = string_field(author, "id") {
                paper.author_ids.push(trailing_id(&author_id).to_string());
            }
        }
    }

    paper.year = data
        .get("publication_year")
        .and_then(Value::as_i64)
        .map(|y| y as i32)
        .or_else(|| {
            string_field(data, "publication_date").and_then(|date| year_from_date(&date))
        });
    paper.publish_date = string_field(data, "publication_date");

    // primary_location is the current field; host_venue covers older dumps
    paper.venue = data
        .pointer("/primary_location/source/display_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            data.pointer("/host_venue/display_name")
                .and_then(Value::as_str)
                .map(str::to_string)
        });

    // OpenAlex reports DOIs as resolver URLs; the canonical field carries
    // the bare DOI, as the Elsevier providers do
    paper.doi = string_field(data, "doi")
        .map(|doi| doi.trim_start_matches("https://doi.org/").to_string());
    paper.url = string_field(data, "id");
    paper.citation_count = count_or_zero(data.get("cited_by_count"));
    paper.reference_count = data
        .get("referenced_works")
        .and_then(Value::as_array)
        .map(|refs| refs.len() as u32)
        .unwrap_or(0);
    paper.language = string_field(data, "language");

    if let Some(concepts) = data.get("concepts").and_then(Value::as_array) {
        paper.keywords = concepts
            .iter()
            .filter_map(|concept| string_field(concept, "display_name"))
            .collect();
    }

    paper.abstract_text = reconstruct_abstract(data);

    Ok(paper)
}

/// Identifiers of works a paper references.
pub(crate) fn referenced_ids(data: &Value) -> Vec<String> {
    data.get("referenced_works")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(Value::as_str)
                .map(|r| trailing_id(r).to_string())
                .collect()
        })
        .unwrap_or_default()
}

/// OpenAlex stores abstracts as an inverted index to save space; rebuild
/// the text from word positions.
pub(crate) fn reconstruct_abstract(data: &Value) -> Option<String> {
    let inverted = match data.get("abstract_inverted_index") {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => return string_field(data, "abstract"),
    };

    let max_position = inverted
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(Value::as_u64)
        .max()? as usize;

    let mut words = vec![""; max_position + 1];
    for (word, positions) in inverted {
        if let Some(positions) = positions.as_array() {
            for position in positions.iter().filter_map(Value::as_u64) {
                if let Some(slot) = words.get_mut(position as usize) {
                    *slot = word.as_str();
                }
            }
        }
    }
    Some(words.join(" "))
}

/// Map an OpenAlex author into a canonical [`Author`].
pub(crate) fn normalize_author(data: &Value) -> Result<Author, GatewayError> {
    let id = string_field(data, "id")
        .map(|id| trailing_id(&id).to_string())
        .ok_or_else(|| GatewayError::MalformedPayload("author missing id".to_string()))?;
    let name = string_field(data, "display_name").unwrap_or_default();

    let mut author = Author::new(id, name, PROVIDER_ID);
    author.affiliation = data
        .pointer("/last_known_institution/display_name")
        .and_then(Value::as_str)
        .map(str::to_string);
    author.h_index = count_or_unknown(data.pointer("/summary_stats/h_index"));
    author.citation_count = count_or_zero(data.get("cited_by_count"));
    author.paper_count = count_or_zero(data.get("works_count"));
    author.orcid = string_field(data, "orcid");
    Ok(author)
}

/// Map an OpenAlex source into a canonical [`Journal`].
pub(crate) fn normalize_journal(data: &Value) -> Result<Journal, GatewayError> {
    let id = string_field(data, "id")
        .map(|id| trailing_id(&id).to_string())
        .ok_or_else(|| GatewayError::MalformedPayload("source missing id".to_string()))?;
    let name = string_field(data, "display_name").unwrap_or_default();

    let mut journal = Journal::new(id, name, PROVIDER_ID);
    journal.issn = string_field(data, "issn_l").or_else(|| {
        data.get("issn")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    journal.publisher = string_field(data, "host_organization_name");
    // OpenAlex has no impact factor; 2yr mean citedness is its CiteScore analog
    journal.cite_score = data
        .pointer("/summary_stats/2yr_mean_citedness")
        .and_then(Value::as_f64);
    if let Some(concepts) = data.get("x_concepts").and_then(Value::as_array) {
        journal.fields = concepts
            .iter()
            .take(5)
            .filter_map(|concept| string_field(concept, "display_name"))
            .collect();
    }
    Ok(journal)
}
