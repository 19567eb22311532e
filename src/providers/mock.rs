//! Scriptable in-memory provider for tests.
//!
//! Counts every dispatch so tests can assert how many calls actually
//! reached the upstream, and pops scripted failures before answering so
//! retry behavior can be exercised without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{GatewayError, Lookup};
use crate::models::{Author, CitationDirection, CitationRelations, Journal, Paper, SearchOptions};
use crate::providers::Provider;

/// Provider stub answering from in-memory fixtures.
#[derive(Debug)]
pub struct MockProvider {
    id: String,
    max_page_size: usize,
    dispatches: AtomicUsize,
    failures: Mutex<VecDeque<GatewayError>>,
    papers: Mutex<HashMap<String, Paper>>,
    authors: Mutex<HashMap<String, Author>>,
    journals: Mutex<HashMap<String, Journal>>,
}

impl MockProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            max_page_size: 100,
            dispatches: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            papers: Mutex::new(HashMap::new()),
            authors: Mutex::new(HashMap::new()),
            journals: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Seed a paper fixture, keyed by its id.
    pub fn add_paper(&self, paper: Paper) {
        self.papers.lock().unwrap().insert(paper.id.clone(), paper);
    }

    pub fn add_author(&self, author: Author) {
        self.authors
            .lock()
            .unwrap()
            .insert(author.id.clone(), author);
    }

    pub fn add_journal(&self, journal: Journal) {
        self.journals
            .lock()
            .unwrap()
            .insert(journal.id.clone(), journal);
    }

    /// Queue an error to be returned (once) before fixtures answer again.
    pub fn push_failure(&self, error: GatewayError) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// How many calls reached this provider, across all operations.
    pub fn dispatch_count(&self) -> usize {
        self.dispatches.load(Ordering::SeqCst)
    }

    fn dispatch(&self) -> Result<(), GatewayError> {
        self.dispatches.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(())
    }

    fn sorted_papers(&self) -> Vec<Paper> {
        let mut papers: Vec<Paper> = self.papers.lock().unwrap().values().cloned().collect();
        papers.sort_by(|a, b| a.id.cmp(&b.id));
        papers
    }

    fn page(&self, papers: Vec<Paper>, options: &SearchOptions) -> Vec<Paper> {
        papers
            .into_iter()
            .filter(|p| p.in_year_range(options.start_year, options.end_year))
            .skip((options.page - 1) * options.page_size)
            .take(options.page_size)
            .collect()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn max_page_size(&self) -> usize {
        self.max_page_size
    }

    async fn get_paper(&self, id: &str) -> Result<Lookup<Paper>, GatewayError> {
        self.dispatch()?;
        Ok(match self.papers.lock().unwrap().get(id) {
            Some(paper) => Lookup::Found(paper.clone()),
            None => Lookup::NotFound,
        })
    }

    async fn search_papers(
        &self,
        keyword: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Paper>, GatewayError> {
        self.dispatch()?;
        let matching = self
            .sorted_papers()
            .into_iter()
            .filter(|p| {
                p.title
                    .to_lowercase()
                    .contains(&keyword.to_lowercase())
            })
            .collect();
        Ok(self.page(matching, options))
    }

    async fn get_author(&self, id: &str) -> Result<Lookup<Author>, GatewayError> {
        self.dispatch()?;
        Ok(match self.authors.lock().unwrap().get(id) {
            Some(author) => Lookup::Found(author.clone()),
            None => Lookup::NotFound,
        })
    }

    async fn get_author_papers(
        &self,
        author_id: &str,
        options: &SearchOptions,
    ) -> Result<Lookup<Vec<Paper>>, GatewayError> {
        self.dispatch()?;
        let matching = self
            .sorted_papers()
            .into_iter()
            .filter(|p| p.author_ids.iter().any(|a| a == author_id))
            .collect();
        Ok(Lookup::Found(self.page(matching, options)))
    }

    async fn get_citations(
        &self,
        paper_id: &str,
        direction: CitationDirection,
    ) -> Result<Lookup<CitationRelations>, GatewayError> {
        self.dispatch()?;
        if !self.papers.lock().unwrap().contains_key(paper_id) {
            return Ok(Lookup::NotFound);
        }

        let mut relations = CitationRelations::empty(paper_id);
        if direction.wants_cited_by() {
            relations.cited_by = self
                .sorted_papers()
                .into_iter()
                .filter(|p| p.id != paper_id)
                .collect();
        }
        Ok(Lookup::Found(relations))
    }

    async fn get_journal(&self, id: &str) -> Result<Lookup<Journal>, GatewayError> {
        self.dispatch()?;
        Ok(match self.journals.lock().unwrap().get(id) {
            Some(journal) => Lookup::Found(journal.clone()),
            None => Lookup::Unsupported,
        })
    }
}

/// Build `count` sequential paper fixtures titled after `keyword`.
pub fn sample_papers(keyword: &str, count: usize, provider: &str) -> Vec<Paper> {
    (1..=count)
        .map(|i| {
            let mut paper = Paper::new(
                format!("P{:04}", i),
                format!("{} study {}", keyword, i),
                provider,
            );
            paper.year = Some(2015 + (i % 10) as i32);
            paper.author_ids = vec!["A1".to_string()];
            paper
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_failure_then_fixture() {
        let provider = MockProvider::new("mock");
        let mut paper = Paper::new("P1", "Graphs", "mock");
        paper.year = Some(2020);
        provider.add_paper(paper);
        provider.push_failure(GatewayError::Timeout);

        let first = provider.get_paper("P1").await;
        assert!(matches!(first, Err(GatewayError::Timeout)));

        let second = provider.get_paper("P1").await.unwrap();
        assert!(second.is_found());
        assert_eq!(provider.dispatch_count(), 2);
    }

    #[tokio::test]
    async fn test_search_pages_and_year_filter() {
        let provider = MockProvider::new("mock");
        for paper in sample_papers("ranking", 30, "mock") {
            provider.add_paper(paper);
        }

        let page = provider
            .search_papers("ranking", &SearchOptions::default().page_size(10))
            .await
            .unwrap();
        assert_eq!(page.len(), 10);

        let filtered = provider
            .search_papers(
                "ranking",
                &SearchOptions::default().years(Some(2024), Some(2024)),
            )
            .await
            .unwrap();
        assert!(filtered.iter().all(|p| p.year == Some(2024)));
    }
}
