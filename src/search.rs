//! Búsqueda de documentos jurídicos.
//!
//! No hay recuperación real: tras una espera fija se piden todos los
//! documentos al backend y se publican como resultado. Cada búsqueda recibe
//! un número de generación y solo la más reciente puede publicar, así una
//! respuesta lenta nunca pisa a otra posterior. La página que devuelve
//! `search` se corta en el mismo momento en que se publica.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    backend::{BackendError, CaseBackend},
    models::{SearchMode, SearchResult},
};

pub const PAGE_SIZE: usize = 10;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("La consulta está vacía")]
    EmptyQuery,

    /// Otra búsqueda empezó después que esta; su resultado se descarta.
    #[error("Búsqueda '{0}' reemplazada por otra más reciente")]
    Superseded(String),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPage {
    pub query: String,
    pub mode: SearchMode,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Default)]
struct SearchState {
    generation: u64,
    query: String,
    mode: SearchMode,
    results: Vec<SearchResult>,
}

#[derive(Clone)]
pub struct SearchService {
    backend: Arc<dyn CaseBackend>,
    delay: Duration,
    state: Arc<Mutex<SearchState>>,
}

impl SearchService {
    pub fn new(backend: Arc<dyn CaseBackend>, delay: Duration) -> Self {
        Self {
            backend,
            delay,
            state: Arc::new(Mutex::new(SearchState::default())),
        }
    }

    /// Busca y devuelve la página pedida de sus propios resultados.
    pub async fn search(
        &self,
        query: &str,
        mode: SearchMode,
        page: usize,
    ) -> Result<ResultsPage, SearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(SearchError::EmptyQuery);
        }

        let generation = {
            let mut state = self.state.lock().unwrap();
            state.generation += 1;
            state.generation
        };

        tokio::time::sleep(self.delay).await;
        let results = self.backend.list_documents().await?;

        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            warn!(generation, "Búsqueda superada por otra más reciente: {query}");
            return Err(SearchError::Superseded(query.to_string()));
        }
        info!(?mode, "{} documentos para '{query}'", results.len());
        state.query = query.to_string();
        state.mode = mode;
        state.results = results;
        Ok(slice(&state, page))
    }

    /// Página (empezando en 1) de los últimos resultados publicados.
    pub fn page(&self, page: usize) -> ResultsPage {
        slice(&self.state.lock().unwrap(), page)
    }
}

fn slice(state: &SearchState, page: usize) -> ResultsPage {
    let total = state.results.len();
    let total_pages = total.div_ceil(PAGE_SIZE).max(1);
    let page = page.clamp(1, total_pages);
    let results = state
        .results
        .iter()
        .skip((page - 1) * PAGE_SIZE)
        .take(PAGE_SIZE)
        .cloned()
        .collect();

    ResultsPage {
        query: state.query.clone(),
        mode: state.mode,
        page,
        page_size: PAGE_SIZE,
        total,
        total_pages,
        results,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::FakeBackend;
    use chrono::Utc;

    fn doc(i: usize) -> SearchResult {
        SearchResult {
            id: i.to_string(),
            title: format!("Document {i}"),
            snippet: "A contract requires offer, acceptance, consideration...".into(),
            source: "UCC Article 2".into(),
            last_updated: Utc::now(),
            tags: vec!["contract".into()],
            relevance_score: 0.5,
        }
    }

    fn backend_with(n: usize) -> Arc<FakeBackend> {
        let backend = Arc::new(FakeBackend::default());
        *backend.documents.lock().unwrap() = (1..=n).map(doc).collect();
        backend
    }

    #[tokio::test]
    async fn search_publishes_backend_documents() {
        let service = SearchService::new(backend_with(3), Duration::ZERO);

        let page = service.search("breach", SearchMode::Vector, 1).await.unwrap();

        assert_eq!(page.total, 3);
        assert_eq!(page.query, "breach");
        assert_eq!(page.mode, SearchMode::Vector);
    }

    #[tokio::test]
    async fn blank_query_is_rejected_without_calling_backend() {
        let backend = backend_with(1);
        let service = SearchService::new(backend.clone(), Duration::ZERO);

        let err = service.search("  ", SearchMode::Semantic, 1).await.unwrap_err();

        assert!(matches!(err, SearchError::EmptyQuery));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn backend_failure_is_surfaced_and_keeps_previous_results() {
        let backend = backend_with(2);
        let service = SearchService::new(backend.clone(), Duration::ZERO);
        service.search("first", SearchMode::Semantic, 1).await.unwrap();

        backend.set_failing(true);
        let err = service.search("second", SearchMode::Semantic, 1).await.unwrap_err();

        assert!(matches!(err, SearchError::Backend(BackendError::Unavailable)));
        assert_eq!(service.page(1).query, "first");
        assert_eq!(service.page(1).total, 2);
    }

    #[tokio::test]
    async fn older_search_cannot_overwrite_newer_one() {
        let backend = backend_with(1);
        let slow = SearchService::new(backend.clone(), Duration::from_millis(200));
        let fast = SearchService {
            delay: Duration::ZERO,
            ..slow.clone()
        };

        let slow_search =
            tokio::spawn(async move { slow.search("old", SearchMode::Semantic, 1).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        let published = fast.search("new", SearchMode::Vector, 1).await.unwrap();
        assert_eq!(published.query, "new");

        let err = slow_search.await.unwrap().unwrap_err();
        assert!(matches!(err, SearchError::Superseded(q) if q == "old"));
        assert_eq!(fast.page(1).query, "new");
        assert_eq!(fast.page(1).mode, SearchMode::Vector);
    }

    #[tokio::test]
    async fn pages_slice_results() {
        let service = SearchService::new(backend_with(23), Duration::ZERO);
        let second = service.search("contract", SearchMode::Semantic, 2).await.unwrap();
        assert_eq!(second.results[0].id, "11");

        let third = service.page(3);
        assert_eq!(third.total_pages, 3);
        assert_eq!(third.results.len(), 3);
        assert_eq!(third.results[0].id, "21");

        let clamped = service.page(99);
        assert_eq!(clamped.page, 3);
        assert_eq!(service.page(0).page, 1);
    }

    #[test]
    fn empty_state_has_a_single_empty_page() {
        let service = SearchService::new(backend_with(0), Duration::ZERO);
        let page = service.page(1);
        assert_eq!(page.total_pages, 1);
        assert!(page.results.is_empty());
    }
}
