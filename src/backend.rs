//! Cliente del backend de casos y documentos.
//!
//! Endpoints consumidos:
//!   - `GET  /api/cases`
//!   - `POST /api/cases`
//!   - `PUT  /api/cases/{id}`
//!   - `GET  /api/documents`
//!
//! Todo es JSON y sin cabeceras de autenticación. Los errores se devuelven
//! tipados para que quien llama decida qué hacer con ellos.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::models::{Case, SearchResult};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend no disponible")]
    Unavailable,

    #[error("Tiempo de espera agotado")]
    Timeout,

    #[error("Error en la petición: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Error del backend {status}: {message}")]
    Api { status: u16, message: String },

    #[error("URL inválida: {0}")]
    Url(#[from] url::ParseError),
}

/// Operaciones que el portal necesita del backend.
#[async_trait]
pub trait CaseBackend: Send + Sync {
    async fn list_cases(&self) -> Result<Vec<Case>, BackendError>;
    async fn create_case(&self, case: &Case) -> Result<(), BackendError>;
    async fn update_case(&self, case: &Case) -> Result<(), BackendError>;
    async fn list_documents(&self) -> Result<Vec<SearchResult>, BackendError>;
}

/// Implementación HTTP sobre `reqwest`.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(path)?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, BackendError> {
        let response = request.send().await.map_err(classify)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let url = self.endpoint(path)?;
        let response = self.send(self.client.get(url)).await?;
        response.json::<T>().await.map_err(classify)
    }
}

fn classify(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_connect() {
        BackendError::Unavailable
    } else {
        BackendError::Request(e)
    }
}

#[async_trait]
impl CaseBackend for HttpBackend {
    async fn list_cases(&self) -> Result<Vec<Case>, BackendError> {
        self.get_json("api/cases").await
    }

    async fn create_case(&self, case: &Case) -> Result<(), BackendError> {
        let url = self.endpoint("api/cases")?;
        self.send(self.client.post(url).json(case)).await?;
        Ok(())
    }

    async fn update_case(&self, case: &Case) -> Result<(), BackendError> {
        let url = self.endpoint(&format!("api/cases/{}", case.id))?;
        self.send(self.client.put(url).json(case)).await?;
        Ok(())
    }

    async fn list_documents(&self) -> Result<Vec<SearchResult>, BackendError> {
        self.get_json("api/documents").await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, State},
        http::StatusCode,
        routing::{get, put},
        Json, Router,
    };
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    type Store = Arc<Mutex<Vec<Case>>>;

    async fn spawn_fake_backend(store: Store) -> Url {
        async fn list(State(store): State<Store>) -> Json<Vec<Case>> {
            Json(store.lock().unwrap().clone())
        }
        async fn create(State(store): State<Store>, Json(case): Json<Case>) -> StatusCode {
            store.lock().unwrap().insert(0, case);
            StatusCode::CREATED
        }
        async fn update(
            State(store): State<Store>,
            Path(id): Path<String>,
            Json(case): Json<Case>,
        ) -> StatusCode {
            let mut cases = store.lock().unwrap();
            match cases.iter_mut().find(|c| c.id == id) {
                Some(stored) => {
                    *stored = case;
                    StatusCode::OK
                }
                None => StatusCode::NOT_FOUND,
            }
        }
        async fn documents() -> Json<Vec<SearchResult>> {
            Json(vec![SearchResult {
                id: "1".into(),
                title: "Contract Formation Requirements".into(),
                snippet: "A contract requires offer, acceptance, consideration...".into(),
                source: "Restatement (Second) of Contracts".into(),
                last_updated: Utc::now(),
                tags: vec!["contract".into()],
                relevance_score: 0.95,
            }])
        }

        let app = Router::new()
            .route("/api/cases", get(list).post(create))
            .route("/api/cases/:id", put(update))
            .route("/api/documents", get(documents))
            .with_state(store);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn create_then_list_round_trips_through_http() {
        let store = Store::default();
        let url = spawn_fake_backend(store.clone()).await;
        let backend = HttpBackend::new(url, Duration::from_secs(2)).unwrap();

        let case = Case::new("Title A", "Desc");
        backend.create_case(&case).await.unwrap();

        let listed = backend.list_cases().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, case.id);
        assert_eq!(store.lock().unwrap()[0].title, "Title A");
    }

    #[tokio::test]
    async fn update_of_unknown_case_surfaces_api_error() {
        let url = spawn_fake_backend(Store::default()).await;
        let backend = HttpBackend::new(url, Duration::from_secs(2)).unwrap();

        let err = backend
            .update_case(&Case::new("ghost", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn documents_are_parsed_with_dates() {
        let url = spawn_fake_backend(Store::default()).await;
        let backend = HttpBackend::new(url, Duration::from_secs(2)).unwrap();

        let docs = backend.list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source, "Restatement (Second) of Contracts");
    }

    #[tokio::test]
    async fn closed_port_is_reported_as_unavailable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("http://{addr}")).unwrap();
        let backend = HttpBackend::new(url, Duration::from_secs(2)).unwrap();
        let err = backend.list_cases().await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable));
    }
}
