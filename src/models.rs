//! Modelos de dominio (casos, mensajes de chat, usuario, resultados de búsqueda y grafo).
//!
//! Todos se serializan en camelCase, que es el formato que espera el frontend
//! y el que devuelve el backend de casos.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Genera un identificador nuevo (UUID v4) para casos y mensajes.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Active,
    Archived,
    Completed,
}

/// Filtro de estado de la lista de casos. `all` equivale a no filtrar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Archived,
    Completed,
}

impl StatusFilter {
    pub fn matches(self, status: CaseStatus) -> bool {
        match self {
            Self::All => true,
            Self::Active => status == CaseStatus::Active,
            Self::Archived => status == CaseStatus::Archived,
            Self::Completed => status == CaseStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// Citas y razonamiento asociados a una respuesta del asistente.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_nodes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Un turno de la conversación de un caso. No se modifica tras crearse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn assistant(content: impl Into<String>, metadata: MessageMetadata) -> Self {
        Self {
            id: new_id(),
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: Some(metadata),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: CaseStatus,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub documents: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Case {
    /// Caso nuevo y activo, sin mensajes, documentos ni etiquetas.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            created_at: now,
            updated_at: now,
            status: CaseStatus::Active,
            messages: Vec::new(),
            documents: Vec::new(),
            tags: Vec::new(),
        }
    }
}

/// Actualización parcial de un caso; los campos ausentes se conservan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CaseStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl CaseUpdate {
    pub fn status(status: CaseStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Fusión superficial sobre `case`. No toca `updated_at`.
    pub fn apply_to(self, case: &mut Case) {
        if let Some(title) = self.title {
            case.title = title;
        }
        if let Some(description) = self.description {
            case.description = description;
        }
        if let Some(status) = self.status {
            case.status = status;
        }
        if let Some(messages) = self.messages {
            case.messages = messages;
        }
        if let Some(documents) = self.documents {
            case.documents = documents;
        }
        if let Some(tags) = self.tags {
            case.tags = tags;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Vector,
    #[default]
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub title: String,
    pub snippet: String,
    pub source: String,
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub relevance_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Statute,
    Case,
    Concept,
    Article,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub properties: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub relationship: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn update_keeps_unspecified_fields() {
        let mut case = Case::new("Title A", "Desc");
        case.tags = vec!["contract".into()];

        CaseUpdate {
            description: Some("Nueva".into()),
            ..CaseUpdate::default()
        }
        .apply_to(&mut case);

        assert_eq!(case.title, "Title A");
        assert_eq!(case.description, "Nueva");
        assert_eq!(case.tags, vec!["contract".to_string()]);
        assert_eq!(case.status, CaseStatus::Active);
    }

    #[test]
    fn message_role_serializes_as_type() {
        let msg = ChatMessage::user("hola");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], json!("user"));
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn case_wire_format_is_camel_case() {
        let raw = json!({
            "id": "42",
            "title": "Imported",
            "description": "",
            "createdAt": "2024-01-10T00:00:00Z",
            "updatedAt": "2024-01-14T00:00:00Z",
            "status": "completed"
        });
        let case: Case = serde_json::from_value(raw).unwrap();
        assert_eq!(case.status, CaseStatus::Completed);
        assert!(case.messages.is_empty());
    }

    #[test]
    fn status_filter_all_matches_everything() {
        for status in [CaseStatus::Active, CaseStatus::Archived, CaseStatus::Completed] {
            assert!(StatusFilter::All.matches(status));
        }
        assert!(!StatusFilter::Archived.matches(CaseStatus::Active));
    }

    #[test]
    fn new_ids_do_not_collide() {
        assert_ne!(new_id(), new_id());
    }
}
