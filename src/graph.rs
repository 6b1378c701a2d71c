//! Grafo de conceptos jurídicos relacionados con un artículo.
//!
//! Datos estáticos de demostración: tras una espera fija se devuelve siempre
//! el mismo fragmento (formación del contrato → oferta y aceptación).

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::json;
use tracing::info;

use crate::models::{GraphData, GraphEdge, GraphNode, NodeKind};

#[derive(Clone)]
pub struct GraphService {
    delay: Duration,
    latest: Arc<Mutex<Option<GraphData>>>,
}

impl GraphService {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn load_graph(&self, article_id: &str) -> GraphData {
        tokio::time::sleep(self.delay).await;
        let graph = demo_graph();
        info!(
            "Grafo cargado para el artículo {article_id}: {} nodos, {} relaciones",
            graph.nodes.len(),
            graph.edges.len()
        );
        *self.latest.lock().unwrap() = Some(graph.clone());
        graph
    }

    /// Último grafo cargado, si lo hay.
    pub fn latest(&self) -> Option<GraphData> {
        self.latest.lock().unwrap().clone()
    }
}

fn concept(id: &str, label: &str, section: &str, importance: &str) -> GraphNode {
    let properties = BTreeMap::from([
        ("section".to_string(), json!(section)),
        ("importance".to_string(), json!(importance)),
    ]);
    GraphNode {
        id: id.to_string(),
        label: label.to_string(),
        kind: NodeKind::Concept,
        properties,
    }
}

fn demo_graph() -> GraphData {
    GraphData {
        nodes: vec![
            concept("contract-formation", "Contract Formation", "§1.1", "high"),
            concept("offer-acceptance", "Offer & Acceptance", "§1.2", "medium"),
        ],
        edges: vec![GraphEdge {
            id: "edge-1".into(),
            source: "contract-formation".into(),
            target: "offer-acceptance".into(),
            relationship: "contains".into(),
            weight: 0.8,
        }],
    }
}
