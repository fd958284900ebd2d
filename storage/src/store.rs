use crate::graph::{Graph, GraphError};
use crate::snapshot::{GraphSnapshot, SnapshotError};
use chrono::{DateTime, Utc};
use reelgraph_core::config::SeedConfig;
use reelgraph_core::interaction::{ContentSnapshot, UserInteraction};
use reelgraph_core::model::{
    Edge, EdgeKind, EdgeProperties, Node, NodeKind, NodeProperties,
};
use std::sync::Arc;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Lowercase, dash-separated form of a display name used in node ids.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

pub fn category_node_id(name: &str) -> String {
    format!("category:{}", slug(name))
}

pub fn topic_node_id(name: &str) -> String {
    format!("topic:{}", slug(name))
}

pub fn creator_node_id(handle: &str) -> String {
    format!("creator:{}", slug(handle))
}

fn new_edge_id() -> String {
    Uuid::new_v4().to_string()
}

/// Shared handle to the knowledge graph.
///
/// Writers take the write lock for the whole mutation, so readers never see
/// a partially applied interaction. Analyses hold the read lock for their
/// full duration through [`GraphStore::read`].
pub struct GraphStore {
    graph: Arc<RwLock<Graph>>,
    seed: SeedConfig,
}

impl GraphStore {
    /// Empty store with the default seed vocabulary (not yet applied).
    pub fn new() -> Self {
        Self::with_seed(SeedConfig::default())
    }

    pub fn with_seed(seed: SeedConfig) -> Self {
        Self {
            graph: Arc::new(RwLock::new(Graph::new())),
            seed,
        }
    }

    /// Store initialized to the seed vocabulary.
    pub async fn seeded(seed: SeedConfig) -> Self {
        let store = Self::with_seed(seed);
        store.initialize().await;
        store
    }

    /// Clear everything and recreate the seed CATEGORY/TOPIC nodes.
    pub async fn initialize(&self) {
        let mut graph = self.graph.write().await;
        graph.clear();
        let now = Utc::now();

        for name in &self.seed.categories {
            let node = Node::new(category_node_id(name), NodeKind::Category)
                .with_properties(NodeProperties::named(name.clone()))
                .with_created_at(now);
            if let Err(err) = graph.add_node(node) {
                warn!("Skipping seed category {}: {}", name, err);
            }
        }
        for name in &self.seed.topics {
            let node = Node::new(topic_node_id(name), NodeKind::Topic)
                .with_properties(NodeProperties::named(name.clone()))
                .with_created_at(now);
            if let Err(err) = graph.add_node(node) {
                warn!("Skipping seed topic {}: {}", name, err);
            }
        }

        info!(
            "Graph initialized with {} seed nodes",
            graph.node_count()
        );
    }

    /// Consistent read view for traversal and scoring.
    pub async fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.graph.read().await
    }

    /// Owned copy of the current graph, for work that must not hold the lock.
    pub async fn snapshot_graph(&self) -> Graph {
        self.graph.read().await.clone()
    }

    pub async fn add_node(&self, node: Node) -> Result<Node, GraphError> {
        let mut graph = self.graph.write().await;
        graph.add_node(node).cloned()
    }

    pub async fn update_node(&self, id: &str, patch: NodeProperties) -> Result<Node, GraphError> {
        let mut graph = self.graph.write().await;
        graph.update_node(id, patch).cloned()
    }

    pub async fn add_edge(&self, edge: Edge) -> Result<Edge, GraphError> {
        let mut graph = self.graph.write().await;
        match graph.add_edge(edge) {
            Ok(edge) => Ok(edge.clone()),
            Err(err) => {
                warn!("Rejected edge: {}", err);
                Err(err)
            }
        }
    }

    pub async fn update_edge(
        &self,
        id: &str,
        weight: Option<f64>,
        patch: EdgeProperties,
    ) -> Result<Edge, GraphError> {
        let mut graph = self.graph.write().await;
        graph.update_edge(id, weight, patch).cloned()
    }

    pub async fn get_node(&self, id: &str) -> Option<Node> {
        self.graph.read().await.get_node(id).cloned()
    }

    pub async fn get_edge(&self, id: &str) -> Option<Edge> {
        self.graph.read().await.get_edge(id).cloned()
    }

    pub async fn get_nodes_by_type(&self, kind: NodeKind) -> Vec<Node> {
        let graph = self.graph.read().await;
        graph.get_nodes_by_type(kind).into_iter().cloned().collect()
    }

    pub async fn get_edges_by_type(&self, kind: EdgeKind) -> Vec<Edge> {
        let graph = self.graph.read().await;
        graph.get_edges_by_type(kind).into_iter().cloned().collect()
    }

    pub async fn get_outgoing_edges(&self, node_id: &str) -> Vec<Edge> {
        let graph = self.graph.read().await;
        graph.get_outgoing_edges(node_id).into_iter().cloned().collect()
    }

    pub async fn get_incoming_edges(&self, node_id: &str) -> Vec<Edge> {
        let graph = self.graph.read().await;
        graph.get_incoming_edges(node_id).into_iter().cloned().collect()
    }

    pub async fn get_neighbors(&self, node_id: &str, kind: Option<EdgeKind>) -> Vec<Node> {
        let graph = self.graph.read().await;
        graph.get_neighbors(node_id, kind).into_iter().cloned().collect()
    }

    pub async fn find_paths(&self, source: &str, target: &str, max_depth: usize) -> Vec<Vec<Edge>> {
        let graph = self.graph.read().await;
        graph
            .find_paths(source, target, max_depth)
            .into_iter()
            .map(|path| path.into_iter().cloned().collect())
            .collect()
    }

    pub async fn node_count(&self) -> usize {
        self.graph.read().await.node_count()
    }

    pub async fn edge_count(&self) -> usize {
        self.graph.read().await.edge_count()
    }

    /// Record one user interaction.
    ///
    /// Materializes the USER and VIDEO nodes on first sight (linking a new
    /// video to its category, topics and creator), adds the typed interaction
    /// edge and appends the compact record to the user's history. Validation
    /// happens before any mutation.
    pub async fn process_user_interaction(
        &self,
        user_id: &str,
        interaction: &UserInteraction,
        content: &ContentSnapshot,
    ) -> Result<Edge, GraphError> {
        if user_id.trim().is_empty() {
            return Err(GraphError::InvalidInteraction(
                "user id must not be empty".to_string(),
            ));
        }
        if interaction.video_id.trim().is_empty() {
            return Err(GraphError::InvalidInteraction(
                "video id must not be empty".to_string(),
            ));
        }
        if user_id == interaction.video_id {
            return Err(GraphError::InvalidInteraction(format!(
                "user {} cannot interact with itself",
                user_id
            )));
        }
        if content.id != interaction.video_id {
            return Err(GraphError::InvalidInteraction(format!(
                "content snapshot {} does not match video {}",
                content.id, interaction.video_id
            )));
        }

        let mut graph = self.graph.write().await;
        check_planned_nodes(&graph, &planned_nodes(&graph, user_id, content))?;

        let at = interaction.timestamp;
        if !graph.contains_node(user_id) {
            graph.add_node(Node::new(user_id, NodeKind::User).with_created_at(at))?;
            debug!("Materialized user {}", user_id);
        }
        if !graph.contains_node(&interaction.video_id) {
            materialize_video(&mut graph, content, at)?;
            debug!("Materialized video {}", interaction.video_id);
        }

        let edge = Edge::new(
            new_edge_id(),
            EdgeKind::for_action(interaction.action),
            user_id,
            interaction.video_id.clone(),
            1.0,
        )
        .with_properties(EdgeProperties {
            action: Some(interaction.action),
            duration: interaction.duration,
            timestamp: Some(at),
            metadata: interaction.metadata.clone(),
            ..EdgeProperties::default()
        })
        .with_created_at(at);
        let edge = graph.add_edge(edge)?.clone();

        let user = graph
            .get_node_mut(user_id)
            .ok_or_else(|| GraphError::NodeNotFound(user_id.to_string()))?;
        user.properties.interactions.push(interaction.record());
        user.updated_at = user.updated_at.max(at);

        Ok(edge)
    }

    pub async fn export_graph(&self) -> GraphSnapshot {
        let graph = self.graph.read().await;
        GraphSnapshot::from_graph(&graph)
    }

    /// Replace the whole graph with a snapshot. The current state is kept
    /// when the snapshot is invalid.
    pub async fn import_graph(&self, snapshot: GraphSnapshot) -> Result<(), SnapshotError> {
        let imported = snapshot.into_graph()?;
        let mut graph = self.graph.write().await;
        *graph = imported;
        info!(
            "Imported graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    }
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Every node id an interaction may touch, with the kind it must have.
fn planned_nodes(graph: &Graph, user_id: &str, content: &ContentSnapshot) -> Vec<(String, NodeKind)> {
    let mut planned = vec![
        (user_id.to_string(), NodeKind::User),
        (content.id.clone(), NodeKind::Video),
    ];
    if let Some(creator) = &content.creator {
        planned.push((creator_node_id(creator), NodeKind::Creator));
    }
    if !graph.contains_node(&content.id) {
        if let Some(category) = &content.category {
            planned.push((category_node_id(category), NodeKind::Category));
        }
        for topic in &content.topics {
            planned.push((topic_node_id(topic), NodeKind::Topic));
        }
    }
    planned
}

/// Reject id collisions with existing nodes and among the planned nodes
/// themselves, so a failing interaction mutates nothing.
fn check_planned_nodes(graph: &Graph, planned: &[(String, NodeKind)]) -> Result<(), GraphError> {
    for (i, (id, kind)) in planned.iter().enumerate() {
        ensure_kind(graph, id, *kind)?;
        if let Some((_, other)) = planned[..i]
            .iter()
            .find(|(earlier, other)| earlier == id && other != kind)
        {
            return Err(GraphError::KindConflict {
                id: id.clone(),
                existing: *other,
                requested: *kind,
            });
        }
    }
    Ok(())
}

fn ensure_kind(graph: &Graph, id: &str, kind: NodeKind) -> Result<(), GraphError> {
    match graph.get_node(id) {
        Some(node) if node.kind != kind => Err(GraphError::KindConflict {
            id: id.to_string(),
            existing: node.kind,
            requested: kind,
        }),
        _ => Ok(()),
    }
}

fn materialize_video(
    graph: &mut Graph,
    content: &ContentSnapshot,
    at: DateTime<Utc>,
) -> Result<(), GraphError> {
    let created_at = content.created_at.unwrap_or(at);
    let properties = NodeProperties {
        title: content.title.clone(),
        category: content.category.clone(),
        creator: content.creator.clone(),
        duration: content.duration,
        topics: content.topics.clone(),
        tags: content.tags.clone(),
        ..NodeProperties::default()
    };
    graph.add_node(
        Node::new(content.id.clone(), NodeKind::Video)
            .with_properties(properties)
            .with_created_at(created_at),
    )?;

    if let Some(category) = &content.category {
        let category_id = category_node_id(category);
        link_or_create(graph, &category_id, NodeKind::Category, category, created_at)?;
        graph.add_edge(
            Edge::new(new_edge_id(), EdgeKind::BelongsTo, content.id.clone(), category_id, 1.0)
                .with_created_at(created_at),
        )?;
    }

    for topic in &content.topics {
        let topic_id = topic_node_id(topic);
        link_or_create(graph, &topic_id, NodeKind::Topic, topic, created_at)?;
        graph.add_edge(
            Edge::new(new_edge_id(), EdgeKind::RelatedTo, content.id.clone(), topic_id, 1.0)
                .with_created_at(created_at),
        )?;
    }

    if let Some(creator) = &content.creator {
        let creator_id = creator_node_id(creator);
        link_or_create(graph, &creator_id, NodeKind::Creator, creator, created_at)?;
        graph.add_edge(
            Edge::new(new_edge_id(), EdgeKind::Created, creator_id, content.id.clone(), 1.0)
                .with_created_at(created_at),
        )?;
    }

    Ok(())
}

fn link_or_create(
    graph: &mut Graph,
    id: &str,
    kind: NodeKind,
    name: &str,
    at: DateTime<Utc>,
) -> Result<(), GraphError> {
    if graph.contains_node(id) {
        return Ok(());
    }
    graph.add_node(
        Node::new(id, kind)
            .with_properties(NodeProperties::named(name))
            .with_created_at(at),
    )?;
    Ok(())
}
