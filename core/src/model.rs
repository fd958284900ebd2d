use crate::interaction::{InteractionAction, InteractionRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub type NodeId = String;
pub type EdgeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    User,
    Video,
    Category,
    Creator,
    Topic,
    Trend,
    Music,
    Agent,
    Interaction,
}

impl NodeKind {
    pub const ALL: [NodeKind; 9] = [
        NodeKind::User,
        NodeKind::Video,
        NodeKind::Category,
        NodeKind::Creator,
        NodeKind::Topic,
        NodeKind::Trend,
        NodeKind::Music,
        NodeKind::Agent,
        NodeKind::Interaction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::User => "USER",
            NodeKind::Video => "VIDEO",
            NodeKind::Category => "CATEGORY",
            NodeKind::Creator => "CREATOR",
            NodeKind::Topic => "TOPIC",
            NodeKind::Trend => "TREND",
            NodeKind::Music => "MUSIC",
            NodeKind::Agent => "AGENT",
            NodeKind::Interaction => "INTERACTION",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    Viewed,
    Liked,
    Created,
    BelongsTo,
    RelatedTo,
    InteractedWith,
    Follows,
    CommentedOn,
    Shared,
    Uses,
    SimilarTo,
    InspiredBy,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 12] = [
        EdgeKind::Viewed,
        EdgeKind::Liked,
        EdgeKind::Created,
        EdgeKind::BelongsTo,
        EdgeKind::RelatedTo,
        EdgeKind::InteractedWith,
        EdgeKind::Follows,
        EdgeKind::CommentedOn,
        EdgeKind::Shared,
        EdgeKind::Uses,
        EdgeKind::SimilarTo,
        EdgeKind::InspiredBy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Viewed => "VIEWED",
            EdgeKind::Liked => "LIKED",
            EdgeKind::Created => "CREATED",
            EdgeKind::BelongsTo => "BELONGS_TO",
            EdgeKind::RelatedTo => "RELATED_TO",
            EdgeKind::InteractedWith => "INTERACTED_WITH",
            EdgeKind::Follows => "FOLLOWS",
            EdgeKind::CommentedOn => "COMMENTED_ON",
            EdgeKind::Shared => "SHARED",
            EdgeKind::Uses => "USES",
            EdgeKind::SimilarTo => "SIMILAR_TO",
            EdgeKind::InspiredBy => "INSPIRED_BY",
        }
    }

    /// Edge kind recorded for a user action on a video.
    pub fn for_action(action: InteractionAction) -> Self {
        match action {
            InteractionAction::View => EdgeKind::Viewed,
            InteractionAction::Like => EdgeKind::Liked,
            InteractionAction::Comment => EdgeKind::CommentedOn,
            InteractionAction::Share => EdgeKind::Shared,
            InteractionAction::Follow => EdgeKind::Follows,
            InteractionAction::Skip => EdgeKind::InteractedWith,
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Known node properties. Anything open-ended lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    /// Content length in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interactions: Vec<InteractionRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeProperties {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Merge a patch into these properties.
    ///
    /// Scalars present in the patch replace stored values, non-empty lists
    /// replace stored lists, interaction history is appended and `extra` is
    /// merged key by key.
    pub fn merge(&mut self, patch: NodeProperties) {
        if patch.name.is_some() {
            self.name = patch.name;
        }
        if patch.title.is_some() {
            self.title = patch.title;
        }
        if patch.category.is_some() {
            self.category = patch.category;
        }
        if patch.creator.is_some() {
            self.creator = patch.creator;
        }
        if patch.duration.is_some() {
            self.duration = patch.duration;
        }
        if !patch.topics.is_empty() {
            self.topics = patch.topics;
        }
        if !patch.tags.is_empty() {
            self.tags = patch.tags;
        }
        self.interactions.extend(patch.interactions);
        self.extra.extend(patch.extra);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EdgeProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<InteractionAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Caller-supplied interaction metadata. Kept nested so its keys never
    /// shadow the typed fields.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EdgeProperties {
    pub fn merge(&mut self, patch: EdgeProperties) {
        if patch.action.is_some() {
            self.action = patch.action;
        }
        if patch.duration.is_some() {
            self.duration = patch.duration;
        }
        if patch.timestamp.is_some() {
            self.timestamp = patch.timestamp;
        }
        self.metadata.extend(patch.metadata);
        self.extra.extend(patch.extra);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub properties: NodeProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embeddings: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, kind: NodeKind) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            properties: NodeProperties::default(),
            embeddings: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_properties(mut self, properties: NodeProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_embeddings(mut self, embeddings: Vec<f32>) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Pin both timestamps, e.g. when materializing a node from an event.
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }

    /// Display label: `name`, then `title`, then the id.
    pub fn label(&self) -> &str {
        self.properties
            .name
            .as_deref()
            .or(self.properties.title.as_deref())
            .unwrap_or(&self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
    #[serde(default)]
    pub properties: EdgeProperties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(
        id: impl Into<EdgeId>,
        kind: EdgeKind,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        weight: f64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            source: source.into(),
            target: target.into(),
            weight,
            properties: EdgeProperties::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_properties(mut self, properties: EdgeProperties) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_kind_serializes_screaming_snake() {
        let raw = serde_json::to_string(&EdgeKind::BelongsTo).unwrap();
        assert_eq!(raw, "\"BELONGS_TO\"");
        assert_eq!(EdgeKind::InspiredBy.to_string(), "INSPIRED_BY");
    }

    #[test]
    fn test_properties_merge_keeps_unpatched_fields() {
        let mut props = NodeProperties::named("Cat video")
            .with_category("Comedy")
            .with_extra("lang", json!("en"));
        props.merge(
            NodeProperties::default()
                .with_creator("creator-1")
                .with_extra("hd", json!(true)),
        );

        assert_eq!(props.name.as_deref(), Some("Cat video"));
        assert_eq!(props.category.as_deref(), Some("Comedy"));
        assert_eq!(props.creator.as_deref(), Some("creator-1"));
        assert_eq!(props.extra.len(), 2);
    }

    #[test]
    fn test_unknown_property_keys_land_in_extra() {
        let props: NodeProperties =
            serde_json::from_value(json!({"category": "Music", "bpm": 120})).unwrap();
        assert_eq!(props.category.as_deref(), Some("Music"));
        assert_eq!(props.extra.get("bpm"), Some(&json!(120)));
    }

    #[test]
    fn test_edge_metadata_does_not_shadow_typed_fields() {
        let mut metadata = Map::new();
        metadata.insert("duration".to_string(), json!("long"));
        let props = EdgeProperties {
            duration: Some(12.0),
            metadata,
            ..EdgeProperties::default()
        };

        let encoded = serde_json::to_value(&props).unwrap();
        assert_eq!(encoded["duration"], json!(12.0));
        assert_eq!(encoded["metadata"]["duration"], json!("long"));

        let decoded: EdgeProperties = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, props);
    }
}
