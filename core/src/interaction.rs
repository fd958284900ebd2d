use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionAction {
    View,
    Like,
    Comment,
    Share,
    Follow,
    Skip,
}

impl InteractionAction {
    pub const ALL: [InteractionAction; 6] = [
        InteractionAction::View,
        InteractionAction::Like,
        InteractionAction::Comment,
        InteractionAction::Share,
        InteractionAction::Follow,
        InteractionAction::Skip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionAction::View => "view",
            InteractionAction::Like => "like",
            InteractionAction::Comment => "comment",
            InteractionAction::Share => "share",
            InteractionAction::Follow => "follow",
            InteractionAction::Skip => "skip",
        }
    }

    /// Actions directed at other people rather than the content itself.
    pub fn is_social(&self) -> bool {
        matches!(
            self,
            InteractionAction::Comment | InteractionAction::Share | InteractionAction::Follow
        )
    }

    pub fn is_passive(&self) -> bool {
        matches!(self, InteractionAction::View | InteractionAction::Skip)
    }
}

impl fmt::Display for InteractionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user event reported by the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInteraction {
    pub video_id: String,
    pub action: InteractionAction,
    /// Watch time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl UserInteraction {
    pub fn new(
        video_id: impl Into<String>,
        action: InteractionAction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            video_id: video_id.into(),
            action,
            duration: None,
            timestamp,
            metadata: Map::new(),
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn record(&self) -> InteractionRecord {
        InteractionRecord {
            video_id: self.video_id.clone(),
            action: self.action,
            duration: self.duration,
            timestamp: self.timestamp,
        }
    }
}

/// Compact history entry kept on the user node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionRecord {
    pub video_id: String,
    pub action: InteractionAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// What the host knows about a video at the time of an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ContentSnapshot {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ContentSnapshot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
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

    pub fn with_topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interaction_parses_camel_case_payload() {
        let raw = r#"{"videoId":"v1","action":"like","timestamp":"2024-03-01T10:00:00Z"}"#;
        let interaction: UserInteraction = serde_json::from_str(raw).unwrap();
        assert_eq!(interaction.video_id, "v1");
        assert_eq!(interaction.action, InteractionAction::Like);
        assert!(interaction.duration.is_none());
        assert!(interaction.metadata.is_empty());
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let raw = r#"{"videoId":"v1","action":"poke","timestamp":"2024-03-01T10:00:00Z"}"#;
        assert!(serde_json::from_str::<UserInteraction>(raw).is_err());
    }
}
