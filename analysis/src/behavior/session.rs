use chrono::{DateTime, Duration, Utc};
use reelgraph_core::interaction::InteractionRecord;
use reelgraph_core::model::NodeKind;
use storage::Graph;

/// Consecutive interactions with no gap longer than the inactivity limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interactions: Vec<InteractionRecord>,
}

impl Session {
    pub fn duration_minutes(&self) -> f64 {
        (self.end - self.start).num_seconds() as f64 / 60.0
    }
}

/// One user's windowed history.
#[derive(Debug, Clone)]
pub struct UserActivity {
    pub user_id: String,
    /// Time ordered.
    pub interactions: Vec<InteractionRecord>,
    pub sessions: Vec<Session>,
}

/// Split time-ordered records wherever the gap exceeds `gap`.
pub fn group_sessions(records: &[InteractionRecord], gap: Duration) -> Vec<Session> {
    let mut sessions: Vec<Session> = Vec::new();
    for record in records {
        match sessions.last_mut() {
            Some(session) if record.timestamp - session.end <= gap => {
                session.end = record.timestamp;
                session.interactions.push(record.clone());
            }
            _ => sessions.push(Session {
                start: record.timestamp,
                end: record.timestamp,
                interactions: vec![record.clone()],
            }),
        }
    }
    sessions
}

/// Histories of every user with at least one interaction in
/// `(now - window, now]`.
pub fn collect_activity(
    graph: &Graph,
    window: Duration,
    gap: Duration,
    now: DateTime<Utc>,
) -> Vec<UserActivity> {
    let start = now - window;
    graph
        .get_nodes_by_type(NodeKind::User)
        .into_iter()
        .filter_map(|user| {
            let mut interactions: Vec<InteractionRecord> = user
                .properties
                .interactions
                .iter()
                .filter(|record| record.timestamp > start && record.timestamp <= now)
                .cloned()
                .collect();
            if interactions.is_empty() {
                return None;
            }
            interactions.sort_by_key(|record| record.timestamp);
            let sessions = group_sessions(&interactions, gap);
            Some(UserActivity {
                user_id: user.id.clone(),
                interactions,
                sessions,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reelgraph_core::interaction::InteractionAction;

    fn record(minute: i64) -> InteractionRecord {
        InteractionRecord {
            video_id: "v1".into(),
            action: InteractionAction::View,
            duration: None,
            timestamp: Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap() + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_inactivity_gap_closes_session() {
        let records = [record(0), record(10), record(40), record(71), record(80)];
        let sessions = group_sessions(&records, Duration::minutes(30));

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].interactions.len(), 3);
        assert_eq!(sessions[0].duration_minutes(), 40.0);
        assert_eq!(sessions[1].interactions.len(), 2);
    }
}
