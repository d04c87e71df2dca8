use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::{EntryId, EntryStatus, EventId, QueueId, QueueLifecycle};

/// Dashboard row from `GET /queues`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueListing {
    pub id: QueueId,
    pub name: String,
    pub status: QueueLifecycle,
    pub waiting_count: u32,
    pub total_count: u32,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateQueueRequest {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateQueueResponse {
    pub id: QueueId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: EntryId,
    pub user_name: String,
    pub position: u32,
    pub status: EntryStatus,
    #[serde(default)]
    pub joined_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub queue_id: QueueId,
    pub queue_name: String,
    pub queue_status: QueueLifecycle,
    pub entries: Vec<QueueEntry>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub wait_explanations: BTreeMap<String, String>,
}

impl QueueStatus {
    pub fn entries_with(&self, status: EntryStatus) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter().filter(move |entry| entry.status == status)
    }

    pub fn waiting_count(&self) -> usize {
        self.entries_with(EntryStatus::Waiting).count()
    }

    pub fn entry(&self, entry_id: EntryId) -> Option<&QueueEntry> {
        self.entries.iter().find(|entry| entry.id == entry_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub user_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub entry_id: EntryId,
    pub user_name: String,
    pub position: u32,
    pub status: EntryStatus,
}

/// Live response of serve, skip-next and skip-entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryActionResponse {
    pub entry_id: EntryId,
    pub user_name: String,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseStateResponse {
    pub queue_id: QueueId,
    pub status: QueueLifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSummary {
    #[serde(default)]
    pub queue_id: Option<QueueId>,
    #[serde(default)]
    pub queue_name: Option<String>,
    pub waiting_count: u32,
    pub served_count: u32,
    pub skipped_count: u32,
    #[serde(default)]
    pub estimated_wait: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewResponse {
    pub next_if_served: String,
    pub next_if_skipped: String,
    pub skip_target: String,
    pub projected_wait_change: String,
    pub waiting_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventItem {
    pub id: EventId,
    #[serde(default)]
    pub queue_id: Option<QueueId>,
    pub action: String,
    pub result: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationVerdict {
    WouldSucceed,
    WouldFail,
}

/// Speculative outcome returned for `?dry_run=true` requests. The engine
/// performed no mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub result: SimulationVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Simulation {
    pub fn would_succeed(&self) -> bool {
        self.result == SimulationVerdict::WouldSucceed
    }
}

/// A mutating endpoint answers either with its live shape or, when the body
/// carries `"dry_run": true`, with a [`Simulation`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActionPayload<T> {
    Live(T),
    Simulated(Simulation),
}

impl<T: DeserializeOwned> ActionPayload<T> {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let simulated = value
            .get("dry_run")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if simulated {
            serde_json::from_value(value).map(Self::Simulated)
        } else {
            serde_json::from_value(value).map(Self::Live)
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn dry_run_marker_selects_simulation() {
        let payload = ActionPayload::<EntryActionResponse>::from_value(json!({
            "dry_run": true,
            "result": "would_fail",
            "reason": "Queue is empty.",
            "rule_code": "EMPTY_QUEUE"
        }))
        .expect("decode");

        let ActionPayload::Simulated(simulation) = payload else {
            panic!("expected simulated payload");
        };
        assert!(!simulation.would_succeed());
        assert_eq!(simulation.rule_code.as_deref(), Some("EMPTY_QUEUE"));
    }

    #[test]
    fn body_without_marker_is_live() {
        let payload = ActionPayload::<JoinResponse>::from_value(json!({
            "entry_id": 4,
            "user_name": "Ann Lee",
            "position": 1,
            "status": "WAITING"
        }))
        .expect("decode");
        assert_eq!(
            payload,
            ActionPayload::Live(JoinResponse {
                entry_id: EntryId(4),
                user_name: "Ann Lee".into(),
                position: 1,
                status: EntryStatus::Waiting,
            })
        );
    }

    #[test]
    fn false_marker_is_treated_as_live() {
        let payload = ActionPayload::<EntryActionResponse>::from_value(json!({
            "dry_run": false,
            "entry_id": 2,
            "user_name": "Bo",
            "status": "SERVED"
        }))
        .expect("decode");
        assert!(matches!(payload, ActionPayload::Live(_)));
    }

    #[test]
    fn status_counts_waiting_entries() {
        let status: QueueStatus = serde_json::from_value(json!({
            "queue_id": 1,
            "queue_name": "Clinic A",
            "queue_status": "ACTIVE",
            "entries": [
                {"id": 1, "user_name": "Ann", "position": 1, "status": "SERVED", "joined_at": null},
                {"id": 2, "user_name": "Bo", "position": 1, "status": "WAITING", "joined_at": null}
            ],
            "explanation": "",
            "wait_explanations": {}
        }))
        .expect("decode");
        assert_eq!(status.waiting_count(), 1);
        assert_eq!(status.entry(EntryId(1)).map(|e| e.status), Some(EntryStatus::Served));
    }
}
