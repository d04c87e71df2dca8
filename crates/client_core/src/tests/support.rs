//! Scriptable in-process stand-in for the queue engine.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use shared::{
    domain::{EntryId, QueueId},
    protocol::{
        ActionPayload, CreateQueueResponse, EntryActionResponse, EventItem, JoinResponse,
        PauseStateResponse, PreviewResponse, QueueListing, QueueStatus, QueueSummary,
    },
};

use crate::{
    config::ClientSettings,
    error::RequestError,
    protocol_client::{ApiResult, QueueApi},
    selection_store::{MemorySelectionStore, SelectionStore},
    transport::{ApiResponse, ResponseMeta},
    QueueClient,
};

/// Answers each operation from a per-operation script, falling back to an
/// empty but valid payload for reads and to a network error for writes.
///
/// Reads are keyed per queue (`"status:1"`), writes by name (`"serve"`).
#[derive(Default)]
pub(crate) struct FakeQueueApi {
    scripted: Mutex<HashMap<String, VecDeque<Result<Value, RequestError>>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
    served: AtomicU64,
}

impl FakeQueueApi {
    pub(crate) fn script(&self, op: &str, result: Result<Value, RequestError>) {
        self.scripted
            .lock()
            .unwrap()
            .entry(op.to_string())
            .or_default()
            .push_back(result);
    }

    pub(crate) fn delay(&self, op: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(op.to_string(), delay);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == call)
            .count()
    }

    async fn answer(
        &self,
        op: &str,
        call: String,
        fallback: impl FnOnce() -> Result<Value, RequestError>,
    ) -> ApiResult<Value> {
        self.calls.lock().unwrap().push(call);
        let scripted = self
            .scripted
            .lock()
            .unwrap()
            .get_mut(op)
            .and_then(VecDeque::pop_front);
        let delay = self.delays.lock().unwrap().get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let data = scripted.unwrap_or_else(fallback)?;
        let n = self.served.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ApiResponse {
            data,
            meta: ResponseMeta {
                request_id: format!("req-{n}"),
                api_version: "1.0".to_string(),
            },
        })
    }

    async fn typed<T: DeserializeOwned>(
        &self,
        op: &str,
        call: String,
        fallback: impl FnOnce() -> Result<Value, RequestError>,
    ) -> ApiResult<T> {
        let response = self.answer(op, call, fallback).await?;
        Ok(response.map(|data| serde_json::from_value(data).expect("fake payload decodes")))
    }

    async fn action<T: DeserializeOwned>(
        &self,
        op: &str,
        call: String,
    ) -> ApiResult<ActionPayload<T>> {
        let response = self.answer(op, call, unscripted).await?;
        Ok(response.map(|data| ActionPayload::from_value(data).expect("fake payload decodes")))
    }
}

fn unscripted() -> Result<Value, RequestError> {
    Err(RequestError::Network("connection refused".into()))
}

fn mode(simulate: bool) -> &'static str {
    if simulate {
        "dry"
    } else {
        "live"
    }
}

#[async_trait]
impl QueueApi for FakeQueueApi {
    async fn list_queues(&self) -> ApiResult<Vec<QueueListing>> {
        self.typed("list", "list".into(), || Ok(json!([]))).await
    }

    async fn create_queue(&self, name: &str) -> ApiResult<CreateQueueResponse> {
        self.typed("create", format!("create:{name}"), unscripted)
            .await
    }

    async fn queue_status(&self, queue_id: QueueId) -> ApiResult<QueueStatus> {
        let op = format!("status:{queue_id}");
        self.typed(&op, op.clone(), || Ok(status_json(queue_id.0, false, &[])))
            .await
    }

    async fn join(
        &self,
        queue_id: QueueId,
        user_name: &str,
        simulate: bool,
    ) -> ApiResult<ActionPayload<JoinResponse>> {
        self.action("join", format!("join:{queue_id}:{user_name}:{}", mode(simulate)))
            .await
    }

    async fn serve_next(
        &self,
        queue_id: QueueId,
        simulate: bool,
    ) -> ApiResult<ActionPayload<EntryActionResponse>> {
        self.action("serve", format!("serve:{queue_id}:{}", mode(simulate)))
            .await
    }

    async fn skip_next(
        &self,
        queue_id: QueueId,
        simulate: bool,
    ) -> ApiResult<ActionPayload<EntryActionResponse>> {
        self.action("skip", format!("skip:{queue_id}:{}", mode(simulate)))
            .await
    }

    async fn skip_entry(
        &self,
        queue_id: QueueId,
        entry_id: EntryId,
    ) -> ApiResult<EntryActionResponse> {
        self.typed(
            "skip_entry",
            format!("skip_entry:{queue_id}:{entry_id}"),
            unscripted,
        )
        .await
    }

    async fn pause(&self, queue_id: QueueId) -> ApiResult<PauseStateResponse> {
        self.typed("pause", format!("pause:{queue_id}"), || {
            Ok(json!({"queue_id": queue_id, "status": "PAUSED"}))
        })
        .await
    }

    async fn resume(&self, queue_id: QueueId) -> ApiResult<PauseStateResponse> {
        self.typed("resume", format!("resume:{queue_id}"), || {
            Ok(json!({"queue_id": queue_id, "status": "ACTIVE"}))
        })
        .await
    }

    async fn summary(&self, queue_id: QueueId) -> ApiResult<QueueSummary> {
        let op = format!("summary:{queue_id}");
        self.typed(&op, op.clone(), || {
            Ok(json!({
                "queue_id": queue_id,
                "waiting_count": 0,
                "served_count": 0,
                "skipped_count": 0
            }))
        })
        .await
    }

    async fn preview(
        &self,
        queue_id: QueueId,
    ) -> Result<Option<ApiResponse<PreviewResponse>>, RequestError> {
        let op = format!("preview:{queue_id}");
        let response = self.answer(&op, op.clone(), || Ok(Value::Null)).await?;
        if response.data.is_null() {
            return Ok(None);
        }
        Ok(Some(response.map(|data| {
            serde_json::from_value(data).expect("fake payload decodes")
        })))
    }

    async fn events(&self, queue_id: QueueId, limit: u32) -> ApiResult<Vec<EventItem>> {
        let op = format!("events:{queue_id}");
        self.typed(&op, format!("{op}:{limit}"), || Ok(json!([])))
            .await
    }
}

/// `entries` are `(entry id, user name, status)`; positions count waiting
/// entries in order.
pub(crate) fn status_json(queue_id: i64, paused: bool, entries: &[(i64, &str, &str)]) -> Value {
    let mut position = 0;
    let entries: Vec<Value> = entries
        .iter()
        .map(|(id, name, status)| {
            if *status == "WAITING" {
                position += 1;
            }
            json!({
                "id": id,
                "user_name": name,
                "position": position,
                "status": status,
                "joined_at": "2026-01-05T09:00:00"
            })
        })
        .collect();
    json!({
        "queue_id": queue_id,
        "queue_name": format!("Queue {queue_id}"),
        "queue_status": if paused { "PAUSED" } else { "ACTIVE" },
        "entries": entries,
        "explanation": "",
        "wait_explanations": {}
    })
}

pub(crate) fn quiet_settings() -> ClientSettings {
    ClientSettings {
        poll_interval_ms: 3_600_000,
        ..ClientSettings::default()
    }
}

pub(crate) fn client_with(
    api: &Arc<FakeQueueApi>,
    store: Arc<dyn SelectionStore>,
    settings: &ClientSettings,
) -> Arc<QueueClient> {
    QueueClient::new(api.clone(), store, settings)
}

pub(crate) fn memory_store() -> Arc<MemorySelectionStore> {
    Arc::new(MemorySelectionStore::default())
}

/// Lets spawned poll ticks run to completion under paused time.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}
