//! Typed operations of the queue engine's HTTP surface.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use shared::{
    domain::{EntryId, QueueId},
    protocol::{
        ActionPayload, CreateQueueRequest, CreateQueueResponse, EntryActionResponse, EventItem,
        JoinRequest, JoinResponse, PauseStateResponse, PreviewResponse, QueueListing, QueueStatus,
        QueueSummary,
    },
};

use crate::{
    error::RequestError,
    transport::{ApiResponse, HttpTransport, NO_BODY},
};

pub type ApiResult<T> = Result<ApiResponse<T>, RequestError>;

#[async_trait]
pub trait QueueApi: Send + Sync {
    async fn list_queues(&self) -> ApiResult<Vec<QueueListing>>;
    async fn create_queue(&self, name: &str) -> ApiResult<CreateQueueResponse>;
    async fn queue_status(&self, queue_id: QueueId) -> ApiResult<QueueStatus>;
    async fn join(
        &self,
        queue_id: QueueId,
        user_name: &str,
        simulate: bool,
    ) -> ApiResult<ActionPayload<JoinResponse>>;
    async fn serve_next(
        &self,
        queue_id: QueueId,
        simulate: bool,
    ) -> ApiResult<ActionPayload<EntryActionResponse>>;
    async fn skip_next(
        &self,
        queue_id: QueueId,
        simulate: bool,
    ) -> ApiResult<ActionPayload<EntryActionResponse>>;
    async fn skip_entry(
        &self,
        queue_id: QueueId,
        entry_id: EntryId,
    ) -> ApiResult<EntryActionResponse>;
    async fn pause(&self, queue_id: QueueId) -> ApiResult<PauseStateResponse>;
    async fn resume(&self, queue_id: QueueId) -> ApiResult<PauseStateResponse>;
    async fn summary(&self, queue_id: QueueId) -> ApiResult<QueueSummary>;
    /// `Ok(None)` when the engine has nothing to preview.
    async fn preview(
        &self,
        queue_id: QueueId,
    ) -> Result<Option<ApiResponse<PreviewResponse>>, RequestError>;
    async fn events(&self, queue_id: QueueId, limit: u32) -> ApiResult<Vec<EventItem>>;
}

pub struct HttpQueueApi {
    transport: HttpTransport,
}

impl HttpQueueApi {
    pub fn new(transport: HttpTransport) -> Self {
        Self { transport }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.transport
            .request(Method::GET, path, NO_BODY, &[])
            .await
    }

    async fn patch<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.transport
            .request(Method::PATCH, path, NO_BODY, &[])
            .await
    }

    /// Decodes a mutating response, classifying it as live or simulated.
    async fn action<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        simulate: bool,
    ) -> ApiResult<ActionPayload<T>>
    where
        T: DeserializeOwned,
        B: serde::Serialize + ?Sized + Sync,
    {
        let query = dry_run_query(simulate);
        let response: ApiResponse<serde_json::Value> =
            self.transport.request(method, path, body, &query).await?;
        let meta = response.meta;
        let data = ActionPayload::from_value(response.data)
            .map_err(|e| RequestError::Decode(e.to_string()))?;
        Ok(ApiResponse { data, meta })
    }
}

fn dry_run_query(simulate: bool) -> Vec<(&'static str, String)> {
    if simulate {
        vec![("dry_run", "true".to_string())]
    } else {
        Vec::new()
    }
}

#[async_trait]
impl QueueApi for HttpQueueApi {
    async fn list_queues(&self) -> ApiResult<Vec<QueueListing>> {
        self.get("/queues").await
    }

    async fn create_queue(&self, name: &str) -> ApiResult<CreateQueueResponse> {
        let body = CreateQueueRequest {
            name: name.to_string(),
        };
        self.transport
            .request(Method::POST, "/queues", Some(&body), &[])
            .await
    }

    async fn queue_status(&self, queue_id: QueueId) -> ApiResult<QueueStatus> {
        self.get(&format!("/queues/{queue_id}/status")).await
    }

    async fn join(
        &self,
        queue_id: QueueId,
        user_name: &str,
        simulate: bool,
    ) -> ApiResult<ActionPayload<JoinResponse>> {
        let body = JoinRequest {
            user_name: user_name.to_string(),
        };
        self.action(
            Method::POST,
            &format!("/queues/{queue_id}/join"),
            Some(&body),
            simulate,
        )
        .await
    }

    async fn serve_next(
        &self,
        queue_id: QueueId,
        simulate: bool,
    ) -> ApiResult<ActionPayload<EntryActionResponse>> {
        self.action(
            Method::PATCH,
            &format!("/queues/{queue_id}/serve"),
            NO_BODY,
            simulate,
        )
        .await
    }

    async fn skip_next(
        &self,
        queue_id: QueueId,
        simulate: bool,
    ) -> ApiResult<ActionPayload<EntryActionResponse>> {
        self.action(
            Method::PATCH,
            &format!("/queues/{queue_id}/skip"),
            NO_BODY,
            simulate,
        )
        .await
    }

    async fn skip_entry(
        &self,
        queue_id: QueueId,
        entry_id: EntryId,
    ) -> ApiResult<EntryActionResponse> {
        self.patch(&format!("/queues/{queue_id}/skip/{entry_id}")).await
    }

    async fn pause(&self, queue_id: QueueId) -> ApiResult<PauseStateResponse> {
        self.patch(&format!("/queues/{queue_id}/pause")).await
    }

    async fn resume(&self, queue_id: QueueId) -> ApiResult<PauseStateResponse> {
        self.patch(&format!("/queues/{queue_id}/resume")).await
    }

    async fn summary(&self, queue_id: QueueId) -> ApiResult<QueueSummary> {
        self.get(&format!("/queues/{queue_id}/summary")).await
    }

    async fn preview(
        &self,
        queue_id: QueueId,
    ) -> Result<Option<ApiResponse<PreviewResponse>>, RequestError> {
        self.transport
            .request_optional(Method::GET, &format!("/queues/{queue_id}/preview"), &[])
            .await
    }

    async fn events(&self, queue_id: QueueId, limit: u32) -> ApiResult<Vec<EventItem>> {
        self.transport
            .request(
                Method::GET,
                &format!("/queues/{queue_id}/events"),
                NO_BODY,
                &[("limit", limit.to_string())],
            )
            .await
    }
}
