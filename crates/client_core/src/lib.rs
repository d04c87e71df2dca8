use std::sync::{Arc, Weak};

use serde::Serialize;
use shared::{domain::QueueId, protocol::PreviewResponse};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

pub mod config;
pub mod error;
pub mod name_rules;
pub mod notifier;
mod orchestrator;
pub mod polling;
pub mod protocol_client;
pub mod selection_store;
pub mod state;
pub mod transport;
pub mod types;

pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, ClientResult, ErrorCategory, RequestError};
pub use notifier::Notifier;
pub use polling::PollingScheduler;
pub use protocol_client::{HttpQueueApi, QueueApi};
pub use selection_store::{FileSelectionStore, MemorySelectionStore, SelectionStore};
pub use state::{AppEvent, AppState, Transition};
pub use transport::{ApiResponse, HttpTransport, ResponseMeta};
pub use types::{
    ActionKind, ActionOutcome, ActionResult, ActionResultKind, ClientEvent, SavedSelection,
    SelectionToken, Toast, ToastKind, ViewSlice,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything a renderer needs to draw the operator view.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSnapshot {
    pub state: AppState,
    pub toast: Option<Toast>,
    pub action_result: Option<ActionResult>,
}

/// Coordinator owning the view state of one operator session.
///
/// Reads and actions go through the [`QueueApi`]; their results are folded
/// into a single [`AppState`] via [`AppState::apply`]. Feedback goes through
/// the [`Notifier`] and every change is published as a [`ClientEvent`].
pub struct QueueClient {
    api: Arc<dyn QueueApi>,
    store: Arc<dyn SelectionStore>,
    notifier: Notifier,
    state: Mutex<AppState>,
    poller: Mutex<PollingScheduler>,
    events: broadcast::Sender<ClientEvent>,
    events_limit: u32,
}

impl QueueClient {
    pub fn new(
        api: Arc<dyn QueueApi>,
        store: Arc<dyn SelectionStore>,
        settings: &ClientSettings,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            store,
            notifier: Notifier::new(settings.toast_ttl(), events.clone()),
            state: Mutex::new(AppState::default()),
            poller: Mutex::new(PollingScheduler::new(settings.poll_interval())),
            events,
            events_limit: settings.events_limit,
        })
    }

    /// HTTP transport plus a file-backed selection bookmark.
    pub fn from_settings(settings: &ClientSettings) -> ClientResult<Arc<Self>> {
        let transport =
            HttpTransport::with_timeout(settings.server_url.clone(), settings.request_timeout())?;
        Ok(Self::new(
            Arc::new(HttpQueueApi::new(transport)),
            Arc::new(FileSelectionStore::new(settings.selection_path.clone())),
            settings,
        ))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ClientSnapshot {
        let state = self.state.lock().await.clone();
        ClientSnapshot {
            state,
            toast: self.notifier.toast().await,
            action_result: self.notifier.action_result().await,
        }
    }

    pub async fn selected(&self) -> Option<SavedSelection> {
        self.state.lock().await.selected.clone()
    }

    pub async fn polling_queue(&self) -> Option<QueueId> {
        self.poller.lock().await.active_queue()
    }

    async fn apply(&self, event: AppEvent) -> Transition {
        let transition = self.state.lock().await.apply(event);
        match transition {
            Transition::Applied(slice) => {
                let _ = self.events.send(ClientEvent::ViewUpdated(slice));
            }
            Transition::Discarded => debug!("discarded result for a previous selection"),
            Transition::Rejected(_) => {}
        }
        transition
    }

    async fn current_token(&self) -> ClientResult<SelectionToken> {
        self.state
            .lock()
            .await
            .token()
            .ok_or(ClientError::NoQueueSelected)
    }

    async fn is_current(&self, token: SelectionToken) -> bool {
        self.state.lock().await.token() == Some(token)
    }

    /// Makes `queue_id` the selected queue and (re)starts polling for it.
    ///
    /// Data of the previous selection is dropped before this returns, so no
    /// read issued for it can be displayed afterwards.
    pub async fn select_queue(self: &Arc<Self>, queue_id: QueueId, name: &str) -> ClientResult<()> {
        let selection = SavedSelection {
            id: queue_id,
            name: name.to_string(),
        };

        let mut poller = self.poller.lock().await;
        let token = {
            let mut state = self.state.lock().await;
            state.apply(AppEvent::Selected(selection.clone()));
            state.token().ok_or(ClientError::NoQueueSelected)?
        };
        let client = Arc::downgrade(self);
        poller.start(queue_id, move || poll_tick(client.clone(), token));
        drop(poller);

        let _ = self
            .events
            .send(ClientEvent::ViewUpdated(ViewSlice::Selection));
        self.notifier.set_action_result(None).await;
        if let Err(err) = self.store.save(&selection) {
            warn!(queue_id = queue_id.0, error = %err, "failed to persist queue selection");
        }
        info!(queue_id = queue_id.0, queue_name = name, "queue selected");
        Ok(())
    }

    /// Stops polling and forgets the selected queue, including the bookmark.
    pub async fn deselect(&self) {
        let mut poller = self.poller.lock().await;
        poller.stop();
        self.state.lock().await.apply(AppEvent::Deselected);
        drop(poller);

        let _ = self
            .events
            .send(ClientEvent::ViewUpdated(ViewSlice::Selection));
        self.notifier.set_action_result(None).await;
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear saved queue selection");
        }
        info!("queue deselected");
    }

    /// Stops the refresh timer but keeps the selection and its bookmark.
    pub async fn stop_polling(&self) {
        self.poller.lock().await.stop();
    }

    /// Re-selects the bookmarked queue from a previous session, if any.
    pub async fn restore_selection(self: &Arc<Self>) -> ClientResult<Option<SavedSelection>> {
        let Some(saved) = self.store.load() else {
            return Ok(None);
        };
        self.select_queue(saved.id, &saved.name).await?;
        Ok(Some(saved))
    }

    pub async fn list_queues(&self) -> ClientResult<Vec<shared::protocol::QueueListing>> {
        match self.api.list_queues().await {
            Ok(response) => {
                self.apply(AppEvent::QueuesLoaded(response.data.clone())).await;
                Ok(response.data)
            }
            Err(err) => {
                warn!(error = %err, "failed to list queues");
                self.notifier.error(err.to_string()).await;
                Err(err.into())
            }
        }
    }

    /// Creates a queue and selects it.
    pub async fn create_queue(
        self: &Arc<Self>,
        name: &str,
    ) -> ClientResult<shared::protocol::CreateQueueResponse> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClientError::InvalidName(
                "Queue name must not be empty.".to_string(),
            ));
        }

        let created = match self.api.create_queue(name).await {
            Ok(response) => response.data,
            Err(err) => {
                warn!(error = %err, "failed to create queue");
                self.notifier.error(err.to_string()).await;
                return Err(err.into());
            }
        };
        self.select_queue(created.id, &created.name).await?;
        self.notifier
            .success(format!("Queue \"{}\" created!", created.name))
            .await;
        Ok(created)
    }

    /// Fetches status, summary and events for the current selection and waits
    /// for all three to settle.
    pub async fn refresh_all(&self) -> ClientResult<()> {
        let token = self.current_token().await?;
        self.poll_once(token).await;
        Ok(())
    }

    /// Best-effort read of what the next serve or skip would do. An empty
    /// queue, or any failure, yields `None`.
    pub async fn preview(&self) -> ClientResult<Option<PreviewResponse>> {
        let token = self.current_token().await?;
        let preview = match self.api.preview(token.queue_id).await {
            Ok(response) => response.map(|response| response.data),
            Err(err) => {
                debug!(queue_id = token.queue_id.0, error = %err, "preview unavailable");
                None
            }
        };
        self.apply(AppEvent::PreviewLoaded {
            token,
            preview: preview.clone(),
        })
        .await;
        Ok(preview)
    }

    async fn poll_once(&self, token: SelectionToken) {
        tokio::join!(
            self.refresh_status_for(token),
            self.refresh_summary_for(token),
            self.refresh_events_for(token),
        );
    }

    async fn refresh_status_for(&self, token: SelectionToken) {
        match self.api.queue_status(token.queue_id).await {
            Ok(response) => {
                self.apply(AppEvent::StatusLoaded {
                    token,
                    status: response.data,
                    meta: response.meta,
                })
                .await;
            }
            Err(err) => {
                if !self.is_current(token).await {
                    return;
                }
                warn!(queue_id = token.queue_id.0, error = %err, "status refresh failed");
                self.notifier.error(err.to_string()).await;
            }
        }
    }

    async fn refresh_summary_for(&self, token: SelectionToken) {
        match self.api.summary(token.queue_id).await {
            Ok(response) => {
                self.apply(AppEvent::SummaryLoaded {
                    token,
                    summary: response.data,
                })
                .await;
            }
            Err(err) => {
                debug!(queue_id = token.queue_id.0, error = %err, "summary refresh failed");
            }
        }
    }

    async fn refresh_events_for(&self, token: SelectionToken) {
        match self.api.events(token.queue_id, self.events_limit).await {
            Ok(response) => {
                self.apply(AppEvent::EventsLoaded {
                    token,
                    events: response.data,
                })
                .await;
            }
            Err(err) => {
                debug!(queue_id = token.queue_id.0, error = %err, "events refresh failed");
            }
        }
    }
}

async fn poll_tick(client: Weak<QueueClient>, token: SelectionToken) {
    if let Some(client) = client.upgrade() {
        client.poll_once(token).await;
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
