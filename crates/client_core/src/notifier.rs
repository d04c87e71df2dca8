//! Operator feedback: short-lived toasts and the last-action-result panel.

use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::debug;

use crate::types::{ActionResult, ClientEvent, Toast, ToastKind};

pub const DEFAULT_TOAST_TTL: Duration = Duration::from_millis(3500);

#[derive(Default)]
struct NotifierState {
    toast: Option<Toast>,
    generation: u64,
    expiry: Option<JoinHandle<()>>,
    action_result: Option<ActionResult>,
}

#[derive(Clone)]
pub struct Notifier {
    ttl: Duration,
    inner: Arc<Mutex<NotifierState>>,
    events: broadcast::Sender<ClientEvent>,
}

impl Notifier {
    pub fn new(ttl: Duration, events: broadcast::Sender<ClientEvent>) -> Self {
        Self {
            ttl,
            inner: Arc::new(Mutex::new(NotifierState::default())),
            events,
        }
    }

    /// Shows a toast, replacing any pending one. The toast clears itself
    /// after the configured ttl unless another `show` happens first.
    pub async fn show(&self, message: impl Into<String>, kind: ToastKind) {
        let toast = Toast {
            message: message.into(),
            kind,
        };

        let mut guard = self.inner.lock().await;
        guard.generation += 1;
        let generation = guard.generation;
        if let Some(previous) = guard.expiry.take() {
            previous.abort();
        }
        guard.toast = Some(toast.clone());

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        let ttl = self.ttl;
        guard.expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            let mut guard = inner.lock().await;
            if guard.generation == generation {
                guard.toast = None;
                guard.expiry = None;
                let _ = events.send(ClientEvent::ToastCleared);
            }
        }));
        drop(guard);

        debug!(kind = ?toast.kind, message = %toast.message, "toast shown");
        let _ = self.events.send(ClientEvent::Toast(toast));
    }

    pub async fn success(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Success).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.show(message, ToastKind::Error).await;
    }

    pub async fn toast(&self) -> Option<Toast> {
        self.inner.lock().await.toast.clone()
    }

    pub async fn set_action_result(&self, result: Option<ActionResult>) {
        self.inner.lock().await.action_result = result.clone();
        let _ = self.events.send(ClientEvent::ActionResultChanged(result));
    }

    pub async fn action_result(&self) -> Option<ActionResult> {
        self.inner.lock().await.action_result.clone()
    }
}

#[cfg(test)]
#[path = "tests/notifier_tests.rs"]
mod tests;
