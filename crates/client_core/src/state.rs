//! Client view state and its reducer.
//!
//! All mutation goes through [`AppState::apply`], which runs synchronously
//! under the owner's lock. Reads tag their results with the
//! [`SelectionToken`] they were issued for; a result whose token no longer
//! matches the current selection is discarded, so a slow response for a
//! previous queue can never land on the current one.
//!
//! The in-flight action slot belongs to a selection as well: switching
//! queues frees it, and only the action's own selection can release it.

use serde::{Deserialize, Serialize};
use shared::protocol::{EventItem, PreviewResponse, QueueListing, QueueStatus, QueueSummary};

use crate::{
    transport::ResponseMeta,
    types::{ActionKind, SavedSelection, SelectionToken, ViewSlice},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    pub selected: Option<SavedSelection>,
    pub epoch: u64,
    pub queues: Vec<QueueListing>,
    pub status: Option<QueueStatus>,
    pub summary: Option<QueueSummary>,
    pub events: Vec<EventItem>,
    pub preview: Option<PreviewResponse>,
    pub is_paused: bool,
    pub last_request_id: Option<String>,
    pub api_version: Option<String>,
    pub action_in_flight: Option<ActionKind>,
}

#[derive(Debug, Clone)]
pub enum AppEvent {
    Selected(SavedSelection),
    Deselected,
    QueuesLoaded(Vec<QueueListing>),
    StatusLoaded {
        token: SelectionToken,
        status: QueueStatus,
        meta: ResponseMeta,
    },
    SummaryLoaded {
        token: SelectionToken,
        summary: QueueSummary,
    },
    EventsLoaded {
        token: SelectionToken,
        events: Vec<EventItem>,
    },
    PreviewLoaded {
        token: SelectionToken,
        preview: Option<PreviewResponse>,
    },
    /// A live action changed the line, so the last projection is stale.
    PreviewExpired(SelectionToken),
    PauseChanged {
        token: SelectionToken,
        paused: bool,
    },
    RequestTraced {
        token: SelectionToken,
        meta: ResponseMeta,
    },
    ActionStarted(ActionKind),
    ActionFinished(SelectionToken),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied(ViewSlice),
    /// The result targeted a selection that is no longer current.
    Discarded,
    /// Another action is still in flight.
    Rejected(ActionKind),
}

impl AppState {
    pub fn token(&self) -> Option<SelectionToken> {
        self.selected.as_ref().map(|selected| SelectionToken {
            queue_id: selected.id,
            epoch: self.epoch,
        })
    }

    fn is_current(&self, token: SelectionToken) -> bool {
        self.token() == Some(token)
    }

    /// WAITING entries in the last status snapshot, `None` before the first
    /// status read lands.
    pub fn waiting_count(&self) -> Option<usize> {
        self.status.as_ref().map(QueueStatus::waiting_count)
    }

    pub fn apply(&mut self, event: AppEvent) -> Transition {
        match event {
            AppEvent::Selected(selection) => {
                self.epoch += 1;
                self.selected = Some(selection);
                self.clear_queue_data();
                Transition::Applied(ViewSlice::Selection)
            }
            AppEvent::Deselected => {
                self.epoch += 1;
                self.selected = None;
                self.clear_queue_data();
                Transition::Applied(ViewSlice::Selection)
            }
            AppEvent::QueuesLoaded(queues) => {
                self.queues = queues;
                Transition::Applied(ViewSlice::Queues)
            }
            AppEvent::StatusLoaded {
                token,
                status,
                meta,
            } => {
                if !self.is_current(token) || status.queue_id != token.queue_id {
                    return Transition::Discarded;
                }
                self.is_paused = status.queue_status.is_paused();
                self.api_version = Some(meta.api_version);
                self.status = Some(status);
                Transition::Applied(ViewSlice::Status)
            }
            AppEvent::SummaryLoaded { token, summary } => {
                if !self.is_current(token) {
                    return Transition::Discarded;
                }
                self.summary = Some(summary);
                Transition::Applied(ViewSlice::Summary)
            }
            AppEvent::EventsLoaded { token, events } => {
                if !self.is_current(token) {
                    return Transition::Discarded;
                }
                self.events = events;
                Transition::Applied(ViewSlice::Events)
            }
            AppEvent::PreviewLoaded { token, preview } => {
                if !self.is_current(token) {
                    return Transition::Discarded;
                }
                self.preview = preview;
                Transition::Applied(ViewSlice::Preview)
            }
            AppEvent::PreviewExpired(token) => {
                if !self.is_current(token) {
                    return Transition::Discarded;
                }
                self.preview = None;
                Transition::Applied(ViewSlice::Preview)
            }
            AppEvent::PauseChanged { token, paused } => {
                if !self.is_current(token) {
                    return Transition::Discarded;
                }
                self.is_paused = paused;
                Transition::Applied(ViewSlice::PauseState)
            }
            AppEvent::RequestTraced { token, meta } => {
                if !self.is_current(token) {
                    return Transition::Discarded;
                }
                self.last_request_id = Some(meta.request_id);
                self.api_version = Some(meta.api_version);
                Transition::Applied(ViewSlice::Trace)
            }
            AppEvent::ActionStarted(kind) => {
                if let Some(running) = self.action_in_flight {
                    return Transition::Rejected(running);
                }
                self.action_in_flight = Some(kind);
                Transition::Applied(ViewSlice::Trace)
            }
            AppEvent::ActionFinished(token) => {
                if !self.is_current(token) {
                    return Transition::Discarded;
                }
                self.action_in_flight = None;
                Transition::Applied(ViewSlice::Trace)
            }
        }
    }

    fn clear_queue_data(&mut self) {
        self.status = None;
        self.summary = None;
        self.events.clear();
        self.preview = None;
        self.is_paused = false;
        self.action_in_flight = None;
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
