use std::fmt;

use serde::{Deserialize, Serialize};
use shared::{domain::QueueId, protocol::Simulation};

use crate::transport::ResponseMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Join,
    ServeNext,
    SkipNext,
    SkipEntry,
    Pause,
    Resume,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Join => "join",
            Self::ServeNext => "serve",
            Self::SkipNext => "skip",
            Self::SkipEntry => "skip entry",
            Self::Pause => "pause",
            Self::Resume => "resume",
        };
        f.write_str(label)
    }
}

/// Uniform result of a mutating call: either the server changed state, or
/// it only reported what would have happened.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T> {
    Live { data: T, meta: ResponseMeta },
    Simulated { simulation: Simulation, meta: ResponseMeta },
}

impl<T> ActionOutcome<T> {
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated { .. })
    }

    pub fn meta(&self) -> &ResponseMeta {
        match self {
            Self::Live { meta, .. } | Self::Simulated { meta, .. } => meta,
        }
    }

    pub fn live(&self) -> Option<&T> {
        match self {
            Self::Live { data, .. } => Some(data),
            Self::Simulated { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionResultKind {
    Success,
    Blocked,
    DryRun,
}

/// Contents of the "last action result" panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub kind: ActionResultKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub request_id: String,
}

impl ActionResult {
    pub fn success(message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            kind: ActionResultKind::Success,
            message: message.into(),
            rule_code: None,
            reason: None,
            request_id: request_id.into(),
        }
    }

    pub fn blocked(
        message: impl Into<String>,
        rule_code: Option<String>,
        reason: Option<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: ActionResultKind::Blocked,
            message: message.into(),
            rule_code,
            reason,
            request_id: request_id.into(),
        }
    }

    /// Panel entry for a dry-run response. A "would fail" verdict is shown as
    /// blocked with whatever rule code and reason the engine supplied.
    pub fn from_simulation(
        message: impl Into<String>,
        simulation: &Simulation,
        request_id: impl Into<String>,
    ) -> Self {
        let kind = if simulation.would_succeed() {
            ActionResultKind::DryRun
        } else {
            ActionResultKind::Blocked
        };
        Self {
            kind,
            message: message.into(),
            rule_code: simulation.rule_code.clone(),
            reason: simulation.reason.clone(),
            request_id: request_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
}

impl Toast {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: ToastKind::Error,
        }
    }
}

/// Identifies which selection a read was issued for. Results carrying a
/// token other than the current one are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionToken {
    pub queue_id: QueueId,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedSelection {
    pub id: QueueId,
    pub name: String,
}

/// Slice of the view that changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewSlice {
    Selection,
    Queues,
    Status,
    Summary,
    Events,
    Preview,
    PauseState,
    Trace,
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    ViewUpdated(ViewSlice),
    Toast(Toast),
    ToastCleared,
    ActionResultChanged(Option<ActionResult>),
}
