use thiserror::Error;

use crate::types::ActionKind;

/// How a failed request should be presented to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No response reached the client.
    Transport,
    /// Schema-level rejection with a per-field errors map.
    Validation,
    /// A business rule identified by a rule code blocked the action.
    PolicyBlocked,
    Other,
}

#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("network error: {0}")]
    Network(String),
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        rule_code: Option<String>,
        request_id: Option<String>,
        validation: bool,
    },
    #[error("invalid response payload: {0}")]
    Decode(String),
}

impl RequestError {
    pub fn rule_code(&self) -> Option<&str> {
        match self {
            Self::Status { rule_code, .. } => rule_code.as_deref(),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Self::Status { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network(_) => ErrorCategory::Transport,
            Self::Status {
                rule_code: Some(_), ..
            } => ErrorCategory::PolicyBlocked,
            Self::Status {
                validation: true, ..
            } => ErrorCategory::Validation,
            _ => ErrorCategory::Other,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Network(value.to_string())
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("no queue selected")]
    NoQueueSelected,
    #[error("{0}")]
    InvalidName(String),
    #[error("nobody is waiting in the queue")]
    NothingWaiting,
    #[error("{0} is already in progress")]
    ActionInFlight(ActionKind),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("selection store error: {0}")]
    Store(String),
}

impl ClientError {
    pub fn rule_code(&self) -> Option<&str> {
        match self {
            Self::Request(err) => err.rule_code(),
            _ => None,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
