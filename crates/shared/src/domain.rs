use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(QueueId);
id_newtype!(EntryId);
id_newtype!(EventId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueLifecycle {
    Active,
    Paused,
}

impl QueueLifecycle {
    pub fn is_paused(self) -> bool {
        self == Self::Paused
    }
}

/// Entry progression is one-way: `Waiting` moves to `Served` or `Skipped`
/// and never leaves either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Waiting,
    Served,
    Skipped,
}

impl EntryStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Waiting => "WAITING",
            Self::Served => "SERVED",
            Self::Skipped => "SKIPPED",
        };
        f.write_str(label)
    }
}

/// Machine-readable identifiers the queue engine attaches to blocked actions.
pub mod rule_codes {
    pub const INVALID_NAME: &str = "INVALID_NAME";
    pub const DUPLICATE_JOIN: &str = "DUPLICATE_JOIN";
    pub const EMPTY_QUEUE: &str = "EMPTY_QUEUE";
    pub const ALREADY_SERVED: &str = "ALREADY_SERVED";
    pub const NOT_WAITING: &str = "NOT_WAITING";
    pub const QUEUE_PAUSED: &str = "QUEUE_PAUSED";
    pub const ALREADY_PAUSED: &str = "ALREADY_PAUSED";
    pub const ALREADY_ACTIVE: &str = "ALREADY_ACTIVE";
    pub const QUEUE_NOT_FOUND: &str = "QUEUE_NOT_FOUND";
    pub const RULE_VIOLATION: &str = "RULE_VIOLATION";
}
