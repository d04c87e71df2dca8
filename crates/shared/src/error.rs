use serde::{Deserialize, Serialize};

pub const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// Body the queue engine sends with every non-success status.
///
/// Rule violations carry `error` + `rule_code`; schema validation failures
/// carry a per-field `errors` map instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn rule(message: impl Into<String>, rule_code: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            rule_code: Some(rule_code.into()),
            errors: None,
        }
    }

    /// Display text in priority order: `error`, then the flattened `errors`
    /// map, then a generic fallback.
    pub fn display_message(&self) -> String {
        if let Some(error) = self.error.as_deref().filter(|e| !e.is_empty()) {
            return error.to_string();
        }
        if let Some(errors) = self.errors.as_ref().filter(|e| !e.is_null()) {
            return errors.to_string();
        }
        GENERIC_FAILURE_MESSAGE.to_string()
    }

    pub fn has_validation_errors(&self) -> bool {
        self.errors.as_ref().is_some_and(|e| !e.is_null())
    }
}
