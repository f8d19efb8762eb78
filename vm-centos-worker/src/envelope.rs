use crate::error::{Result, WorkerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

/// Uniform result of every task.
///
/// When `error` is set, `content` is empty. `params` is always empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResultEnvelope {
    #[schema(value_type = Object)]
    pub content: Map<String, Value>,
    pub error: Option<String>,
    #[schema(value_type = Object)]
    pub params: Map<String, Value>,
}

impl ResultEnvelope {
    pub fn with_content(content: Map<String, Value>) -> Self {
        Self {
            content,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Serialize `value` into envelope content. `()` and `None` give empty content.
pub fn to_content<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(WorkerError::InvalidArguments {
            task: "envelope".to_string(),
            reason: format!("content must be a mapping, got {}", other),
        }),
    }
}
