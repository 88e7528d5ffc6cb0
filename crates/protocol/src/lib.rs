use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod definition;
mod payload;

pub use definition::{DatePreset, DisplayType, FacetDefinition, FacetOperator, OrderingPolicy, SourceKind};
pub use payload::{Choice, FacetSettings, FacetsPayload, Pagination, ResolvedFacet, Selection};

#[derive(Debug, Serialize, Deserialize, Clone, JsonSchema)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub hint: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}
