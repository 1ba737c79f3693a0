use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An out-edge in source form. `condition` holds a bare condition snippet;
/// `code` holds a full snippet ending in the condition value. Supplying both
/// is an error, supplying neither makes the transition a catch-all.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SourceTransition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub code: String,
    pub destination: String,
}

impl SourceTransition {
    pub fn is_catch_all(&self) -> bool {
        self.condition.is_empty() && self.code.is_empty()
    }
}
