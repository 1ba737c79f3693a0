use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One selected option in a submitted answer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ChoicePayload {
    /// 0-based position in the question's option list.
    pub index: usize,
    #[serde(default)]
    pub comment: String,
}

/// A submitted answer, validated against the question it responds to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum AnswerPayload {
    /// Acknowledges a message question; carries no data.
    Message,
    Input {
        input: String,
        #[serde(default)]
        comment: String,
    },
    Select {
        choice: ChoicePayload,
        #[serde(default)]
        comment: String,
    },
    MultipleChoice {
        choices: Vec<ChoicePayload>,
        #[serde(default)]
        comment: String,
    },
}
