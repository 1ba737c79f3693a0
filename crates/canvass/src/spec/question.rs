use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::spec::transition::SourceTransition;

/// A code snippet with the labels of the earlier questions whose answers it
/// consumes. Label references are turned into question indices at compile.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SourceFunction {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    pub code: String,
}

/// The localized text of the first localization, with the text functions
/// its `@{N}` escapes call.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SourceText {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<SourceFunction>,
    pub value: String,
}

impl SourceText {
    pub fn plain(value: impl Into<String>) -> Self {
        Self { functions: Vec::new(), value: value.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SourceOption {
    pub label: String,
    #[serde(default)]
    pub comment_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceMessage {
    pub label: String,
    #[serde(default)]
    pub style: String,
    pub text: SourceText,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<SourceTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceInput {
    pub label: String,
    #[serde(default)]
    pub style: String,
    pub text: SourceText,
    #[serde(default)]
    pub comment_label: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<SourceTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceSelect {
    pub label: String,
    #[serde(default)]
    pub style: String,
    pub text: SourceText,
    #[serde(default)]
    pub comment_label: String,
    pub options: Vec<SourceOption>,
    #[serde(default)]
    pub randomize: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<SourceTransition>,
}

/// Shared shape of the four limited-selection variants. A limit of 0 is
/// adjusted to the number of options at compile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceMultipleChoice {
    pub label: String,
    #[serde(default)]
    pub style: String,
    pub text: SourceText,
    #[serde(default)]
    pub comment_label: String,
    pub options: Vec<SourceOption>,
    #[serde(default)]
    pub randomize: bool,
    #[serde(default)]
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<SourceTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceFromTemplate {
    pub label: String,
    /// Library-wide unique name of the template question.
    pub template: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<SourceTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceBeginLoop {
    pub label: String,
    /// Label of the earlier question whose answer is iterated over.
    pub question: String,
    /// Loop variable name resolved by `@{NAME}` escapes.
    pub variable: String,
    /// Snippet yielding the array to iterate, evaluated with `R` bound to
    /// the operand answer.
    pub operand: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<SourceTransition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceEndLoop {
    pub label: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<SourceTransition>,
}

/// A question as uploaded. Questions reference each other through labels;
/// compilation turns the labels into indices after validating them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum SourceQuestion {
    Message(SourceMessage),
    Input(SourceInput),
    Select(SourceSelect),
    SelectAtMost(SourceMultipleChoice),
    SelectExactly(SourceMultipleChoice),
    RankAtMost(SourceMultipleChoice),
    RankExactly(SourceMultipleChoice),
    FromTemplate(SourceFromTemplate),
    BeginLoop(SourceBeginLoop),
    EndLoop(SourceEndLoop),
}

impl SourceQuestion {
    pub fn label(&self) -> &str {
        match self {
            SourceQuestion::Message(q) => &q.label,
            SourceQuestion::Input(q) => &q.label,
            SourceQuestion::Select(q) => &q.label,
            SourceQuestion::SelectAtMost(q)
            | SourceQuestion::SelectExactly(q)
            | SourceQuestion::RankAtMost(q)
            | SourceQuestion::RankExactly(q) => &q.label,
            SourceQuestion::FromTemplate(q) => &q.label,
            SourceQuestion::BeginLoop(q) => &q.label,
            SourceQuestion::EndLoop(q) => &q.label,
        }
    }

    pub fn transitions(&self) -> &[SourceTransition] {
        match self {
            SourceQuestion::Message(q) => &q.transitions,
            SourceQuestion::Input(q) => &q.transitions,
            SourceQuestion::Select(q) => &q.transitions,
            SourceQuestion::SelectAtMost(q)
            | SourceQuestion::SelectExactly(q)
            | SourceQuestion::RankAtMost(q)
            | SourceQuestion::RankExactly(q) => &q.transitions,
            SourceQuestion::FromTemplate(q) => &q.transitions,
            SourceQuestion::BeginLoop(q) => &q.transitions,
            SourceQuestion::EndLoop(q) => &q.transitions,
        }
    }
}
