use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::language::Language;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SourceOptionLocalization {
    pub label: String,
    #[serde(default)]
    pub comment_label: String,
}

/// Localization of one question, referencing it by label. The shape must
/// match the question: `Options` applies to selects and multiple choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum SourceQuestionLocalization {
    Message {
        label: String,
        text: String,
    },
    Input {
        label: String,
        text: String,
        #[serde(default)]
        comment_label: String,
    },
    Options {
        label: String,
        text: String,
        #[serde(default)]
        comment_label: String,
        options: Vec<SourceOptionLocalization>,
    },
}

impl SourceQuestionLocalization {
    pub fn label(&self) -> &str {
        match self {
            SourceQuestionLocalization::Message { label, .. }
            | SourceQuestionLocalization::Input { label, .. }
            | SourceQuestionLocalization::Options { label, .. } => label,
        }
    }
}

/// A full additional localization for a questionnaire, uploaded after the
/// questionnaire itself. Questions are referenced by label and need not be
/// in question order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceQuestionnaireLocalization {
    #[serde(default)]
    pub title: String,
    pub language: Language,
    pub questions: Vec<SourceQuestionLocalization>,
}
