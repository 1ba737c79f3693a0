use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::spec::question::SourceOption;

/// A template question as uploaded. Unlike questionnaire questions, each
/// template upload names its own language: creating one produces both the
/// template question and its first localization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum SourceTemplateQuestion {
    Message {
        language: Language,
        label: String,
        #[serde(default)]
        style: String,
        text: String,
    },
    Input {
        language: Language,
        label: String,
        #[serde(default)]
        style: String,
        text: String,
        #[serde(default)]
        comment_label: String,
        #[serde(default)]
        optional: bool,
    },
    Select {
        language: Language,
        label: String,
        #[serde(default)]
        style: String,
        text: String,
        #[serde(default)]
        comment_label: String,
        options: Vec<SourceOption>,
        #[serde(default)]
        randomize: bool,
    },
    SelectAtMost(SourceTemplateMultipleChoice),
    SelectExactly(SourceTemplateMultipleChoice),
    RankAtMost(SourceTemplateMultipleChoice),
    RankExactly(SourceTemplateMultipleChoice),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceTemplateMultipleChoice {
    pub language: Language,
    pub label: String,
    #[serde(default)]
    pub style: String,
    pub text: String,
    #[serde(default)]
    pub comment_label: String,
    pub options: Vec<SourceOption>,
    #[serde(default)]
    pub randomize: bool,
    #[serde(default)]
    pub limit: usize,
}

impl SourceTemplateQuestion {
    pub fn label(&self) -> &str {
        match self {
            SourceTemplateQuestion::Message { label, .. }
            | SourceTemplateQuestion::Input { label, .. }
            | SourceTemplateQuestion::Select { label, .. } => label,
            SourceTemplateQuestion::SelectAtMost(q)
            | SourceTemplateQuestion::SelectExactly(q)
            | SourceTemplateQuestion::RankAtMost(q)
            | SourceTemplateQuestion::RankExactly(q) => &q.label,
        }
    }

    pub fn language(&self) -> Language {
        match self {
            SourceTemplateQuestion::Message { language, .. }
            | SourceTemplateQuestion::Input { language, .. }
            | SourceTemplateQuestion::Select { language, .. } => *language,
            SourceTemplateQuestion::SelectAtMost(q)
            | SourceTemplateQuestion::SelectExactly(q)
            | SourceTemplateQuestion::RankAtMost(q)
            | SourceTemplateQuestion::RankExactly(q) => q.language,
        }
    }
}

/// An additional localization for an existing template question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum SourceTemplateLocalization {
    Message {
        language: Language,
        text: String,
    },
    Input {
        language: Language,
        text: String,
        #[serde(default)]
        comment_label: String,
    },
    Options {
        language: Language,
        text: String,
        #[serde(default)]
        comment_label: String,
        options: Vec<SourceOption>,
    },
}

impl SourceTemplateLocalization {
    pub fn language(&self) -> Language {
        match self {
            SourceTemplateLocalization::Message { language, .. }
            | SourceTemplateLocalization::Input { language, .. }
            | SourceTemplateLocalization::Options { language, .. } => *language,
        }
    }
}
