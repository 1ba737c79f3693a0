use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::template::TemplateSource;
use crate::store::TemplateId;

/// Index of a question inside its questionnaire. Transitions, function
/// parameters, and loop metadata all reference questions this way; the
/// questionnaire owns the questions themselves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct QuestionId(pub usize);

/// A code snippet plus the earlier questions whose answers it consumes.
/// Used both as a transition condition and as a parametric-text fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Function {
    pub code: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<QuestionId>,
}

impl Function {
    pub fn uses_as_parameter(&self, question: QuestionId) -> bool {
        self.parameters.contains(&question)
    }
}

/// An out-edge of the question graph. An absent condition is the catch-all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Function>,
    pub destination: QuestionId,
}

impl Transition {
    pub fn is_catch_all(&self) -> bool {
        self.condition.as_ref().is_none_or(|f| f.code.is_empty())
    }
}

/// A selectable choice. Only the comment capability lives here; the label is
/// per-language and belongs to localizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OptionDef {
    pub has_comment: bool,
}

/// Style tag plus the ordered text functions driving `@{N}` escapes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TextBody {
    pub style: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text_functions: Vec<Function>,
}

impl TextBody {
    pub fn is_impacted_by(&self, question: QuestionId) -> bool {
        self.text_functions.iter().any(|f| f.uses_as_parameter(question))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MultipleChoiceKind {
    SelectAtMost,
    SelectExactly,
    RankAtMost,
    RankExactly,
}

impl MultipleChoiceKind {
    /// Whether the number of submitted choices must equal the limit rather
    /// than merely not exceed it.
    pub fn is_exact(self) -> bool {
        matches!(self, MultipleChoiceKind::SelectExactly | MultipleChoiceKind::RankExactly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    Regular,
    BeginLoop,
    EndLoop,
}

/// The question variants. Body-bearing variants carry their own style and
/// text functions; a `FromTemplate` question borrows both from the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum QuestionKind {
    Message {
        body: TextBody,
    },
    Input {
        body: TextBody,
        optional: bool,
        has_comment: bool,
    },
    Select {
        body: TextBody,
        options: Vec<OptionDef>,
        randomize: bool,
        has_comment: bool,
    },
    MultipleChoice {
        body: TextBody,
        kind: MultipleChoiceKind,
        options: Vec<OptionDef>,
        randomize: bool,
        has_comment: bool,
        limit: usize,
    },
    FromTemplate {
        template: TemplateId,
    },
    BeginLoop {
        operand_question: QuestionId,
        variable: String,
        operand: String,
    },
    EndLoop,
}

impl QuestionKind {
    pub fn loop_kind(&self) -> LoopKind {
        match self {
            QuestionKind::BeginLoop { .. } => LoopKind::BeginLoop,
            QuestionKind::EndLoop => LoopKind::EndLoop,
            _ => LoopKind::Regular,
        }
    }

    pub fn body(&self) -> Option<&TextBody> {
        match self {
            QuestionKind::Message { body }
            | QuestionKind::Input { body, .. }
            | QuestionKind::Select { body, .. }
            | QuestionKind::MultipleChoice { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn options(&self) -> Option<&[OptionDef]> {
        match self {
            QuestionKind::Select { options, .. }
            | QuestionKind::MultipleChoice { options, .. } => Some(options),
            _ => None,
        }
    }

    pub fn has_comment(&self) -> bool {
        match self {
            QuestionKind::Input { has_comment, .. }
            | QuestionKind::Select { has_comment, .. }
            | QuestionKind::MultipleChoice { has_comment, .. } => *has_comment,
            _ => false,
        }
    }
}

/// Loop placement computed once at compile time.
///
/// `nest` holds the enclosing begin-loops, innermost last; a begin-loop's
/// nest excludes itself, an end-loop's nest excludes its matching begin.
/// `matching` pairs a begin-loop with its end and vice versa.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct QuestionInfo {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nest: Vec<QuestionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching: Option<QuestionId>,
}

impl QuestionInfo {
    pub fn parent_begin_loop(&self) -> Option<QuestionId> {
        self.nest.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    pub label: String,
    pub kind: QuestionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<Transition>,
    pub info: QuestionInfo,
}

impl Question {
    pub fn loop_kind(&self) -> LoopKind {
        self.kind.loop_kind()
    }

    /// Everything except the loop delimiters can be shown to a respondent.
    pub fn supports_localization(&self) -> bool {
        !matches!(self.loop_kind(), LoopKind::BeginLoop | LoopKind::EndLoop)
    }

    /// Loop delimiters admit no answer.
    pub fn supports_answer(&self) -> bool {
        self.supports_localization()
    }

    /// Whether the question carries its own localization in the
    /// questionnaire localization (templates borrow from the library).
    pub fn has_inline_localization(&self) -> bool {
        self.kind.body().is_some()
    }

    /// True when a change to the given question's answer can change this
    /// question: a begin-loop iterating over it, or a body whose text
    /// functions take it as a parameter.
    pub fn is_impacted_by(&self, question: QuestionId) -> bool {
        match &self.kind {
            QuestionKind::BeginLoop { operand_question, .. } => *operand_question == question,
            kind => kind.body().is_some_and(|body| body.is_impacted_by(question)),
        }
    }

    /// The body-bearing kind behind this question: its own, or the
    /// template's for a `FromTemplate` question.
    pub fn resolved_kind<'a>(&'a self, templates: &'a dyn TemplateSource) -> Result<&'a QuestionKind> {
        match &self.kind {
            QuestionKind::FromTemplate { template } => templates
                .template(*template)
                .map(|t| &t.kind)
                .ok_or_else(|| Error::TemplateMissing { label: self.label.clone() }),
            kind => Ok(kind),
        }
    }

    /// A question type can be potentially terminal; only a message is.
    /// It still carries transitions when it sits mid-questionnaire.
    pub fn can_be_final(&self, templates: &dyn TemplateSource) -> bool {
        match &self.kind {
            QuestionKind::Message { .. } => true,
            QuestionKind::FromTemplate { template } => templates
                .template(*template)
                .is_some_and(|t| t.can_be_final()),
            _ => false,
        }
    }

    pub fn is_final(&self, templates: &dyn TemplateSource) -> bool {
        self.transitions.is_empty() && self.can_be_final(templates)
    }
}
