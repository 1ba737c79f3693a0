use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::language::Language;
use crate::model::question::{OptionDef, Question, QuestionId, QuestionKind};
use crate::model::questionnaire::Questionnaire;
use crate::model::template::TemplateSource;
use crate::store::QuestionnaireId;

/// Per-language label for an option, plus a comment label iff the option
/// carries a comment field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OptionLocalization {
    pub label: String,
    #[serde(default)]
    pub comment_label: String,
}

/// The language-bearing half of a question. The shape must match the
/// question kind: options questions localize their options, comment-capable
/// questions localize the comment label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum LocalizationBody {
    Message {
        text: String,
    },
    Input {
        text: String,
        #[serde(default)]
        comment_label: String,
    },
    Options {
        text: String,
        #[serde(default)]
        comment_label: String,
        options: Vec<OptionLocalization>,
    },
}

impl LocalizationBody {
    pub fn text(&self) -> &str {
        match self {
            LocalizationBody::Message { text }
            | LocalizationBody::Input { text, .. }
            | LocalizationBody::Options { text, .. } => text,
        }
    }

    pub fn comment_label(&self) -> &str {
        match self {
            LocalizationBody::Message { .. } => "",
            LocalizationBody::Input { comment_label, .. }
            | LocalizationBody::Options { comment_label, .. } => comment_label,
        }
    }

    pub fn options(&self) -> &[OptionLocalization] {
        match self {
            LocalizationBody::Options { options, .. } => options,
            _ => &[],
        }
    }

    /// Validates this body against the question kind it localizes.
    /// The label is carried only for error reporting.
    pub fn check(&self, label: &str, kind: &QuestionKind) -> Result<()> {
        let shape_matches = matches!(
            (self, kind),
            (LocalizationBody::Message { .. }, QuestionKind::Message { .. })
                | (LocalizationBody::Input { .. }, QuestionKind::Input { .. })
                | (LocalizationBody::Options { .. }, QuestionKind::Select { .. })
                | (LocalizationBody::Options { .. }, QuestionKind::MultipleChoice { .. })
        );
        if !shape_matches {
            return Err(Error::LocalizationKindMismatch { label: label.to_string() });
        }

        // Only an input needs its text: it is the label of the input field.
        // A message or option localization may leave the text empty.
        if matches!(self, LocalizationBody::Input { .. }) && self.text().is_empty() {
            return Err(Error::TextMissing { label: label.to_string() });
        }

        let has_comment = kind.has_comment();
        if self.comment_label().is_empty() {
            if has_comment {
                return Err(Error::CommentLabelMissing { label: label.to_string() });
            }
        } else if !has_comment {
            return Err(Error::CommentLabelForbidden { label: label.to_string() });
        }

        if let Some(options) = kind.options() {
            self.check_options(label, options)?;
        }

        Ok(())
    }

    fn check_options(&self, label: &str, options: &[OptionDef]) -> Result<()> {
        let localized = self.options();
        if localized.len() != options.len() {
            return Err(Error::LocalizationOptionsSizeMismatch { label: label.to_string() });
        }

        for (definition, localization) in options.iter().zip(localized) {
            if localization.label.is_empty() {
                return Err(Error::OptionLabelEmpty { label: label.to_string() });
            }
            if definition.has_comment {
                if localization.comment_label.is_empty() {
                    return Err(Error::CommentLabelMissing { label: label.to_string() });
                }
            } else if !localization.comment_label.is_empty() {
                return Err(Error::CommentLabelForbidden { label: label.to_string() });
            }
        }

        Ok(())
    }
}

/// Localization of one question, referencing it by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionLocalization {
    pub question: QuestionId,
    pub body: LocalizationBody,
}

/// Per-language bag of question localizations for one questionnaire.
///
/// Question localizations are not necessarily in question order; the
/// `question` index on each entry is the mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionnaireLocalization {
    pub questionnaire: QuestionnaireId,
    /// The questionnaire change count at the last successful check; 0 until
    /// then, so a fresh localization is checked at least once.
    pub checked_change_count: u32,
    pub title: String,
    pub language: Language,
    pub name: String,
    pub entries: Vec<QuestionLocalization>,
}

impl QuestionnaireLocalization {
    pub fn new(
        questionnaire: QuestionnaireId,
        title: impl Into<String>,
        language: Language,
        name: impl Into<String>,
    ) -> Self {
        Self {
            questionnaire,
            checked_change_count: 0,
            title: title.into(),
            language,
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn find(&self, question: QuestionId) -> Option<&QuestionLocalization> {
        self.entries.iter().find(|entry| entry.question == question)
    }

    /// Completeness and redundancy check, lazily keyed on the questionnaire
    /// change count: a no-op when nothing changed since the last success.
    pub fn check(
        &mut self,
        questionnaire: &Questionnaire,
        templates: &dyn TemplateSource,
    ) -> Result<()> {
        if self.checked_change_count == questionnaire.change_count {
            return Ok(());
        }
        self.force_check(questionnaire, templates)?;
        self.checked_change_count = questionnaire.change_count;
        Ok(())
    }

    /// Every body-bearing question must have exactly one localization here;
    /// every template question must have its library localization for this
    /// language. Template-library localizations cannot be removed once
    /// created, so a successful check stays good.
    pub fn force_check(
        &self,
        questionnaire: &Questionnaire,
        templates: &dyn TemplateSource,
    ) -> Result<()> {
        let mut seen = vec![false; questionnaire.len()];
        for entry in &self.entries {
            let question = questionnaire.question(entry.question)?;
            if seen[entry.question.0] {
                return Err(Error::LocalizationDuplicate { label: question.label.clone() });
            }
            seen[entry.question.0] = true;
            entry.body.check(&question.label, &question.kind)?;
        }

        for (index, question) in questionnaire.questions.iter().enumerate() {
            if seen[index] {
                continue;
            }
            if question.has_inline_localization() {
                return Err(Error::LocalizationMissing { label: question.label.clone() });
            }
            if let QuestionKind::FromTemplate { template } = &question.kind
                && templates.template_localization(*template, self.language).is_none()
            {
                return Err(Error::TemplateLocalizationMissing {
                    label: question.label.clone(),
                });
            }
        }

        Ok(())
    }

    /// Lookup used while rendering questions and answers: the questionnaire
    /// localization first, then the template library for template questions.
    pub fn body_for<'a>(
        &'a self,
        question: &Question,
        id: QuestionId,
        templates: &'a dyn TemplateSource,
    ) -> Result<&'a LocalizationBody> {
        if let Some(entry) = self.find(id) {
            return Ok(&entry.body);
        }
        if let QuestionKind::FromTemplate { template } = &question.kind {
            return templates
                .template_localization(*template, self.language)
                .map(|l| &l.body)
                .ok_or_else(|| Error::TemplateLocalizationMissing {
                    label: question.label.clone(),
                });
        }
        Err(Error::LocalizationMissing { label: question.label.clone() })
    }
}
