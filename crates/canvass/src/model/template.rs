use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::model::localization::LocalizationBody;
use crate::model::question::QuestionKind;
use crate::store::{CategoryId, TemplateId};

/// Grouping node for the template library. Categories may nest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateCategory {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<CategoryId>,
}

/// A reusable question body. Its label is the library-wide unique name a
/// `FromTemplate` question refers to, unrelated to questionnaire labels.
/// The kind is always one of the body-bearing variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateQuestion {
    pub category: CategoryId,
    pub label: String,
    pub kind: QuestionKind,
}

impl TemplateQuestion {
    pub fn can_be_final(&self) -> bool {
        matches!(self.kind, QuestionKind::Message { .. })
    }
}

/// Per-(template, language) localization. Creation enforces uniqueness;
/// removal is forbidden so previously-validated questionnaire localizations
/// stay valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateLocalization {
    pub template: TemplateId,
    pub language: Language,
    pub body: LocalizationBody,
}

/// Lookup surface the compiler and interpreter need from the template
/// library. Implemented by the document store.
pub trait TemplateSource {
    fn template(&self, id: TemplateId) -> Option<&TemplateQuestion>;

    fn template_by_label(&self, label: &str) -> Option<(TemplateId, &TemplateQuestion)>;

    fn template_localization(
        &self,
        template: TemplateId,
        language: Language,
    ) -> Option<&TemplateLocalization>;
}
