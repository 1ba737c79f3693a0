use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::language::Language;
use crate::spec::question::SourceQuestion;

/// An uploaded questionnaire. It carries the first localization inline: the
/// texts and option labels on its questions belong to `language`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceQuestionnaire {
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub language: Language,
    /// Ordered; transitions may only point forward in this order.
    pub questions: Vec<SourceQuestion>,
}
