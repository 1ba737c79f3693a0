pub mod answer;
pub mod localization;
pub mod question;
pub mod questionnaire;
pub mod template;
pub mod transition;

pub use answer::{AnswerPayload, ChoicePayload};
pub use localization::{SourceOptionLocalization, SourceQuestionLocalization, SourceQuestionnaireLocalization};
pub use question::{
    SourceBeginLoop, SourceEndLoop, SourceFromTemplate, SourceFunction, SourceInput,
    SourceMessage, SourceMultipleChoice, SourceOption, SourceQuestion, SourceSelect, SourceText,
};
pub use questionnaire::SourceQuestionnaire;
pub use template::{SourceTemplateLocalization, SourceTemplateQuestion};
pub use transition::SourceTransition;
