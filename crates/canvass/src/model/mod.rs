pub mod campaign;
pub mod interview;
pub mod localization;
pub mod question;
pub mod questionnaire;
pub mod template;

pub use campaign::Campaign;
pub use interview::{Answer, AnswerBody, Choice, Entry, Geolocation, Interview, InterviewState};
pub use localization::{
    LocalizationBody, OptionLocalization, QuestionLocalization, QuestionnaireLocalization,
};
pub use question::{
    Function, MultipleChoiceKind, OptionDef, Question, QuestionId, QuestionInfo, QuestionKind,
    TextBody, Transition,
};
pub use questionnaire::Questionnaire;
pub use template::{TemplateCategory, TemplateLocalization, TemplateQuestion, TemplateSource};
