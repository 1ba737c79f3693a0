//! Localized questionnaires with conditional control flow.
//!
//! A source questionnaire is compiled into a checked question graph plus its
//! first localization; campaigns lock the graph and bind it to interviews,
//! and the interpreter walks respondents through it one question at a time,
//! evaluating transitions against previous answers, iterating loops over
//! list-valued answers, and resectioning history minimally when an answer
//! is revised.

pub mod compile;
pub mod error;
pub mod expr;
pub mod interview;
pub mod language;
pub mod model;
pub mod ops;
pub mod revise;
pub mod spec;
pub mod stack;
pub mod store;
pub mod text;
pub mod view;

/// Name under which snippets see the interview's numeric language code.
pub const LANGUAGE_VAR: &str = "language";
/// Name under which snippets see the two-letter language code.
pub const LANGUAGE_STR2_VAR: &str = "language_str2";

pub use compile::{compile, compile_localization, decompile, decompile_localization, validate_label};
pub use error::{Error, Result};
pub use expr::{Expr, ExprError, Script};
pub use interview::{Interpreter, SubmitMeta};
pub use language::Language;
pub use model::{
    Answer, AnswerBody, Campaign, Choice, Entry, Geolocation, Interview, InterviewState,
    LocalizationBody, Question, QuestionId, QuestionKind, Questionnaire,
    QuestionnaireLocalization, TemplateQuestion, TemplateSource,
};
pub use ops::{Clock, FixedClock, SystemClock};
pub use spec::{
    AnswerPayload, ChoicePayload, SourceQuestion, SourceQuestionLocalization,
    SourceQuestionnaire, SourceQuestionnaireLocalization, SourceTemplateLocalization,
    SourceTemplateQuestion,
};
pub use stack::{EvalCtx, Stack};
pub use store::{
    CampaignId, CategoryId, InterviewId, LocalizationId, MemoryStore, QuestionnaireId, TemplateId,
    TemplateLocalizationId,
};
pub use view::{
    AnswerData, InterviewData, Languages, LocalizedAnswerAndMore, LocalizedAnswerData,
    LocalizedInterviewData, LocalizedQuestion, LocalizedQuestionBody,
};
