use thiserror::Error;

use crate::expr::ExprError;

pub type Result<T> = std::result::Result<T, Error>;

/// Domain errors raised by the compiler, the localization checks, and the
/// interview interpreter. Every variant carries a stable short code so
/// callers can dispatch without parsing the human message.
#[derive(Debug, Error)]
pub enum Error {
    // Source questionnaire schema errors.
    #[error("question label '{label}' is invalid")]
    LabelInvalid { label: String },
    #[error("question label '{label}' is a duplicate")]
    LabelDuplicate { label: String },
    #[error("question label '{label}' does not exist")]
    LabelUnknown { label: String },
    #[error("loop is not balanced at question '{label}'")]
    LoopNotBalanced { label: String },
    #[error("loop opened at question '{label}' is not closed")]
    LoopNotClosed { label: String },
    #[error("question '{label}' is an orphan")]
    Orphan { label: String },
    #[error("source questionnaire has no questions")]
    QuestionnaireEmpty,
    #[error("source questionnaire name is empty")]
    QuestionnaireNameEmpty,
    #[error("question '{label}' has no text")]
    TextMissing { label: String },
    #[error("question '{label}' has invalid options")]
    OptionsInvalid { label: String },
    #[error("non-terminal question '{label}' has no question to transition to")]
    TransitionMissing { label: String },
    #[error("transitions of question '{label}' lack a final catch-all (last destination '{destination}')")]
    TransitionsLackCatchAll { label: String, destination: String },
    #[error("question '{label}' has a catch-all transition to '{destination}' before the last position")]
    CatchAllNotLast { label: String, destination: String },
    #[error("question '{label}' transitions to unknown question '{destination}'")]
    TransitionDestinationMissing { label: String, destination: String },
    #[error("question '{label}' transitions to itself")]
    TransitionToSelf { label: String },
    #[error("question '{label}' transitions backwards to '{destination}'")]
    TransitionToPrevious { label: String, destination: String },
    #[error("question '{label}' transitions across a loop boundary to '{destination}'")]
    TransitionAcrossLoop { label: String, destination: String },
    #[error("begin-loop '{label}' transitions to another begin-loop '{destination}'")]
    BeginLoopToBeginLoop { label: String, destination: String },
    #[error("transition of question '{label}' to '{destination}' has both a condition and code")]
    TransitionConditionAndCode { label: String, destination: String },
    #[error("transition condition of question '{label}' to '{destination}' does not compile")]
    TransitionConditionInvalid { label: String, destination: String },
    #[error("begin-loop '{label}' iterates over unknown question '{operand}'")]
    BeginLoopOperandUnknown { label: String, operand: String },
    #[error("begin-loop '{label}' iterates over a question in a different loop nest")]
    BeginLoopOperandWrongNest { label: String },
    #[error("begin-loop '{label}' iterates over a question that admits no answer")]
    BeginLoopOperandUnanswerable { label: String },
    #[error("begin-loop '{label}' has an invalid loop variable name")]
    BeginLoopVariableInvalid { label: String },
    #[error("begin-loop '{label}' has no operand expression")]
    BeginLoopOperandEmpty { label: String },

    // Function errors (transition conditions and text functions).
    #[error("a function of question '{label}' has no code")]
    FunctionCodeMissing { label: String },
    #[error("a function parameter of question '{label}' refers to an unknown question")]
    FunctionParameterMissing { label: String },
    #[error("a function parameter of question '{label}' refers to the question bearing it")]
    FunctionParameterSelf { label: String },
    #[error("a function parameter of question '{label}' refers to a subsequent question")]
    FunctionParameterSubsequent { label: String },
    #[error("a function parameter of question '{label}' refers to a question in a different loop nest")]
    FunctionParameterWrongNest { label: String },
    #[error("a parametric text of question '{label}' calls a function index that does not exist")]
    FunctionCallOutOfBounds { label: String },

    // Localization errors.
    #[error("question '{label}' has no localization")]
    LocalizationMissing { label: String },
    #[error("question '{label}' has more than one localization")]
    LocalizationDuplicate { label: String },
    #[error("localization of question '{label}' does not match the question shape")]
    LocalizationKindMismatch { label: String },
    #[error("localization of question '{label}' has an incorrect number of options")]
    LocalizationOptionsSizeMismatch { label: String },
    #[error("an option localization of question '{label}' has an empty label")]
    OptionLabelEmpty { label: String },
    #[error("localization of question '{label}' is missing a comment label")]
    CommentLabelMissing { label: String },
    #[error("localization of question '{label}' must not carry a comment label")]
    CommentLabelForbidden { label: String },
    #[error("no questionnaire localization exists for the requested language")]
    QuestionnaireLocalizationMissing,
    #[error("template question '{label}' has no localization for the requested language")]
    TemplateLocalizationMissing { label: String },
    #[error("a localization for that template question and language already exists")]
    TemplateLocalizationExists,
    #[error("template question localizations cannot be removed")]
    TemplateLocalizationRemovalForbidden,
    #[error("language code is not valid")]
    LanguageInvalid,

    // Template library errors.
    #[error("template question '{label}' does not exist")]
    TemplateMissing { label: String },
    #[error("a template question labelled '{label}' already exists")]
    TemplateExists { label: String },
    #[error("template question category does not exist")]
    TemplateCategoryMissing,
    #[error("template question localization does not exist")]
    TemplateLocalizationUnknown,

    // Runtime errors.
    #[error("questionnaire does not exist")]
    QuestionnaireMissing,
    #[error("questionnaire is locked, a campaign has been created")]
    QuestionnaireLocked,
    #[error("campaign does not exist")]
    CampaignMissing,
    #[error("campaign expired")]
    CampaignExpired,
    #[error("campaign is not yet active")]
    CampaignNotYetActive,
    #[error("interview does not exist")]
    InterviewMissing,
    #[error("interview is not started")]
    InterviewNotStarted,
    #[error("interview is already started")]
    InterviewAlreadyStarted,
    #[error("interview is already completed")]
    InterviewAlreadyCompleted,
    #[error("answer body is incorrect")]
    AnswerIncorrect,
    #[error("selection is invalid")]
    SelectionInvalid,
    #[error("no answer exists at history index {index}")]
    AnswerIndexMissing { index: usize },
    #[error("loop variable used in text of question '{label}' is unknown")]
    LoopVariableUnknown { label: String },

    #[error(transparent)]
    Script(#[from] ExprError),
    #[error("internal error")]
    Internal,
}

impl Error {
    /// Stable short code for wire-level error dispatch.
    pub fn code(&self) -> &'static str {
        match self {
            Error::LabelInvalid { .. } => "q_label_invalid",
            Error::LabelDuplicate { .. } => "q_label_duplicate",
            Error::LabelUnknown { .. } => "q_label_unknown",
            Error::LoopNotBalanced { .. } => "q_loop_not_balanced",
            Error::LoopNotClosed { .. } => "q_loop_not_closed",
            Error::Orphan { .. } => "q_orphan",
            Error::QuestionnaireEmpty => "qq_no_questions",
            Error::QuestionnaireNameEmpty => "qq_name_empty",
            Error::TextMissing { .. } => "q_text_missing",
            Error::OptionsInvalid { .. } => "q_options_invalid",
            Error::TransitionMissing { .. } => "q_transition_missing",
            Error::TransitionsLackCatchAll { .. } => "q_transitions_lack_catch_all",
            Error::CatchAllNotLast { .. } => "q_catch_all_not_last",
            Error::TransitionDestinationMissing { .. } => "q_transition_destination_missing",
            Error::TransitionToSelf { .. } => "q_transition_to_self",
            Error::TransitionToPrevious { .. } => "q_transition_to_previous",
            Error::TransitionAcrossLoop { .. } => "q_transition_across_loop",
            Error::BeginLoopToBeginLoop { .. } => "q_begin_loop_to_begin_loop",
            Error::TransitionConditionAndCode { .. } => "q_transition_condition_and_code",
            Error::TransitionConditionInvalid { .. } => "q_transition_condition_invalid",
            Error::BeginLoopOperandUnknown { .. } => "q_loop_operand_unknown",
            Error::BeginLoopOperandWrongNest { .. } => "q_loop_operand_wrong_nest",
            Error::BeginLoopOperandUnanswerable { .. } => "q_loop_operand_unanswerable",
            Error::BeginLoopVariableInvalid { .. } => "q_loop_variable_invalid",
            Error::BeginLoopOperandEmpty { .. } => "q_loop_operand_empty",
            Error::FunctionCodeMissing { .. } => "fn_code_missing",
            Error::FunctionParameterMissing { .. } => "fn_parameter_missing",
            Error::FunctionParameterSelf { .. } => "fn_parameter_self",
            Error::FunctionParameterSubsequent { .. } => "fn_parameter_subsequent",
            Error::FunctionParameterWrongNest { .. } => "fn_parameter_wrong_nest",
            Error::FunctionCallOutOfBounds { .. } => "fn_call_out_of_bounds",
            Error::LocalizationMissing { .. } => "l10n_missing",
            Error::LocalizationDuplicate { .. } => "l10n_duplicate",
            Error::LocalizationKindMismatch { .. } => "l10n_kind_mismatch",
            Error::LocalizationOptionsSizeMismatch { .. } => "l10n_options_size_mismatch",
            Error::OptionLabelEmpty { .. } => "l10n_option_label_empty",
            Error::CommentLabelMissing { .. } => "l10n_comment_missing",
            Error::CommentLabelForbidden { .. } => "l10n_comment_forbidden",
            Error::QuestionnaireLocalizationMissing => "qq_l10n_missing",
            Error::TemplateLocalizationMissing { .. } => "tq_l10n_missing",
            Error::TemplateLocalizationExists => "tq_l10n_exists",
            Error::TemplateLocalizationRemovalForbidden => "tq_l10n_removal_forbidden",
            Error::LanguageInvalid => "language_invalid",
            Error::TemplateMissing { .. } => "tq_missing",
            Error::TemplateExists { .. } => "tq_exists",
            Error::TemplateCategoryMissing => "tq_category_missing",
            Error::TemplateLocalizationUnknown => "tq_l10n_unknown",
            Error::QuestionnaireMissing => "qq_missing",
            Error::QuestionnaireLocked => "qq_locked",
            Error::CampaignMissing => "campaign_missing",
            Error::CampaignExpired => "campaign_expired",
            Error::CampaignNotYetActive => "campaign_not_yet_active",
            Error::InterviewMissing => "interview_missing",
            Error::InterviewNotStarted => "interview_not_started",
            Error::InterviewAlreadyStarted => "interview_already_started",
            Error::InterviewAlreadyCompleted => "interview_completed",
            Error::AnswerIncorrect => "answer_incorrect",
            Error::SelectionInvalid => "selection_invalid",
            Error::AnswerIndexMissing { .. } => "answer_index_missing",
            Error::LoopVariableUnknown { .. } => "loop_variable_unknown",
            Error::Script(_) => "script_error",
            Error::Internal => "internal_error",
        }
    }
}
