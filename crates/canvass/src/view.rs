use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::language::Language;
use crate::model::interview::{Answer, AnswerBody, Geolocation, Interview, InterviewState};
use crate::model::question::{QuestionId, QuestionKind};
use crate::model::questionnaire::Questionnaire;
use crate::spec::answer::ChoicePayload;
use crate::spec::question::SourceOption;
use crate::stack::{EvalCtx, Stack};
use crate::text::calculate_text;

/// A question rendered for one respondent: localized text with escapes
/// resolved, plus everything the client needs to collect the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedQuestion {
    #[serde(flatten)]
    pub body: LocalizedQuestionBody,
    pub label: String,
    pub logo: String,
    pub title: String,
    pub style: String,
    pub text: String,
    pub progress: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedChoices {
    #[serde(default)]
    pub comment_label: String,
    pub options: Vec<SourceOption>,
    pub randomize: bool,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum LocalizedQuestionBody {
    Message {
        #[serde(rename = "final")]
        is_final: bool,
    },
    Input {
        #[serde(default)]
        comment_label: String,
        optional: bool,
    },
    Select {
        #[serde(default)]
        comment_label: String,
        options: Vec<SourceOption>,
        randomize: bool,
    },
    SelectAtMost(LocalizedChoices),
    SelectExactly(LocalizedChoices),
    RankAtMost(LocalizedChoices),
    RankExactly(LocalizedChoices),
}

/// Language-free answer record, as downloaded for automated processing and
/// as injected into transition conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerData {
    #[serde(flatten)]
    pub body: AnswerDataBody,
    pub label: String,
    pub ip_address: String,
    pub timestamp: i64,
    pub elapsed: i64,
    pub total_elapsed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum AnswerDataBody {
    Message,
    Input {
        input: String,
        #[serde(default)]
        comment: String,
    },
    Select {
        choice: ChoicePayload,
        #[serde(default)]
        comment: String,
    },
    MultipleChoice {
        choices: Vec<ChoicePayload>,
        #[serde(default)]
        comment: String,
    },
}

/// Answer paired with the question's localized texts, as shown back to a
/// respondent and as injected into text functions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedAnswerData {
    #[serde(flatten)]
    pub body: LocalizedAnswerBody,
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum LocalizedAnswerBody {
    Message,
    Input {
        #[serde(default)]
        comment_label: String,
        #[serde(default)]
        comment: String,
        input: String,
    },
    Select {
        #[serde(default)]
        comment_label: String,
        #[serde(default)]
        comment: String,
        options: Vec<SourceOption>,
        choice: ChoicePayload,
    },
    MultipleChoice {
        #[serde(default)]
        comment_label: String,
        #[serde(default)]
        comment: String,
        options: Vec<SourceOption>,
        choices: Vec<ChoicePayload>,
    },
}

/// A localized answer plus its history index and whether more answers exist
/// in the direction it was fetched from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedAnswerAndMore {
    pub answer: LocalizedAnswerData,
    pub index: usize,
    pub more: bool,
}

/// Whole-interview download without any language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InterviewData {
    pub interviewee: String,
    pub interviewer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    pub ip_address: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
    pub answers: Vec<AnswerData>,
    pub state: InterviewState,
}

/// Whole-interview download in a chosen language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedInterviewData {
    pub interviewee: String,
    pub interviewer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    pub answers: Vec<LocalizedAnswerData>,
    pub state: InterviewState,
}

/// The languages an interview can be taken in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Languages {
    pub logo: String,
    pub languages: Vec<Language>,
}

fn choice_payloads(choices: &[crate::model::interview::Choice]) -> Vec<ChoicePayload> {
    choices
        .iter()
        .map(|choice| ChoicePayload { index: choice.index, comment: choice.comment.clone() })
        .collect()
}

fn option_views(options: &[crate::model::localization::OptionLocalization]) -> Vec<SourceOption> {
    options
        .iter()
        .map(|option| SourceOption {
            label: option.label.clone(),
            comment_label: option.comment_label.clone(),
        })
        .collect()
}

/// Removes the `$type` discriminant so snippets see a plain object.
fn strip_type_tag(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        map.remove("$type");
    }
    value
}

/// Language-free record of an answer.
pub fn answer_data(
    questionnaire: &Questionnaire,
    answer: &Answer,
    interview_start: i64,
) -> Result<AnswerData> {
    let label = questionnaire.question(answer.question)?.label.clone();
    let body = match &answer.body {
        AnswerBody::Message => AnswerDataBody::Message,
        AnswerBody::Input { input, comment } => {
            AnswerDataBody::Input { input: input.clone(), comment: comment.clone() }
        }
        AnswerBody::Select { choice, comment } => AnswerDataBody::Select {
            choice: ChoicePayload { index: choice.index, comment: choice.comment.clone() },
            comment: comment.clone(),
        },
        AnswerBody::MultipleChoice { choices, comment } => AnswerDataBody::MultipleChoice {
            choices: choice_payloads(choices),
            comment: comment.clone(),
        },
    };
    Ok(AnswerData {
        body,
        label,
        ip_address: answer.ip_address.clone(),
        timestamp: answer.timestamp(interview_start),
        elapsed: answer.elapsed,
        total_elapsed: answer.total_elapsed,
        geolocation: answer.geolocation.clone(),
    })
}

/// The value injected for a transition-condition parameter.
pub fn answer_argument(
    questionnaire: &Questionnaire,
    answer: &Answer,
    interview_start: i64,
) -> Result<Value> {
    let data = answer_data(questionnaire, answer, interview_start)?;
    Ok(strip_type_tag(serde_json::to_value(data).map_err(|_| Error::Internal)?))
}

/// Localized rendering of an answer, in the interview's language.
pub fn localized_answer(
    ctx: &EvalCtx<'_>,
    expr: &mut dyn Expr,
    stack: &Stack,
    answer: &Answer,
) -> Result<LocalizedAnswerData> {
    let question = ctx.questionnaire.question(answer.question)?;
    let localization = ctx.localization.body_for(question, answer.question, ctx.templates)?;
    let kind = question.resolved_kind(ctx.templates)?;
    let body = kind.body().ok_or(Error::Internal)?;
    let text = calculate_text(ctx, expr, stack, &question.label, body, localization.text())?;

    let body = match &answer.body {
        AnswerBody::Message => LocalizedAnswerBody::Message,
        AnswerBody::Input { input, comment } => LocalizedAnswerBody::Input {
            comment_label: localization.comment_label().to_string(),
            comment: comment.clone(),
            input: input.clone(),
        },
        AnswerBody::Select { choice, comment } => LocalizedAnswerBody::Select {
            comment_label: localization.comment_label().to_string(),
            comment: comment.clone(),
            options: option_views(localization.options()),
            choice: ChoicePayload { index: choice.index, comment: choice.comment.clone() },
        },
        AnswerBody::MultipleChoice { choices, comment } => LocalizedAnswerBody::MultipleChoice {
            comment_label: localization.comment_label().to_string(),
            comment: comment.clone(),
            options: option_views(localization.options()),
            choices: choice_payloads(choices),
        },
    };

    Ok(LocalizedAnswerData { body, label: question.label.clone(), text })
}

/// The value injected for a text-function parameter or a loop operand.
/// Localized data is used so snippets can splice localized labels into
/// parametric text.
pub fn localized_answer_argument(
    ctx: &EvalCtx<'_>,
    expr: &mut dyn Expr,
    stack: &Stack,
    answer: &Answer,
) -> Result<Value> {
    let data = localized_answer(ctx, expr, stack, answer)?;
    Ok(strip_type_tag(serde_json::to_value(data).map_err(|_| Error::Internal)?))
}

/// Localized rendering of a question about to be asked.
pub fn localized_question(
    ctx: &EvalCtx<'_>,
    expr: &mut dyn Expr,
    stack: &Stack,
    id: QuestionId,
) -> Result<LocalizedQuestion> {
    let question = ctx.questionnaire.question(id)?;
    let localization = ctx.localization.body_for(question, id, ctx.templates)?;
    let kind = question.resolved_kind(ctx.templates)?;
    let body = kind.body().ok_or(Error::Internal)?;
    let text = calculate_text(ctx, expr, stack, &question.label, body, localization.text())?;
    let mut progress = ctx.questionnaire.progress(id);

    let view_body = match kind {
        QuestionKind::Message { .. } => {
            let is_final = question.transitions.is_empty();
            if is_final {
                progress = 100;
            }
            LocalizedQuestionBody::Message { is_final }
        }
        QuestionKind::Input { optional, .. } => LocalizedQuestionBody::Input {
            comment_label: localization.comment_label().to_string(),
            optional: *optional,
        },
        QuestionKind::Select { randomize, .. } => LocalizedQuestionBody::Select {
            comment_label: localization.comment_label().to_string(),
            options: option_views(localization.options()),
            randomize: *randomize,
        },
        QuestionKind::MultipleChoice { kind, randomize, limit, .. } => {
            let choices = LocalizedChoices {
                comment_label: localization.comment_label().to_string(),
                options: option_views(localization.options()),
                randomize: *randomize,
                limit: *limit,
            };
            use crate::model::question::MultipleChoiceKind::*;
            match kind {
                SelectAtMost => LocalizedQuestionBody::SelectAtMost(choices),
                SelectExactly => LocalizedQuestionBody::SelectExactly(choices),
                RankAtMost => LocalizedQuestionBody::RankAtMost(choices),
                RankExactly => LocalizedQuestionBody::RankExactly(choices),
            }
        }
        _ => return Err(Error::Internal),
    };

    Ok(LocalizedQuestion {
        body: view_body,
        label: question.label.clone(),
        logo: ctx.questionnaire.logo.clone(),
        title: ctx.localization.title.clone(),
        style: body.style.clone(),
        text,
        progress,
    })
}

/// Download view without localization.
pub fn interview_data(questionnaire: &Questionnaire, interview: &Interview) -> Result<InterviewData> {
    let mut answers = Vec::new();
    for entry in &interview.history {
        if let Some(answer) = entry.answer() {
            answers.push(answer_data(questionnaire, answer, interview.start_timestamp)?);
        }
    }
    Ok(InterviewData {
        interviewee: interview.interviewee_id.clone(),
        interviewer: interview.interviewer_id.clone(),
        language: interview.language,
        ip_address: interview.start_ip_address.clone(),
        timestamp: interview.start_timestamp,
        geolocation: interview.start_geolocation.clone(),
        answers,
        state: interview.state,
    })
}
