use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::language::Language;
use crate::model::question::QuestionId;
use crate::store::{CampaignId, LocalizationId};

/// Client-reported position captured on start and on each answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    /// Client-side timestamp; the interview keeps its own server-side one.
    pub timestamp: i64,
}

/// One selected option: its 0-based position in the question's option list
/// and the respondent's comment, if the option admits one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Choice {
    pub index: usize,
    #[serde(default)]
    pub comment: String,
}

/// The typed response data, mirroring the question variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum AnswerBody {
    /// A message is acknowledged with an empty answer; that is the only way
    /// to progress past an interstitial message.
    Message,
    Input {
        input: String,
        #[serde(default)]
        comment: String,
    },
    Select {
        choice: Choice,
        #[serde(default)]
        comment: String,
    },
    MultipleChoice {
        choices: Vec<Choice>,
        #[serde(default)]
        comment: String,
    },
}

/// A recorded response. Timing is relative to the interview start; the
/// localization used to render the question is recoverable from the
/// interview's language, so only the question reference is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Answer {
    pub question: QuestionId,
    pub ip_address: String,
    /// Seconds since the previous answer (or the start).
    pub elapsed: i64,
    /// Seconds since the interview started.
    pub total_elapsed: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,
    pub body: AnswerBody,
}

impl Answer {
    pub fn timestamp(&self, interview_start: i64) -> i64 {
        interview_start + self.total_elapsed
    }
}

/// One step of interview history: an answer, or a loop delimiter recording
/// that the interpreter entered or closed a loop. A begin-loop entry does
/// not own its operand answer; replay re-resolves it from the stack, so
/// revising the operand never cascades into loop entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "$type", rename_all = "snake_case")]
pub enum Entry {
    Answer(Answer),
    BeginLoop { begin: QuestionId, index: usize },
    EndLoop { end: QuestionId },
}

impl Entry {
    /// The question this entry was recorded for.
    pub fn question(&self) -> QuestionId {
        match self {
            Entry::Answer(answer) => answer.question,
            Entry::BeginLoop { begin, .. } => *begin,
            Entry::EndLoop { end } => *end,
        }
    }

    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Entry::Answer(answer) => Some(answer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InterviewState {
    Initiated,
    Ongoing,
    Completed,
}

/// One respondent's walk through a questionnaire.
///
/// The localization reference is weak: removing the localization does not
/// remove the interview, and the language is kept so recorded answers stay
/// interpretable. `next_question` always points at a question that can be
/// shown, never at a loop delimiter, and stays on the final question once
/// the interview completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Interview {
    pub campaign: CampaignId,
    #[serde(default)]
    pub start_ip_address: String,
    #[serde(default)]
    pub start_timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_geolocation: Option<Geolocation>,
    #[serde(default)]
    pub interviewee_id: String,
    #[serde(default)]
    pub interviewer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localization: Option<LocalizationId>,
    pub history: Vec<Entry>,
    pub state: InterviewState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_question: Option<QuestionId>,
}

impl Interview {
    pub fn new(campaign: CampaignId) -> Self {
        Self {
            campaign,
            start_ip_address: String::new(),
            start_timestamp: 0,
            start_geolocation: None,
            interviewee_id: String::new(),
            interviewer_id: String::new(),
            language: None,
            localization: None,
            history: Vec::new(),
            state: InterviewState::Initiated,
            next_question: None,
        }
    }

    pub fn is_started(&self) -> bool {
        self.state != InterviewState::Initiated
    }

    pub fn is_completed(&self) -> bool {
        self.state == InterviewState::Completed
    }

    pub fn check_started(&self) -> Result<()> {
        if !self.is_started() {
            return Err(Error::InterviewNotStarted);
        }
        Ok(())
    }

    /// The position must hold a real answer, not a loop delimiter.
    pub fn find_answer(&self, index: usize) -> Result<&Answer> {
        self.history
            .get(index)
            .and_then(Entry::answer)
            .ok_or(Error::AnswerIndexMissing { index })
    }

    pub fn last_answer(&self) -> Option<&Answer> {
        self.history.iter().rev().find_map(Entry::answer)
    }

    /// Elapsed seconds since the last answer and since the start.
    pub fn elapsed_times(&self, now: i64) -> (i64, i64) {
        let total_elapsed = now - self.start_timestamp;
        let elapsed = match self.last_answer() {
            Some(answer) => now - answer.timestamp(self.start_timestamp),
            None => total_elapsed,
        };
        (elapsed, total_elapsed)
    }
}
