#![allow(dead_code)]

use serde_json::{Value, json};

use canvass::ops::{self, CampaignUpload, FixedClock, ReviseAnswer, StartInterview, SubmitAnswer};
use canvass::view::LocalizedQuestion;
use canvass::{
    AnswerPayload, ChoicePayload, Interview, InterviewId, Language, MemoryStore, Result, Script,
    SourceQuestionnaire,
};

pub fn source(questions: Value) -> SourceQuestionnaire {
    serde_json::from_value(json!({
        "name": "fixture",
        "title": "Fixture",
        "language": 1,
        "questions": questions
    }))
    .expect("fixture should deserialize")
}

/// One in-memory deployment: store, script engine, pinned clock, and a
/// single prepared interview on a fresh campaign.
pub struct Harness {
    pub store: MemoryStore,
    pub engine: Script,
    pub clock: FixedClock,
    pub interview: InterviewId,
}

impl Harness {
    /// Compiles the questionnaire, creates a campaign on it, and prepares
    /// one interview.
    pub fn launch(questions: Value) -> Harness {
        Harness::launch_source(source(questions))
    }

    pub fn launch_source(source: SourceQuestionnaire) -> Harness {
        let mut store = MemoryStore::new();
        let mut engine = Script::new();
        let (questionnaire, _) = ops::upload_questionnaire(&mut store, &mut engine, &source)
            .expect("fixture should compile");
        let campaign = ops::create_campaign(
            &mut store,
            &CampaignUpload {
                name: "campaign".into(),
                questionnaire,
                start: 0,
                duration: 0,
                interview_lifespan: 0,
            },
        )
        .expect("campaign should be created");
        let interview =
            ops::prepare_interview(&mut store, campaign).expect("interview should be prepared");

        Harness { store, engine, clock: FixedClock(1_000), interview }
    }

    pub fn start(&mut self) -> LocalizedQuestion {
        self.try_start(Language::ENGLISH).expect("interview should start")
    }

    pub fn try_start(&mut self, language: Language) -> Result<LocalizedQuestion> {
        ops::start_interview(
            &mut self.store,
            &mut self.engine,
            &self.clock,
            &StartInterview {
                interview: self.interview,
                interviewee_id: "ivy".into(),
                interviewer_id: String::new(),
                language,
                ip_address: "198.51.100.7".into(),
                geolocation: None,
            },
        )
    }

    pub fn submit(&mut self, answer: AnswerPayload) -> LocalizedQuestion {
        self.try_submit(answer).expect("answer should be accepted")
    }

    pub fn try_submit(&mut self, answer: AnswerPayload) -> Result<LocalizedQuestion> {
        ops::submit_answer(
            &mut self.store,
            &mut self.engine,
            &self.clock,
            &SubmitAnswer {
                interview: self.interview,
                answer,
                ip_address: "198.51.100.7".into(),
                geolocation: None,
            },
        )
    }

    pub fn revise(&mut self, index: usize, answer: AnswerPayload) -> LocalizedQuestion {
        self.try_revise(index, answer).expect("revision should be accepted")
    }

    pub fn try_revise(&mut self, index: usize, answer: AnswerPayload) -> Result<LocalizedQuestion> {
        ops::revise_answer(
            &mut self.store,
            &mut self.engine,
            &self.clock,
            &ReviseAnswer {
                interview: self.interview,
                index,
                answer,
                ip_address: "198.51.100.7".into(),
                geolocation: None,
            },
        )
    }

    pub fn interview(&self) -> &Interview {
        self.store.interview(self.interview).expect("interview should exist")
    }
}

pub fn message_answer() -> AnswerPayload {
    AnswerPayload::Message
}

pub fn input_answer(input: &str) -> AnswerPayload {
    AnswerPayload::Input { input: input.into(), comment: String::new() }
}

pub fn select_answer(index: usize) -> AnswerPayload {
    AnswerPayload::Select {
        choice: ChoicePayload { index, comment: String::new() },
        comment: String::new(),
    }
}

pub fn multiple_answer(indexes: &[usize]) -> AnswerPayload {
    AnswerPayload::MultipleChoice {
        choices: indexes
            .iter()
            .map(|index| ChoicePayload { index: *index, comment: String::new() })
            .collect(),
        comment: String::new(),
    }
}
