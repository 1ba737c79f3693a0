use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::question::{LoopKind, Question, QuestionId};

/// The compiled question graph. Read-only once a campaign locks it; to edit
/// a locked questionnaire, duplicate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Questionnaire {
    pub code: String,
    pub name: String,
    pub logo: String,
    pub questions: Vec<Question>,
    pub locked: bool,
    /// Starts at 1 so that a localization (whose own counter starts at 0)
    /// is checked at least once.
    pub change_count: u32,
}

impl Questionnaire {
    pub fn new(code: impl Into<String>, name: impl Into<String>, logo: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            logo: logo.into(),
            questions: Vec::new(),
            locked: false,
            change_count: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn question(&self, id: QuestionId) -> Result<&Question> {
        self.questions.get(id.0).ok_or(Error::Internal)
    }

    pub fn find_question(&self, label: &str) -> Option<QuestionId> {
        self.questions
            .iter()
            .position(|q| q.label == label)
            .map(QuestionId)
    }

    pub fn first_question(&self) -> Result<QuestionId> {
        if self.questions.is_empty() {
            return Err(Error::QuestionnaireEmpty);
        }
        Ok(QuestionId(0))
    }

    pub fn next_in_order(&self, id: QuestionId) -> Option<QuestionId> {
        let next = id.0 + 1;
        (next < self.questions.len()).then_some(QuestionId(next))
    }

    /// The end-loop paired with a begin-loop, memoized at compile time.
    pub fn matching_end_loop(&self, begin: QuestionId) -> Result<QuestionId> {
        self.question(begin)?.info.matching.ok_or(Error::Internal)
    }

    pub fn check_lock(&self) -> Result<()> {
        if self.locked {
            return Err(Error::QuestionnaireLocked);
        }
        Ok(())
    }

    /// Runs the checks deferred to campaign creation. A locked questionnaire
    /// passed them when it was first locked.
    pub fn check(&self) -> Result<()> {
        if self.locked {
            return Ok(());
        }
        self.check_orphans()
    }

    /// Every question but the first must be the destination of a transition.
    pub fn check_orphans(&self) -> Result<()> {
        if self.questions.len() <= 1 {
            return Ok(());
        }

        let mut reached = BTreeSet::new();
        for (index, question) in self.questions.iter().enumerate() {
            if index > 0 && !reached.contains(&QuestionId(index)) {
                return Err(Error::Orphan { label: question.label.clone() });
            }
            for transition in &question.transitions {
                reached.insert(transition.destination);
            }
        }

        Ok(())
    }

    /// Unlocked deep copy with fresh identity. Question references are arena
    /// indices, so the copy needs no relinking pass.
    pub fn duplicate(
        &self,
        code: impl Into<String>,
        name: impl Into<String>,
        logo: impl Into<String>,
    ) -> Questionnaire {
        Questionnaire {
            code: code.into(),
            name: name.into(),
            logo: logo.into(),
            questions: self.questions.clone(),
            locked: false,
            change_count: 1,
        }
    }

    /// Rank of a question, from 1 to the number of questions.
    pub fn rank(&self, id: QuestionId) -> usize {
        id.0.min(self.questions.len().saturating_sub(1)) + 1
    }

    /// Integral progress percentage. The final message reports 100.
    pub fn progress(&self, id: QuestionId) -> u8 {
        if self.questions.is_empty() {
            return 100;
        }
        ((self.rank(id) as f32 / self.questions.len() as f32) * 100.0) as u8
    }

    /// Iterate over begin-loop questions, used by compile-time checks.
    pub fn begin_loops(&self) -> impl Iterator<Item = (QuestionId, &Question)> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| matches!(q.loop_kind(), LoopKind::BeginLoop))
            .map(|(i, q)| (QuestionId(i), q))
    }
}
