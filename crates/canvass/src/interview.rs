use serde_json::Value;

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprError};
use crate::model::interview::{
    Answer, AnswerBody, Choice, Entry, Geolocation, Interview, InterviewState,
};
use crate::model::question::{LoopKind, QuestionId, QuestionKind};
use crate::stack::{BeginOutcome, EvalCtx, Stack};
use crate::view::{
    self, LocalizedAnswerAndMore, LocalizedInterviewData, LocalizedQuestion,
};
use crate::spec::answer::AnswerPayload;

/// Request-scoped capture attached to a submitted or revised answer.
#[derive(Debug, Clone, Default)]
pub struct SubmitMeta {
    pub ip_address: String,
    pub geolocation: Option<Geolocation>,
    pub now: i64,
}

/// The stateful engine walking one interview through its questionnaire.
/// It owns no documents: the context borrows the compiled graph and the
/// localization, and interview documents are passed per call.
pub struct Interpreter<'a> {
    pub ctx: EvalCtx<'a>,
    pub expr: &'a mut dyn Expr,
}

impl<'a> Interpreter<'a> {
    pub fn new(ctx: EvalCtx<'a>, expr: &'a mut dyn Expr) -> Self {
        Self { ctx, expr }
    }

    /// Rebuilds the stack by replaying history entries `[0, upto)`.
    pub fn build_stack(&mut self, interview: &Interview, upto: usize) -> Result<Stack> {
        let mut stack = Stack::new();
        for entry in &interview.history[..upto] {
            stack.replay_entry(&self.ctx, self.expr, entry)?;
        }
        Ok(stack)
    }

    /// Evaluates a question's transitions in order and returns the first
    /// destination whose condition is absent or truthy. Conditions see one
    /// binding per parameter question: the plain answer data, or null when
    /// the transitions skipped that question. A well-formed non-terminal
    /// question always ends in a catch-all, so this cannot fall through.
    pub fn run_transitions(
        &mut self,
        stack: &Stack,
        interview_start: i64,
        question: QuestionId,
    ) -> Result<QuestionId> {
        let q = self.ctx.questionnaire.question(question)?;

        for transition in &q.transitions {
            let Some(condition) = &transition.condition else {
                return Ok(transition.destination);
            };
            if condition.code.is_empty() {
                return Ok(transition.destination);
            }

            for parameter in &condition.parameters {
                let name = self.ctx.questionnaire.question(*parameter)?.label.clone();
                let value = match stack.find_answer(*parameter) {
                    Some(answer) => {
                        view::answer_argument(self.ctx.questionnaire, answer, interview_start)?
                    }
                    None => Value::Null,
                };
                self.expr.inject(&name, value);
            }

            let value = match self.expr.execute(&condition.code) {
                Ok(value) => value,
                Err(ExprError::Undefined) => Value::Null,
                Err(err) => return Err(err.into()),
            };
            if self.expr.is_truthy(&value) {
                return Ok(transition.destination);
            }
        }

        Err(Error::Internal)
    }

    /// Completion tracks the next question: landing on a terminal question
    /// completes the interview, and a revision that reopens questions past
    /// a terminal one puts it back in flight.
    pub fn set_next_question(&self, interview: &mut Interview, question: QuestionId) -> Result<()> {
        interview.state = if self
            .ctx
            .questionnaire
            .question(question)?
            .is_final(self.ctx.templates)
        {
            InterviewState::Completed
        } else {
            InterviewState::Ongoing
        };
        interview.next_question = Some(question);
        Ok(())
    }

    /// Fixes the interview on its first question and renders it. The caller
    /// has already verified the campaign window and checked the
    /// localization.
    pub fn start(
        &mut self,
        interview: &mut Interview,
        localization_id: crate::store::LocalizationId,
        interviewee_id: String,
        interviewer_id: String,
        meta: SubmitMeta,
    ) -> Result<LocalizedQuestion> {
        if interview.state != InterviewState::Initiated {
            return Err(Error::InterviewAlreadyStarted);
        }

        interview.start_ip_address = meta.ip_address;
        interview.start_timestamp = meta.now;
        interview.start_geolocation = meta.geolocation;
        interview.interviewee_id = interviewee_id;
        interview.interviewer_id = interviewer_id;
        interview.language = Some(self.ctx.language);
        interview.localization = Some(localization_id);
        interview.state = InterviewState::Ongoing;

        // The first question cannot be a loop delimiter: a begin-loop needs
        // an earlier answer to iterate over.
        let first = self.ctx.questionnaire.first_question()?;
        if !self.ctx.questionnaire.question(first)?.supports_localization() {
            return Err(Error::Internal);
        }
        self.set_next_question(interview, first)?;

        let stack = Stack::new();
        view::localized_question(&self.ctx, self.expr, &stack, first)
    }

    /// Records an answer to the current question and advances to the next
    /// one, entering and closing loops as transitions dictate. Returns the
    /// localized view of the new next question.
    pub fn submit(
        &mut self,
        interview: &mut Interview,
        payload: &AnswerPayload,
        meta: SubmitMeta,
    ) -> Result<LocalizedQuestion> {
        interview.check_started()?;
        if interview.is_completed() {
            return Err(Error::InterviewAlreadyCompleted);
        }

        let current = interview.next_question.ok_or(Error::Internal)?;
        let mut stack = self.build_stack(interview, interview.history.len())?;
        let answer = self.build_answer(interview, current, payload, meta)?;
        interview.history.push(Entry::Answer(answer.clone()));
        stack.replace_answer(answer);

        let next = self.run_transitions(&stack, interview.start_timestamp, current)?;
        let next = self.resolve(interview, &mut stack, next)?;
        self.set_next_question(interview, next)?;

        view::localized_question(&self.ctx, self.expr, &stack, next)
    }

    /// Renders the stored next question without advancing anything.
    pub fn next_localized_question(&mut self, interview: &Interview) -> Result<LocalizedQuestion> {
        interview.check_started()?;
        let next = interview.next_question.ok_or(Error::Internal)?;
        let stack = self.build_stack(interview, interview.history.len())?;
        view::localized_question(&self.ctx, self.expr, &stack, next)
    }

    /// Drives past loop delimiters until a presentable question is reached.
    pub(crate) fn resolve(
        &mut self,
        interview: &mut Interview,
        stack: &mut Stack,
        question: QuestionId,
    ) -> Result<QuestionId> {
        match self.ctx.questionnaire.question(question)?.loop_kind() {
            LoopKind::Regular => Ok(question),
            LoopKind::BeginLoop => self.process_begin_loop(interview, stack, question),
            LoopKind::EndLoop => self.process_end_loop(interview, stack, question),
        }
    }

    /// First encounter of a begin-loop. With something to iterate, a frame
    /// and a begin-loop entry are recorded and the loop body is entered
    /// through the begin-loop's transitions. Otherwise the loop is skipped:
    /// an end-loop entry marks the skip and the matching end-loop's
    /// transitions decide where to go.
    fn process_begin_loop(
        &mut self,
        interview: &mut Interview,
        stack: &mut Stack,
        begin: QuestionId,
    ) -> Result<QuestionId> {
        match stack.enter_begin_loop(&self.ctx, self.expr, begin)? {
            BeginOutcome::Entered => {
                interview.history.push(Entry::BeginLoop { begin, index: stack.current_index() });
                let next = self.run_transitions(stack, interview.start_timestamp, begin)?;
                self.resolve(interview, stack, next)
            }
            BeginOutcome::Skip => {
                let end = self.ctx.questionnaire.matching_end_loop(begin)?;
                interview.history.push(Entry::EndLoop { end });
                let next = self.run_transitions(stack, interview.start_timestamp, end)?;
                self.resolve(interview, stack, next)
            }
        }
    }

    /// An end-loop either re-enters the loop through the begin-loop's
    /// transitions or, once the operand array is exhausted, pops the frame
    /// and follows its own transitions.
    fn process_end_loop(
        &mut self,
        interview: &mut Interview,
        stack: &mut Stack,
        end: QuestionId,
    ) -> Result<QuestionId> {
        if stack.depth() == 0 {
            return Err(Error::Internal);
        }
        interview.history.push(Entry::EndLoop { end });

        if stack.process_end_loop() {
            let begin = stack.current_begin().ok_or(Error::Internal)?;
            let next = self.run_transitions(stack, interview.start_timestamp, begin)?;
            self.resolve(interview, stack, next)
        } else {
            let next = self.run_transitions(stack, interview.start_timestamp, end)?;
            self.resolve(interview, stack, next)
        }
    }

    /// Like `resolve`, but for answer revision: drives the stack through
    /// loop steps without recording history entries.
    pub(crate) fn find_next_regular(
        &mut self,
        interview_start: i64,
        stack: &mut Stack,
        question: QuestionId,
    ) -> Result<QuestionId> {
        let mut current = question;
        loop {
            match self.ctx.questionnaire.question(current)?.loop_kind() {
                LoopKind::Regular => return Ok(current),
                LoopKind::BeginLoop => {
                    current = match stack.enter_begin_loop(&self.ctx, self.expr, current)? {
                        BeginOutcome::Entered => {
                            self.run_transitions(stack, interview_start, current)?
                        }
                        BeginOutcome::Skip => {
                            let end = self.ctx.questionnaire.matching_end_loop(current)?;
                            self.run_transitions(stack, interview_start, end)?
                        }
                    };
                }
                LoopKind::EndLoop => {
                    current = if stack.process_end_loop() {
                        let begin = stack.current_begin().ok_or(Error::Internal)?;
                        self.run_transitions(stack, interview_start, begin)?
                    } else {
                        self.run_transitions(stack, interview_start, current)?
                    };
                }
            }
        }
    }

    /// Validates a submitted payload against the question it answers and
    /// stamps it with timing and capture data.
    pub(crate) fn build_answer(
        &mut self,
        interview: &Interview,
        question: QuestionId,
        payload: &AnswerPayload,
        meta: SubmitMeta,
    ) -> Result<Answer> {
        let q = self.ctx.questionnaire.question(question)?;
        let kind = q.resolved_kind(self.ctx.templates)?;
        let (elapsed, total_elapsed) = interview.elapsed_times(meta.now);

        let body = match (kind, payload) {
            (QuestionKind::Message { .. }, AnswerPayload::Message) => AnswerBody::Message,
            (QuestionKind::Input { optional, .. }, AnswerPayload::Input { input, comment }) => {
                if input.is_empty() && !optional {
                    return Err(Error::AnswerIncorrect);
                }
                AnswerBody::Input { input: input.clone(), comment: comment.clone() }
            }
            (QuestionKind::Select { options, .. }, AnswerPayload::Select { choice, comment }) => {
                if choice.index >= options.len() {
                    return Err(Error::AnswerIncorrect);
                }
                AnswerBody::Select {
                    choice: Choice { index: choice.index, comment: choice.comment.clone() },
                    comment: comment.clone(),
                }
            }
            (
                QuestionKind::MultipleChoice { kind, options, limit, .. },
                AnswerPayload::MultipleChoice { choices, comment },
            ) => {
                let fits = if kind.is_exact() {
                    choices.len() == *limit
                } else {
                    choices.len() <= *limit
                };
                if !fits {
                    return Err(Error::AnswerIncorrect);
                }
                let choices = choices
                    .iter()
                    .map(|choice| {
                        if choice.index >= options.len() {
                            return Err(Error::SelectionInvalid);
                        }
                        Ok(Choice { index: choice.index, comment: choice.comment.clone() })
                    })
                    .collect::<Result<Vec<_>>>()?;
                AnswerBody::MultipleChoice { choices, comment: comment.clone() }
            }
            _ => return Err(Error::AnswerIncorrect),
        };

        Ok(Answer {
            question,
            ip_address: meta.ip_address,
            elapsed,
            total_elapsed,
            geolocation: meta.geolocation,
            body,
        })
    }

    /// The answer preceding history index `index`, skipping loop entries.
    /// An index of 0 requests the last answer recorded.
    pub fn previous_answer(
        &mut self,
        interview: &Interview,
        index: usize,
    ) -> Result<LocalizedAnswerAndMore> {
        let position = if index == 0 {
            interview
                .history
                .iter()
                .rposition(|entry| entry.answer().is_some())
                .ok_or(Error::AnswerIndexMissing { index })?
        } else {
            let target = index - 1;
            if target >= interview.history.len() {
                return Err(Error::AnswerIndexMissing { index: target });
            }
            // The first entry is necessarily a real answer.
            (0..=target)
                .rev()
                .find(|i| interview.history[*i].answer().is_some())
                .ok_or(Error::AnswerIndexMissing { index: target })?
        };

        self.answer_at(interview, position, position != 0)
    }

    /// The answer following history index `index`, skipping loop entries.
    pub fn next_answer(
        &mut self,
        interview: &Interview,
        index: usize,
    ) -> Result<LocalizedAnswerAndMore> {
        let target = index + 1;
        if target >= interview.history.len() {
            return Err(Error::AnswerIndexMissing { index: target });
        }
        let position = (target..interview.history.len())
            .find(|i| interview.history[*i].answer().is_some())
            .ok_or(Error::AnswerIndexMissing { index: target })?;

        self.answer_at(interview, position, position + 1 != interview.history.len())
    }

    fn answer_at(
        &mut self,
        interview: &Interview,
        position: usize,
        more: bool,
    ) -> Result<LocalizedAnswerAndMore> {
        let stack = self.build_stack(interview, position)?;
        let answer = interview
            .history
            .get(position)
            .and_then(Entry::answer)
            .ok_or(Error::Internal)?;
        Ok(LocalizedAnswerAndMore {
            answer: view::localized_answer(&self.ctx, self.expr, &stack, answer)?,
            index: position,
            more,
        })
    }

    /// Localized download of the whole interview. Each answer is rendered
    /// with the stack as it stood when the answer was given, so loop
    /// variables in parametric texts resolve to their iteration's values.
    pub fn localized_interview(&mut self, interview: &Interview) -> Result<LocalizedInterviewData> {
        let mut stack = Stack::new();
        let mut answers = Vec::new();

        for entry in &interview.history {
            if let Some(answer) = entry.answer() {
                answers.push(view::localized_answer(&self.ctx, self.expr, &stack, answer)?);
            }
            stack.replay_entry(&self.ctx, self.expr, entry)?;
        }

        Ok(LocalizedInterviewData {
            interviewee: interview.interviewee_id.clone(),
            interviewer: interview.interviewer_id.clone(),
            language: interview.language,
            answers,
            state: interview.state,
        })
    }
}
