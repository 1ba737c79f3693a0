use std::collections::HashMap;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprError};
use crate::language::Language;
use crate::model::interview::{Answer, Entry};
use crate::model::localization::QuestionnaireLocalization;
use crate::model::question::{QuestionId, QuestionKind};
use crate::model::questionnaire::Questionnaire;
use crate::model::template::TemplateSource;
use crate::view;

/// Everything transition evaluation and localized rendering need to read.
/// The expression host travels separately because it is mutated.
pub struct EvalCtx<'a> {
    pub questionnaire: &'a Questionnaire,
    pub localization: &'a QuestionnaireLocalization,
    pub templates: &'a dyn TemplateSource,
    pub language: Language,
}

/// One active loop: the begin-loop, its operand answer, the operand array
/// evaluated once on entry, the iteration index, and the answers recorded
/// within this activation, most recent per question.
#[derive(Debug, Clone)]
struct Frame {
    begin: QuestionId,
    operand_answer: Answer,
    operand: Value,
    operand_len: usize,
    index: usize,
    answers: HashMap<QuestionId, Answer>,
}

/// Outcome of encountering a begin-loop: either a frame was pushed, or
/// there is nothing to iterate and the loop must be skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeginOutcome {
    Entered,
    Skip,
}

/// The interpreter stack. Rebuilt from history on each operation, it is the
/// sole source of answers injected into transition conditions and text
/// functions: lookup walks frames innermost-first, then the top-level map
/// of answers given outside any loop.
#[derive(Debug, Clone, Default)]
pub struct Stack {
    frames: Vec<Frame>,
    top: HashMap<QuestionId, Answer>,
}

impl Stack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// No frames and no answers at all: localized texts can skip escape
    /// processing entirely when nothing could resolve anyway.
    pub fn is_plain(&self) -> bool {
        self.frames.is_empty() && self.top.is_empty()
    }

    pub fn current_begin(&self) -> Option<QuestionId> {
        self.frames.last().map(|frame| frame.begin)
    }

    pub fn current_index(&self) -> usize {
        self.frames.last().map(|frame| frame.index).unwrap_or(0)
    }

    /// Records an answer in the innermost active frame, or at top level.
    /// Loops produce several answers per question; the last one wins.
    pub fn replace_answer(&mut self, answer: Answer) {
        match self.frames.last_mut() {
            Some(frame) => frame.answers.insert(answer.question, answer),
            None => self.top.insert(answer.question, answer),
        };
    }

    pub fn find_answer(&self, question: QuestionId) -> Option<&Answer> {
        for frame in self.frames.iter().rev() {
            if let Some(answer) = frame.answers.get(&question) {
                return Some(answer);
            }
        }
        self.top.get(&question)
    }

    pub fn find_operand_answer(&self, begin: QuestionId) -> Option<&Answer> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.begin == begin)
            .map(|frame| &frame.operand_answer)
    }

    /// Resolves a loop variable innermost-first and returns its value for
    /// the current iteration, `None` when no enclosing loop declares it.
    pub fn loop_variable(&self, ctx: &EvalCtx<'_>, name: &str) -> Result<Option<Value>> {
        for frame in self.frames.iter().rev() {
            let question = ctx.questionnaire.question(frame.begin)?;
            let QuestionKind::BeginLoop { variable, .. } = &question.kind else {
                return Err(Error::Internal);
            };
            if variable == name {
                return Ok(Some(frame.variable_value()));
            }
        }
        Ok(None)
    }

    /// Evaluates a begin-loop's operand snippet against its operand answer.
    /// The localized answer data is bound both under the operand question's
    /// label and under `R`; an undefined result reads as null.
    pub fn loop_operand(
        &self,
        ctx: &EvalCtx<'_>,
        expr: &mut dyn Expr,
        begin: QuestionId,
        operand_answer: &Answer,
    ) -> Result<Value> {
        let question = ctx.questionnaire.question(begin)?;
        let QuestionKind::BeginLoop { operand, .. } = &question.kind else {
            return Err(Error::Internal);
        };

        let label = ctx.questionnaire.question(operand_answer.question)?.label.clone();
        let argument = view::localized_answer_argument(ctx, expr, self, operand_answer)?;
        expr.inject(&label, argument.clone());
        expr.inject("R", argument);

        match expr.execute(operand) {
            Ok(value) => Ok(value),
            Err(ExprError::Undefined) => Ok(Value::Null),
            Err(err) => Err(err.into()),
        }
    }

    /// First encounter of a begin-loop while advancing. When the operand
    /// answer is absent (skipped by transitions) or the first element of
    /// the operand array is null or missing, there is nothing to iterate.
    pub fn enter_begin_loop(
        &mut self,
        ctx: &EvalCtx<'_>,
        expr: &mut dyn Expr,
        begin: QuestionId,
    ) -> Result<BeginOutcome> {
        let question = ctx.questionnaire.question(begin)?;
        let QuestionKind::BeginLoop { operand_question, .. } = &question.kind else {
            return Err(Error::Internal);
        };

        let Some(answer) = self.find_answer(*operand_question).cloned() else {
            return Ok(BeginOutcome::Skip);
        };

        let operand = self.loop_operand(ctx, expr, begin, &answer)?;
        let first = operand.as_array().and_then(|items| items.first());
        if !matches!(first, Some(value) if !value.is_null()) {
            return Ok(BeginOutcome::Skip);
        }

        self.push_frame(begin, answer, operand);
        Ok(BeginOutcome::Entered)
    }

    fn push_frame(&mut self, begin: QuestionId, operand_answer: Answer, operand: Value) {
        // Re-entering the loop currently on top happens on iteration; the
        // frame already exists.
        if self.current_begin() == Some(begin) {
            return;
        }
        let operand_len = operand.as_array().map(Vec::len).unwrap_or(0);
        self.frames.push(Frame {
            begin,
            operand_answer,
            operand,
            operand_len,
            index: 0,
            answers: HashMap::new(),
        });
    }

    /// Advances the top frame. Returns true while the loop keeps iterating;
    /// popping the exhausted frame returns false. Tolerates the no-frame
    /// case so skip markers in history replay cleanly.
    pub fn process_end_loop(&mut self) -> bool {
        let Some(frame) = self.frames.last_mut() else {
            return false;
        };
        frame.index += 1;
        if frame.index >= frame.operand_len {
            self.frames.pop();
            false
        } else {
            true
        }
    }

    /// Replays one history entry. Begin-loop entries re-resolve their
    /// operand answer from the stack, which is where it was found when the
    /// entry was recorded. An end-loop entry whose matching begin is not
    /// the current top frame is the marker of a skipped loop and does
    /// nothing.
    pub fn replay_entry(
        &mut self,
        ctx: &EvalCtx<'_>,
        expr: &mut dyn Expr,
        entry: &Entry,
    ) -> Result<()> {
        match entry {
            Entry::Answer(answer) => {
                self.replace_answer(answer.clone());
            }
            Entry::BeginLoop { begin, .. } => {
                if self.current_begin() == Some(*begin) {
                    return Ok(());
                }
                let question = ctx.questionnaire.question(*begin)?;
                let QuestionKind::BeginLoop { operand_question, .. } = &question.kind else {
                    return Err(Error::Internal);
                };
                let answer = self
                    .find_answer(*operand_question)
                    .cloned()
                    .ok_or(Error::Internal)?;
                let operand = self.loop_operand(ctx, expr, *begin, &answer)?;
                self.push_frame(*begin, answer, operand);
            }
            Entry::EndLoop { end } => {
                let matching = ctx.questionnaire.question(*end)?.info.matching;
                if self.current_begin().is_some() && self.current_begin() == matching {
                    self.process_end_loop();
                }
            }
        }
        Ok(())
    }
}

impl Frame {
    /// Current element of the operand array, null when out of range.
    fn variable_value(&self) -> Value {
        self.operand
            .as_array()
            .and_then(|items| items.get(self.index))
            .cloned()
            .unwrap_or(Value::Null)
    }
}
