use crate::error::{Error, Result};
use crate::interview::{Interpreter, SubmitMeta};
use crate::model::interview::{Answer, Entry, Interview};
use crate::model::question::QuestionKind;
use crate::spec::answer::AnswerPayload;
use crate::stack::Stack;
use crate::text::calculate_text;
use crate::view::{self, LocalizedQuestion};

impl Interpreter<'_> {
    /// Replaces the answer at `position` and resections downstream history
    /// with minimal impact: stretches whose transitions, parametric texts,
    /// and loop operands come out unchanged are kept; only genuinely
    /// affected tails are dropped. Returns the localized next question.
    ///
    /// The walk maintains two stacks, one carrying the previous answer and
    /// one the new, so texts and operands can be compared under both.
    /// Impact is only ever examined against the revised answer, not against
    /// answers dropped by an earlier resection; an ill-formed questionnaire
    /// whose dropped answers drive later entries is not diagnosed here.
    pub fn revise(
        &mut self,
        interview: &mut Interview,
        position: usize,
        payload: &AnswerPayload,
        meta: SubmitMeta,
    ) -> Result<LocalizedQuestion> {
        // Unlike submit, revision is accepted on a completed interview:
        // changing a past answer may reopen the tail of the questionnaire.
        interview.check_started()?;

        let previous = interview.find_answer(position)?.clone();
        let revised_question = previous.question;
        let new_answer = self.build_answer(interview, revised_question, payload, meta)?;

        // Both stacks replay the history before the revised answer, then
        // diverge on it alone.
        let mut pts = self.build_stack(interview, position)?;
        let mut nts = pts.clone();
        pts.replace_answer(previous.clone());
        nts.replace_answer(new_answer.clone());

        // Graft in place: loop entries referencing the operand answer stay
        // valid because they resolve it through the stack.
        interview.history[position] = Entry::Answer(new_answer);

        let start = interview.start_timestamp;
        let mut i = position + 1;
        let mut question = revised_question;

        loop {
            let new_next = self.run_transitions(&nts, start, question)?;

            if i == interview.history.len() {
                return self.finish(interview, &mut nts, new_next);
            }

            if interview.history[i].question() != new_next {
                // The revision drove to another question. Drop entries
                // until one for that question is found; it may carry an
                // already-given answer worth keeping.
                while i < interview.history.len()
                    && interview.history[i].question() != new_next
                {
                    interview.history.remove(i);
                }
                if i == interview.history.len() {
                    return self.finish(interview, &mut nts, new_next);
                }
            }

            let entry = interview.history[i].clone();
            if self.is_impacted(&entry, &previous)? {
                // `truly_impacted` replays the entry into both stacks when
                // it turns out to compute identically.
                if self.truly_impacted(&mut pts, &mut nts, &entry)? {
                    interview.history.truncate(i);
                    return self.finish(interview, &mut nts, new_next);
                }
            } else {
                pts.replay_entry(&self.ctx, self.expr, &entry)?;
                nts.replay_entry(&self.ctx, self.expr, &entry)?;
            }

            question = new_next;
            i += 1;
        }
    }

    fn finish(
        &mut self,
        interview: &mut Interview,
        nts: &mut Stack,
        from: crate::model::question::QuestionId,
    ) -> Result<LocalizedQuestion> {
        let landing = self.find_next_regular(interview.start_timestamp, nts, from)?;
        self.set_next_question(interview, landing)?;
        view::localized_question(&self.ctx, self.expr, nts, landing)
    }

    /// Potential impact: an answer whose question's text functions consume
    /// the revised question, or a begin-loop iterating over it.
    fn is_impacted(&self, entry: &Entry, revised: &Answer) -> Result<bool> {
        match entry {
            Entry::Answer(answer) => Ok(self
                .ctx
                .questionnaire
                .question(answer.question)?
                .is_impacted_by(revised.question)),
            Entry::BeginLoop { begin, .. } => Ok(self
                .ctx
                .questionnaire
                .question(*begin)?
                .is_impacted_by(revised.question)),
            Entry::EndLoop { .. } => Ok(false),
        }
    }

    /// Decides whether a potentially-impacted entry actually changed. When
    /// it did not, the entry is replayed into both stacks and the walk can
    /// continue.
    fn truly_impacted(
        &mut self,
        pts: &mut Stack,
        nts: &mut Stack,
        entry: &Entry,
    ) -> Result<bool> {
        match entry {
            Entry::Answer(answer) => {
                let question = self.ctx.questionnaire.question(answer.question)?;
                let localization =
                    self.ctx
                        .localization
                        .body_for(question, answer.question, self.ctx.templates)?;
                let body = question
                    .resolved_kind(self.ctx.templates)?
                    .body()
                    .ok_or(Error::Internal)?;

                let previous_text = calculate_text(
                    &self.ctx,
                    self.expr,
                    pts,
                    &question.label,
                    body,
                    localization.text(),
                )?;
                let new_text = calculate_text(
                    &self.ctx,
                    self.expr,
                    nts,
                    &question.label,
                    body,
                    localization.text(),
                )?;
                if previous_text != new_text {
                    return Ok(true);
                }

                pts.replace_answer(answer.clone());
                nts.replace_answer(answer.clone());
                Ok(false)
            }
            Entry::BeginLoop { begin, .. } => {
                let question = self.ctx.questionnaire.question(*begin)?;
                let QuestionKind::BeginLoop { operand_question, .. } = &question.kind else {
                    return Err(Error::Internal);
                };

                let previous_operand = pts
                    .find_answer(*operand_question)
                    .cloned()
                    .ok_or(Error::Internal)?;
                let new_operand = nts
                    .find_answer(*operand_question)
                    .cloned()
                    .ok_or(Error::Internal)?;
                let previous_array =
                    pts.loop_operand(&self.ctx, self.expr, *begin, &previous_operand)?;
                let new_array = nts.loop_operand(&self.ctx, self.expr, *begin, &new_operand)?;
                // A changed operand restarts the whole loop; salvaging the
                // common prefix of iterations is not attempted.
                if previous_array != new_array {
                    return Ok(true);
                }

                pts.replay_entry(&self.ctx, self.expr, entry)?;
                nts.replay_entry(&self.ctx, self.expr, entry)?;
                Ok(false)
            }
            Entry::EndLoop { .. } => Ok(false),
        }
    }
}
