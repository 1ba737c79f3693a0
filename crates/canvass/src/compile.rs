use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::model::localization::{
    LocalizationBody, OptionLocalization, QuestionLocalization, QuestionnaireLocalization,
};
use crate::model::question::{
    Function, LoopKind, MultipleChoiceKind, OptionDef, Question, QuestionId, QuestionInfo,
    QuestionKind, TextBody, Transition,
};
use crate::model::questionnaire::Questionnaire;
use crate::model::template::{TemplateLocalization, TemplateQuestion, TemplateSource};
use crate::spec::localization::{SourceQuestionLocalization, SourceQuestionnaireLocalization};
use crate::spec::question::{
    SourceFunction, SourceMultipleChoice, SourceOption, SourceQuestion, SourceText,
};
use crate::spec::questionnaire::SourceQuestionnaire;
use crate::spec::template::{SourceTemplateLocalization, SourceTemplateQuestion};
use crate::spec::transition::SourceTransition;
use crate::store::{CategoryId, QuestionnaireId, TemplateId};

/// Labels double as script variable names, so they are restricted to a
/// subset of valid identifiers, and the two names the engine injects
/// itself are reserved.
pub fn validate_label(label: &str) -> bool {
    static LABEL: OnceLock<Regex> = OnceLock::new();
    let re = LABEL
        .get_or_init(|| Regex::new("^[A-Za-z$][0-9A-Za-z_$]*$").expect("label pattern is valid"));
    re.is_match(label) && label != crate::LANGUAGE_VAR && label != crate::LANGUAGE_STR2_VAR
}

/// Compiles an uploaded questionnaire into the internal graph plus its
/// first localization, or fails with no partial state.
///
/// The first pass creates the questions in order, assigning loop nests and
/// pairing begin/end loops. The second pass compiles text functions and
/// links transitions; it needs the complete label map to tell a forward
/// reference from a missing one. Loop-operand placement is checked once
/// all nests are known.
pub fn compile(
    source: &SourceQuestionnaire,
    templates: &dyn TemplateSource,
    expr: &mut dyn Expr,
) -> Result<(Questionnaire, QuestionnaireLocalization)> {
    if source.name.is_empty() {
        return Err(Error::QuestionnaireNameEmpty);
    }
    if source.questions.is_empty() {
        return Err(Error::QuestionnaireEmpty);
    }
    let language = source.language.validate()?;

    let mut questionnaire =
        Questionnaire::new(source.code.as_str(), source.name.as_str(), source.logo.as_str());
    let mut localization = QuestionnaireLocalization::new(
        QuestionnaireId::default(),
        source.title.as_str(),
        language,
        source.name.as_str(),
    );
    let mut labels: HashMap<String, QuestionId> = HashMap::new();
    let mut nest: Vec<QuestionId> = Vec::new();

    for (index, source_question) in source.questions.iter().enumerate() {
        let id = QuestionId(index);
        let label = source_question.label();
        if !validate_label(label) {
            return Err(Error::LabelInvalid { label: label.to_string() });
        }
        if labels.contains_key(label) {
            return Err(Error::LabelDuplicate { label: label.to_string() });
        }

        let (kind, loc_body) = compile_body(source_question, &labels, &questionnaire, templates)?;

        let mut info = QuestionInfo { index, nest: nest.clone(), matching: None };
        match kind.loop_kind() {
            LoopKind::BeginLoop => {
                // A begin-loop's nest excludes itself; it is pushed after
                // its own entry is recorded.
                nest.push(id);
            }
            LoopKind::EndLoop => {
                let begin = nest
                    .pop()
                    .ok_or_else(|| Error::LoopNotBalanced { label: label.to_string() })?;
                info.nest = nest.clone();
                info.matching = Some(begin);
                questionnaire.questions[begin.0].info.matching = Some(id);
            }
            LoopKind::Regular => {}
        }

        questionnaire.questions.push(Question {
            label: label.to_string(),
            kind,
            transitions: Vec::new(),
            info,
        });
        labels.insert(label.to_string(), id);

        if let Some(body) = loc_body {
            localization
                .entries
                .push(QuestionLocalization { question: id, body });
        }
    }

    if let Some(open) = nest.last() {
        return Err(Error::LoopNotClosed {
            label: questionnaire.questions[open.0].label.clone(),
        });
    }

    // Begin-loops must iterate over answers given at their own nest level.
    for (_, question) in questionnaire.begin_loops() {
        let QuestionKind::BeginLoop { operand_question, .. } = &question.kind else {
            return Err(Error::Internal);
        };
        let operand = questionnaire.question(*operand_question)?;
        if operand.info.nest != question.info.nest {
            return Err(Error::BeginLoopOperandWrongNest { label: question.label.clone() });
        }
    }

    // Second pass: text functions, then transitions.
    for (index, source_question) in source.questions.iter().enumerate() {
        let id = QuestionId(index);

        if let Some(text) = source_text(source_question) {
            let functions =
                compile_functions(&questionnaire, id, &text.functions, expr)?;
            validate_parametric_text(
                &questionnaire.questions[index].label,
                &text.value,
                functions.len(),
            )?;
            match &mut questionnaire.questions[index].kind {
                QuestionKind::Message { body }
                | QuestionKind::Input { body, .. }
                | QuestionKind::Select { body, .. }
                | QuestionKind::MultipleChoice { body, .. } => body.text_functions = functions,
                _ => return Err(Error::Internal),
            }
        }

        let transitions =
            compile_transitions(&questionnaire, id, source_question.transitions(), templates, expr)?;
        questionnaire.questions[index].transitions = transitions;
    }

    localization.checked_change_count = questionnaire.change_count;
    Ok((questionnaire, localization))
}

fn source_text(source: &SourceQuestion) -> Option<&SourceText> {
    match source {
        SourceQuestion::Message(q) => Some(&q.text),
        SourceQuestion::Input(q) => Some(&q.text),
        SourceQuestion::Select(q) => Some(&q.text),
        SourceQuestion::SelectAtMost(q)
        | SourceQuestion::SelectExactly(q)
        | SourceQuestion::RankAtMost(q)
        | SourceQuestion::RankExactly(q) => Some(&q.text),
        _ => None,
    }
}

fn require_text(label: &str, text: &SourceText) -> Result<()> {
    if text.value.is_empty() {
        return Err(Error::TextMissing { label: label.to_string() });
    }
    Ok(())
}

fn compile_options(
    label: &str,
    options: &[SourceOption],
) -> Result<(Vec<OptionDef>, Vec<OptionLocalization>)> {
    let defs = options
        .iter()
        .map(|option| OptionDef { has_comment: !option.comment_label.is_empty() })
        .collect();
    let localizations = options
        .iter()
        .map(|option| {
            if option.label.is_empty() {
                return Err(Error::OptionLabelEmpty { label: label.to_string() });
            }
            Ok(OptionLocalization {
                label: option.label.clone(),
                comment_label: option.comment_label.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((defs, localizations))
}

fn compile_multiple_choice(
    source: &SourceMultipleChoice,
    kind: MultipleChoiceKind,
) -> Result<(QuestionKind, Option<LocalizationBody>)> {
    require_text(&source.label, &source.text)?;

    // A limit of 0 means "as many as there are options".
    let limit = if source.limit == 0 { source.options.len() } else { source.limit };
    if limit <= 1 || source.options.len() < limit {
        return Err(Error::OptionsInvalid { label: source.label.clone() });
    }

    let (options, option_localizations) = compile_options(&source.label, &source.options)?;
    Ok((
        QuestionKind::MultipleChoice {
            body: TextBody { style: source.style.clone(), text_functions: Vec::new() },
            kind,
            options,
            randomize: source.randomize,
            has_comment: !source.comment_label.is_empty(),
            limit,
        },
        Some(LocalizationBody::Options {
            text: source.text.value.clone(),
            comment_label: source.comment_label.clone(),
            options: option_localizations,
        }),
    ))
}

fn compile_body(
    source: &SourceQuestion,
    labels: &HashMap<String, QuestionId>,
    questionnaire: &Questionnaire,
    templates: &dyn TemplateSource,
) -> Result<(QuestionKind, Option<LocalizationBody>)> {
    match source {
        SourceQuestion::Message(q) => {
            require_text(&q.label, &q.text)?;
            Ok((
                QuestionKind::Message {
                    body: TextBody { style: q.style.clone(), text_functions: Vec::new() },
                },
                Some(LocalizationBody::Message { text: q.text.value.clone() }),
            ))
        }
        SourceQuestion::Input(q) => {
            require_text(&q.label, &q.text)?;
            Ok((
                QuestionKind::Input {
                    body: TextBody { style: q.style.clone(), text_functions: Vec::new() },
                    optional: q.optional,
                    has_comment: !q.comment_label.is_empty(),
                },
                Some(LocalizationBody::Input {
                    text: q.text.value.clone(),
                    comment_label: q.comment_label.clone(),
                }),
            ))
        }
        SourceQuestion::Select(q) => {
            require_text(&q.label, &q.text)?;
            if q.options.len() <= 1 {
                return Err(Error::OptionsInvalid { label: q.label.clone() });
            }
            let (options, option_localizations) = compile_options(&q.label, &q.options)?;
            Ok((
                QuestionKind::Select {
                    body: TextBody { style: q.style.clone(), text_functions: Vec::new() },
                    options,
                    randomize: q.randomize,
                    has_comment: !q.comment_label.is_empty(),
                },
                Some(LocalizationBody::Options {
                    text: q.text.value.clone(),
                    comment_label: q.comment_label.clone(),
                    options: option_localizations,
                }),
            ))
        }
        SourceQuestion::SelectAtMost(q) => {
            compile_multiple_choice(q, MultipleChoiceKind::SelectAtMost)
        }
        SourceQuestion::SelectExactly(q) => {
            compile_multiple_choice(q, MultipleChoiceKind::SelectExactly)
        }
        SourceQuestion::RankAtMost(q) => compile_multiple_choice(q, MultipleChoiceKind::RankAtMost),
        SourceQuestion::RankExactly(q) => {
            compile_multiple_choice(q, MultipleChoiceKind::RankExactly)
        }
        SourceQuestion::FromTemplate(q) => {
            let (template, _) = templates
                .template_by_label(&q.template)
                .ok_or_else(|| Error::TemplateMissing { label: q.template.clone() })?;
            Ok((QuestionKind::FromTemplate { template }, None))
        }
        SourceQuestion::BeginLoop(q) => {
            let operand_question = *labels.get(&q.question).ok_or_else(|| {
                Error::BeginLoopOperandUnknown {
                    label: q.label.clone(),
                    operand: q.question.clone(),
                }
            })?;
            if !questionnaire.question(operand_question)?.supports_answer() {
                return Err(Error::BeginLoopOperandUnanswerable { label: q.label.clone() });
            }
            if !validate_label(&q.variable) {
                return Err(Error::BeginLoopVariableInvalid { label: q.label.clone() });
            }
            if q.operand.is_empty() {
                return Err(Error::BeginLoopOperandEmpty { label: q.label.clone() });
            }
            Ok((
                QuestionKind::BeginLoop {
                    operand_question,
                    variable: q.variable.clone(),
                    operand: q.operand.clone(),
                },
                None,
            ))
        }
        SourceQuestion::EndLoop(_) => Ok((QuestionKind::EndLoop, None)),
    }
}

/// Resolves function parameter labels against the full label map. Every
/// parameter must name a question answered by the time the function runs:
/// earlier questions in the same loop nest, plus the question itself for a
/// transition condition, which fires right after its own answer.
fn compile_parameters(
    questionnaire: &Questionnaire,
    id: QuestionId,
    parameters: &[String],
    allow_self: bool,
) -> Result<Vec<QuestionId>> {
    let label = &questionnaire.questions[id.0].label;
    let info = &questionnaire.questions[id.0].info;
    let mut resolved = Vec::with_capacity(parameters.len());

    for parameter in parameters {
        let Some(pid) = questionnaire.find_question(parameter) else {
            return Err(Error::FunctionParameterMissing { label: label.clone() });
        };
        if pid == id && !allow_self {
            return Err(Error::FunctionParameterSelf { label: label.clone() });
        }
        if pid.0 > id.0 {
            return Err(Error::FunctionParameterSubsequent { label: label.clone() });
        }
        if pid != id && questionnaire.questions[pid.0].info.nest != info.nest {
            return Err(Error::FunctionParameterWrongNest { label: label.clone() });
        }
        resolved.push(pid);
    }

    Ok(resolved)
}

fn compile_functions(
    questionnaire: &Questionnaire,
    id: QuestionId,
    functions: &[SourceFunction],
    expr: &mut dyn Expr,
) -> Result<Vec<Function>> {
    let label = &questionnaire.questions[id.0].label;
    functions
        .iter()
        .map(|source| {
            if source.code.is_empty() {
                return Err(Error::FunctionCodeMissing { label: label.clone() });
            }
            expr.compile(&source.code)?;
            Ok(Function {
                code: source.code.clone(),
                parameters: compile_parameters(questionnaire, id, &source.parameters, false)?,
            })
        })
        .collect()
}

/// Checks that every `@{N}` escape in a localized text calls an existing
/// text function. Loop variable names are validated at render time.
pub fn validate_parametric_text(label: &str, text: &str, functions: usize) -> Result<()> {
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '@' || chars.peek() != Some(&'{') {
            continue;
        }
        chars.next();

        let Some(first) = chars.peek().copied() else {
            return Ok(());
        };
        if !first.is_ascii_digit() {
            continue;
        }

        let mut index = 0usize;
        let mut closed = false;
        while let Some(&c) = chars.peek() {
            if c.is_ascii_digit() {
                index = index.saturating_mul(10).saturating_add(c as usize - '0' as usize);
                chars.next();
            } else {
                closed = c == '}';
                break;
            }
        }

        if closed && index >= functions {
            return Err(Error::FunctionCallOutOfBounds { label: label.to_string() });
        }
    }

    Ok(())
}

/// Whether a transition from `from` may target `to` without crossing a loop
/// boundary. A begin-loop may only enter its own body or jump to its
/// matching end; everything else must stay at the same nest level, with a
/// jump to an end-loop whose begin is the current parent allowed as the
/// loop exit.
fn check_loop_crossing(questionnaire: &Questionnaire, from: QuestionId, to: QuestionId) -> Result<()> {
    let source = &questionnaire.questions[from.0];
    let destination = &questionnaire.questions[to.0];
    let across = || Error::TransitionAcrossLoop {
        label: source.label.clone(),
        destination: destination.label.clone(),
    };

    match source.loop_kind() {
        LoopKind::BeginLoop => match destination.loop_kind() {
            LoopKind::BeginLoop => Err(Error::BeginLoopToBeginLoop {
                label: source.label.clone(),
                destination: destination.label.clone(),
            }),
            LoopKind::EndLoop => {
                if destination.info.matching != Some(from) {
                    return Err(across());
                }
                Ok(())
            }
            LoopKind::Regular => {
                if destination.info.parent_begin_loop() != Some(from) {
                    return Err(across());
                }
                Ok(())
            }
        },
        LoopKind::Regular | LoopKind::EndLoop => {
            let same_parent =
                source.info.parent_begin_loop() == destination.info.parent_begin_loop();
            let exits_own_loop = matches!(destination.loop_kind(), LoopKind::EndLoop)
                && destination.info.matching == source.info.parent_begin_loop()
                && source.info.parent_begin_loop().is_some();
            if same_parent || exits_own_loop {
                Ok(())
            } else {
                Err(across())
            }
        }
    }
}

fn compile_transitions(
    questionnaire: &Questionnaire,
    id: QuestionId,
    transitions: &[SourceTransition],
    templates: &dyn TemplateSource,
    expr: &mut dyn Expr,
) -> Result<Vec<Transition>> {
    let question = &questionnaire.questions[id.0];
    let label = question.label.clone();

    // No transitions: a potentially-terminal question is left terminal;
    // anything else implicitly falls through to the next question.
    if transitions.is_empty() {
        if question.can_be_final(templates) {
            return Ok(Vec::new());
        }
        let next = questionnaire
            .next_in_order(id)
            .ok_or(Error::TransitionMissing { label: label.clone() })?;
        return Ok(vec![Transition { condition: None, destination: next }]);
    }

    let last = transitions.len() - 1;
    if !transitions[last].is_catch_all() {
        return Err(Error::TransitionsLackCatchAll {
            label: label.clone(),
            destination: transitions[last].destination.clone(),
        });
    }

    let mut compiled = Vec::with_capacity(transitions.len());
    for (position, transition) in transitions.iter().enumerate() {
        if position != last && transition.is_catch_all() {
            return Err(Error::CatchAllNotLast {
                label: label.clone(),
                destination: transition.destination.clone(),
            });
        }

        let Some(destination) = questionnaire.find_question(&transition.destination) else {
            return Err(Error::TransitionDestinationMissing {
                label: label.clone(),
                destination: transition.destination.clone(),
            });
        };
        if destination == id {
            return Err(Error::TransitionToSelf { label: label.clone() });
        }
        if destination.0 < id.0 {
            return Err(Error::TransitionToPrevious {
                label: label.clone(),
                destination: transition.destination.clone(),
            });
        }
        check_loop_crossing(questionnaire, id, destination)?;

        // A bare condition and a full snippet are mutually exclusive ways
        // of writing the same thing.
        let code = if !transition.condition.is_empty() {
            if !transition.code.is_empty() {
                return Err(Error::TransitionConditionAndCode {
                    label: label.clone(),
                    destination: transition.destination.clone(),
                });
            }
            transition.condition.clone()
        } else {
            transition.code.clone()
        };

        let condition = if code.is_empty() {
            None
        } else {
            if expr.compile(&code).is_err() {
                return Err(Error::TransitionConditionInvalid {
                    label: label.clone(),
                    destination: transition.destination.clone(),
                });
            }
            Some(Function {
                code,
                parameters: compile_parameters(questionnaire, id, &transition.parameters, true)?,
            })
        };

        compiled.push(Transition { condition, destination });
    }

    Ok(compiled)
}

/// Compiles an additional localization uploaded for an existing
/// questionnaire. Question references are labels; the result is fully
/// checked, so its change counter starts in sync with the questionnaire.
pub fn compile_localization(
    source: &SourceQuestionnaireLocalization,
    questionnaire: &Questionnaire,
    questionnaire_id: QuestionnaireId,
    templates: &dyn TemplateSource,
) -> Result<QuestionnaireLocalization> {
    let language = source.language.validate()?;
    let mut localization = QuestionnaireLocalization::new(
        questionnaire_id,
        source.title.as_str(),
        language,
        questionnaire.name.as_str(),
    );

    for entry in &source.questions {
        let label = entry.label();
        let question = questionnaire
            .find_question(label)
            .ok_or_else(|| Error::LabelUnknown { label: label.to_string() })?;
        let body = match entry {
            SourceQuestionLocalization::Message { text, .. } => {
                LocalizationBody::Message { text: text.clone() }
            }
            SourceQuestionLocalization::Input { text, comment_label, .. } => {
                LocalizationBody::Input { text: text.clone(), comment_label: comment_label.clone() }
            }
            SourceQuestionLocalization::Options { text, comment_label, options, .. } => {
                LocalizationBody::Options {
                    text: text.clone(),
                    comment_label: comment_label.clone(),
                    options: options
                        .iter()
                        .map(|option| OptionLocalization {
                            label: option.label.clone(),
                            comment_label: option.comment_label.clone(),
                        })
                        .collect(),
                }
            }
        };
        localization.entries.push(QuestionLocalization { question, body });
    }

    localization.force_check(questionnaire, templates)?;
    localization.checked_change_count = questionnaire.change_count;
    Ok(localization)
}

fn template_body(
    label: &str,
    style: &str,
    text: &str,
    comment_label: &str,
    options: Option<(&[SourceOption], bool, Option<(MultipleChoiceKind, usize)>)>,
    optional: Option<bool>,
) -> Result<(QuestionKind, LocalizationBody)> {
    if text.is_empty() {
        return Err(Error::TextMissing { label: label.to_string() });
    }
    let body = TextBody { style: style.to_string(), text_functions: Vec::new() };
    let has_comment = !comment_label.is_empty();

    match options {
        None => match optional {
            None => Ok((
                QuestionKind::Message { body },
                LocalizationBody::Message { text: text.to_string() },
            )),
            Some(optional) => Ok((
                QuestionKind::Input { body, optional, has_comment },
                LocalizationBody::Input {
                    text: text.to_string(),
                    comment_label: comment_label.to_string(),
                },
            )),
        },
        Some((source_options, randomize, choice)) => {
            let (defs, localizations) = compile_options(label, source_options)?;
            let loc = LocalizationBody::Options {
                text: text.to_string(),
                comment_label: comment_label.to_string(),
                options: localizations,
            };
            match choice {
                None => {
                    if defs.len() <= 1 {
                        return Err(Error::OptionsInvalid { label: label.to_string() });
                    }
                    Ok((
                        QuestionKind::Select { body, options: defs, randomize, has_comment },
                        loc,
                    ))
                }
                Some((kind, limit)) => {
                    let limit = if limit == 0 { defs.len() } else { limit };
                    if limit <= 1 || defs.len() < limit {
                        return Err(Error::OptionsInvalid { label: label.to_string() });
                    }
                    Ok((
                        QuestionKind::MultipleChoice {
                            body,
                            kind,
                            options: defs,
                            randomize,
                            has_comment,
                            limit,
                        },
                        loc,
                    ))
                }
            }
        }
    }
}

/// Compiles a template question upload into the template document and its
/// first localization. The localization's template reference is patched
/// once the template document has an id.
pub fn compile_template(
    source: &SourceTemplateQuestion,
    category: CategoryId,
) -> Result<(TemplateQuestion, TemplateLocalization)> {
    let language = source.language().validate()?;
    let label = source.label().to_string();

    let (kind, body) = match source {
        SourceTemplateQuestion::Message { style, text, .. } => {
            template_body(&label, style, text, "", None, None)?
        }
        SourceTemplateQuestion::Input { style, text, comment_label, optional, .. } => {
            template_body(&label, style, text, comment_label, None, Some(*optional))?
        }
        SourceTemplateQuestion::Select { style, text, comment_label, options, randomize, .. } => {
            template_body(&label, style, text, comment_label, Some((options, *randomize, None)), None)?
        }
        SourceTemplateQuestion::SelectAtMost(q) => template_body(
            &label,
            &q.style,
            &q.text,
            &q.comment_label,
            Some((&q.options, q.randomize, Some((MultipleChoiceKind::SelectAtMost, q.limit)))),
            None,
        )?,
        SourceTemplateQuestion::SelectExactly(q) => template_body(
            &label,
            &q.style,
            &q.text,
            &q.comment_label,
            Some((&q.options, q.randomize, Some((MultipleChoiceKind::SelectExactly, q.limit)))),
            None,
        )?,
        SourceTemplateQuestion::RankAtMost(q) => template_body(
            &label,
            &q.style,
            &q.text,
            &q.comment_label,
            Some((&q.options, q.randomize, Some((MultipleChoiceKind::RankAtMost, q.limit)))),
            None,
        )?,
        SourceTemplateQuestion::RankExactly(q) => template_body(
            &label,
            &q.style,
            &q.text,
            &q.comment_label,
            Some((&q.options, q.randomize, Some((MultipleChoiceKind::RankExactly, q.limit)))),
            None,
        )?,
    };

    Ok((
        TemplateQuestion { category, label, kind },
        TemplateLocalization { template: TemplateId::default(), language, body },
    ))
}

/// Compiles an additional localization for an existing template question.
pub fn compile_template_localization(
    source: &SourceTemplateLocalization,
    template: &TemplateQuestion,
    template_id: TemplateId,
) -> Result<TemplateLocalization> {
    let language = source.language().validate()?;
    let body = match source {
        SourceTemplateLocalization::Message { text, .. } => {
            LocalizationBody::Message { text: text.clone() }
        }
        SourceTemplateLocalization::Input { text, comment_label, .. } => {
            LocalizationBody::Input { text: text.clone(), comment_label: comment_label.clone() }
        }
        SourceTemplateLocalization::Options { text, comment_label, options, .. } => {
            LocalizationBody::Options {
                text: text.clone(),
                comment_label: comment_label.clone(),
                options: options
                    .iter()
                    .map(|option| OptionLocalization {
                        label: option.label.clone(),
                        comment_label: option.comment_label.clone(),
                    })
                    .collect(),
            }
        }
    };
    body.check(&template.label, &template.kind)?;
    Ok(TemplateLocalization { template: template_id, language, body })
}

/// Rebuilds the source form of a compiled questionnaire under one of its
/// localizations. Compiling the result again yields an equivalent graph:
/// option and transition order are preserved, and synthesized catch-alls
/// reappear as explicit transitions to the next question.
pub fn decompile(
    questionnaire: &Questionnaire,
    localization: &QuestionnaireLocalization,
    templates: &dyn TemplateSource,
) -> Result<SourceQuestionnaire> {
    let mut questions = Vec::with_capacity(questionnaire.len());

    for (index, question) in questionnaire.questions.iter().enumerate() {
        let id = QuestionId(index);
        let transitions = decompile_transitions(questionnaire, question)?;

        let source = match &question.kind {
            QuestionKind::Message { body } => {
                let entry = localization
                    .find(id)
                    .ok_or_else(|| Error::LocalizationMissing { label: question.label.clone() })?;
                SourceQuestion::Message(crate::spec::question::SourceMessage {
                    label: question.label.clone(),
                    style: body.style.clone(),
                    text: decompile_text(questionnaire, body, entry.body.text())?,
                    transitions,
                })
            }
            QuestionKind::Input { body, optional, .. } => {
                let entry = localization
                    .find(id)
                    .ok_or_else(|| Error::LocalizationMissing { label: question.label.clone() })?;
                SourceQuestion::Input(crate::spec::question::SourceInput {
                    label: question.label.clone(),
                    style: body.style.clone(),
                    text: decompile_text(questionnaire, body, entry.body.text())?,
                    comment_label: entry.body.comment_label().to_string(),
                    optional: *optional,
                    transitions,
                })
            }
            QuestionKind::Select { body, randomize, .. } => {
                let entry = localization
                    .find(id)
                    .ok_or_else(|| Error::LocalizationMissing { label: question.label.clone() })?;
                SourceQuestion::Select(crate::spec::question::SourceSelect {
                    label: question.label.clone(),
                    style: body.style.clone(),
                    text: decompile_text(questionnaire, body, entry.body.text())?,
                    comment_label: entry.body.comment_label().to_string(),
                    options: decompile_options(&entry.body),
                    randomize: *randomize,
                    transitions,
                })
            }
            QuestionKind::MultipleChoice { body, kind, randomize, limit, .. } => {
                let entry = localization
                    .find(id)
                    .ok_or_else(|| Error::LocalizationMissing { label: question.label.clone() })?;
                let multiple = SourceMultipleChoice {
                    label: question.label.clone(),
                    style: body.style.clone(),
                    text: decompile_text(questionnaire, body, entry.body.text())?,
                    comment_label: entry.body.comment_label().to_string(),
                    options: decompile_options(&entry.body),
                    randomize: *randomize,
                    limit: *limit,
                    transitions,
                };
                match kind {
                    MultipleChoiceKind::SelectAtMost => SourceQuestion::SelectAtMost(multiple),
                    MultipleChoiceKind::SelectExactly => SourceQuestion::SelectExactly(multiple),
                    MultipleChoiceKind::RankAtMost => SourceQuestion::RankAtMost(multiple),
                    MultipleChoiceKind::RankExactly => SourceQuestion::RankExactly(multiple),
                }
            }
            QuestionKind::FromTemplate { template } => {
                let template = templates
                    .template(*template)
                    .ok_or_else(|| Error::TemplateMissing { label: question.label.clone() })?;
                SourceQuestion::FromTemplate(crate::spec::question::SourceFromTemplate {
                    label: question.label.clone(),
                    template: template.label.clone(),
                    transitions,
                })
            }
            QuestionKind::BeginLoop { operand_question, variable, operand } => {
                SourceQuestion::BeginLoop(crate::spec::question::SourceBeginLoop {
                    label: question.label.clone(),
                    question: questionnaire.question(*operand_question)?.label.clone(),
                    variable: variable.clone(),
                    operand: operand.clone(),
                    transitions,
                })
            }
            QuestionKind::EndLoop => SourceQuestion::EndLoop(crate::spec::question::SourceEndLoop {
                label: question.label.clone(),
                transitions,
            }),
        };
        questions.push(source);
    }

    Ok(SourceQuestionnaire {
        code: questionnaire.code.clone(),
        name: questionnaire.name.clone(),
        logo: questionnaire.logo.clone(),
        title: localization.title.clone(),
        language: localization.language,
        questions,
    })
}

fn decompile_transitions(
    questionnaire: &Questionnaire,
    question: &Question,
) -> Result<Vec<SourceTransition>> {
    question
        .transitions
        .iter()
        .map(|transition| {
            let destination = questionnaire.question(transition.destination)?.label.clone();
            let (code, parameters) = match &transition.condition {
                // The condition was folded into code at compile time; the
                // bare form is not reconstructed.
                Some(function) => (
                    function.code.clone(),
                    function
                        .parameters
                        .iter()
                        .map(|parameter| {
                            Ok(questionnaire.question(*parameter)?.label.clone())
                        })
                        .collect::<Result<Vec<_>>>()?,
                ),
                None => (String::new(), Vec::new()),
            };
            Ok(SourceTransition { parameters, condition: String::new(), code, destination })
        })
        .collect()
}

fn decompile_text(
    questionnaire: &Questionnaire,
    body: &TextBody,
    text: &str,
) -> Result<SourceText> {
    let functions = body
        .text_functions
        .iter()
        .map(|function| {
            Ok(SourceFunction {
                parameters: function
                    .parameters
                    .iter()
                    .map(|parameter| Ok(questionnaire.question(*parameter)?.label.clone()))
                    .collect::<Result<Vec<_>>>()?,
                code: function.code.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SourceText { functions, value: text.to_string() })
}

fn decompile_options(body: &LocalizationBody) -> Vec<SourceOption> {
    body.options()
        .iter()
        .map(|option| SourceOption {
            label: option.label.clone(),
            comment_label: option.comment_label.clone(),
        })
        .collect()
}

/// Rebuilds the source form of an uploaded localization.
pub fn decompile_localization(
    questionnaire: &Questionnaire,
    localization: &QuestionnaireLocalization,
) -> Result<SourceQuestionnaireLocalization> {
    let questions = localization
        .entries
        .iter()
        .map(|entry| {
            let label = questionnaire.question(entry.question)?.label.clone();
            Ok(match &entry.body {
                LocalizationBody::Message { text } => {
                    SourceQuestionLocalization::Message { label, text: text.clone() }
                }
                LocalizationBody::Input { text, comment_label } => {
                    SourceQuestionLocalization::Input {
                        label,
                        text: text.clone(),
                        comment_label: comment_label.clone(),
                    }
                }
                LocalizationBody::Options { text, comment_label, options } => {
                    SourceQuestionLocalization::Options {
                        label,
                        text: text.clone(),
                        comment_label: comment_label.clone(),
                        options: options
                            .iter()
                            .map(|option| crate::spec::localization::SourceOptionLocalization {
                                label: option.label.clone(),
                                comment_label: option.comment_label.clone(),
                            })
                            .collect(),
                    }
                }
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SourceQuestionnaireLocalization {
        title: localization.title.clone(),
        language: localization.language,
        questions,
    })
}

/// Rebuilds the upload form of a template question under one of its
/// localizations.
pub fn decompile_template(
    template: &TemplateQuestion,
    localization: &TemplateLocalization,
) -> Result<SourceTemplateQuestion> {
    let body = &localization.body;
    let source = match &template.kind {
        QuestionKind::Message { body: text_body } => SourceTemplateQuestion::Message {
            language: localization.language,
            label: template.label.clone(),
            style: text_body.style.clone(),
            text: body.text().to_string(),
        },
        QuestionKind::Input { body: text_body, optional, .. } => SourceTemplateQuestion::Input {
            language: localization.language,
            label: template.label.clone(),
            style: text_body.style.clone(),
            text: body.text().to_string(),
            comment_label: body.comment_label().to_string(),
            optional: *optional,
        },
        QuestionKind::Select { body: text_body, randomize, .. } => {
            SourceTemplateQuestion::Select {
                language: localization.language,
                label: template.label.clone(),
                style: text_body.style.clone(),
                text: body.text().to_string(),
                comment_label: body.comment_label().to_string(),
                options: decompile_options(body),
                randomize: *randomize,
            }
        }
        QuestionKind::MultipleChoice { body: text_body, kind, randomize, limit, .. } => {
            let multiple = crate::spec::template::SourceTemplateMultipleChoice {
                language: localization.language,
                label: template.label.clone(),
                style: text_body.style.clone(),
                text: body.text().to_string(),
                comment_label: body.comment_label().to_string(),
                options: decompile_options(body),
                randomize: *randomize,
                limit: *limit,
            };
            match kind {
                MultipleChoiceKind::SelectAtMost => SourceTemplateQuestion::SelectAtMost(multiple),
                MultipleChoiceKind::SelectExactly => {
                    SourceTemplateQuestion::SelectExactly(multiple)
                }
                MultipleChoiceKind::RankAtMost => SourceTemplateQuestion::RankAtMost(multiple),
                MultipleChoiceKind::RankExactly => SourceTemplateQuestion::RankExactly(multiple),
            }
        }
        _ => return Err(Error::Internal),
    };
    Ok(source)
}

/// Rebuilds the upload form of a template localization alone.
pub fn decompile_template_localization(
    localization: &TemplateLocalization,
) -> SourceTemplateLocalization {
    match &localization.body {
        LocalizationBody::Message { text } => SourceTemplateLocalization::Message {
            language: localization.language,
            text: text.clone(),
        },
        LocalizationBody::Input { text, comment_label } => SourceTemplateLocalization::Input {
            language: localization.language,
            text: text.clone(),
            comment_label: comment_label.clone(),
        },
        LocalizationBody::Options { text, comment_label, options } => {
            SourceTemplateLocalization::Options {
                language: localization.language,
                text: text.clone(),
                comment_label: comment_label.clone(),
                options: options
                    .iter()
                    .map(|option| SourceOption {
                        label: option.label.clone(),
                        comment_label: option.comment_label.clone(),
                    })
                    .collect(),
            }
        }
    }
}
