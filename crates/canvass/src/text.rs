use serde_json::Value;

use crate::error::{Error, Result};
use crate::expr::{Expr, ExprError};
use crate::model::question::TextBody;
use crate::stack::{EvalCtx, Stack};
use crate::view;

const EVAL_PREFIX: char = '@';
const EVAL_OPEN: char = '{';
const EVAL_CLOSE: char = '}';

/// Renders a localized text template, substituting `@{N}` escapes with text
/// function results and `@{NAME}` escapes with loop-variable values.
///
/// A stray `@` or an unterminated escape is passed through verbatim. Each
/// text function is called at most once per render; its value is memoized.
/// The question label is carried only for error reporting.
pub fn calculate_text(
    ctx: &EvalCtx<'_>,
    expr: &mut dyn Expr,
    stack: &Stack,
    label: &str,
    body: &TextBody,
    template: &str,
) -> Result<String> {
    // The common case has no functions and no active loop; nothing to do.
    if body.text_functions.is_empty() && stack.is_plain() {
        return Ok(template.to_string());
    }

    let mut memo: Vec<Option<Value>> = vec![None; body.text_functions.len()];
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != EVAL_PREFIX {
            out.push(c);
            continue;
        }

        if chars.peek() != Some(&EVAL_OPEN) {
            out.push(EVAL_PREFIX);
            continue;
        }
        chars.next();

        // Accumulate up to the closing brace; on exhaustion the escape is
        // emitted as-is.
        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == EVAL_CLOSE {
                closed = true;
                break;
            }
            name.push(c);
        }

        if !closed {
            out.push(EVAL_PREFIX);
            out.push(EVAL_OPEN);
            out.push_str(&name);
            break;
        }

        let value = if name.chars().all(|c| c.is_ascii_digit()) && !name.is_empty() {
            let mut index = 0usize;
            for c in name.chars() {
                index = index
                    .saturating_mul(10)
                    .saturating_add(c as usize - '0' as usize);
            }
            call_function(ctx, expr, stack, label, body, &mut memo, index)?
        } else {
            stack
                .loop_variable(ctx, &name)?
                .ok_or_else(|| Error::LoopVariableUnknown { label: label.to_string() })?
        };

        push_value(&mut out, &value);
    }

    Ok(out)
}

/// Calls text function `index`, injecting one argument per parameter
/// question: the localized answer data of the most recent answer in the
/// stack, or null when the transitions skipped the question. The current
/// language is injected under the two reserved names.
fn call_function(
    ctx: &EvalCtx<'_>,
    expr: &mut dyn Expr,
    stack: &Stack,
    label: &str,
    body: &TextBody,
    memo: &mut [Option<Value>],
    index: usize,
) -> Result<Value> {
    if index >= body.text_functions.len() {
        return Err(Error::FunctionCallOutOfBounds { label: label.to_string() });
    }
    if let Some(value) = &memo[index] {
        return Ok(value.clone());
    }

    let function = &body.text_functions[index];

    // Arguments are rendered before any of them is injected: rendering one
    // may itself run snippets, which would consume pending bindings.
    let mut arguments = Vec::with_capacity(function.parameters.len());
    for parameter in &function.parameters {
        let name = ctx.questionnaire.question(*parameter)?.label.clone();
        let value = match stack.find_answer(*parameter) {
            Some(answer) => view::localized_answer_argument(ctx, expr, stack, answer)?,
            None => Value::Null,
        };
        arguments.push((name, value));
    }

    for (name, value) in arguments {
        expr.inject(&name, value);
    }
    expr.inject(crate::LANGUAGE_VAR, Value::from(ctx.language.0));
    expr.inject(crate::LANGUAGE_STR2_VAR, Value::from(ctx.language.str2()));

    let value = match expr.execute(&function.code) {
        Ok(value) => value,
        Err(ExprError::Undefined) => Value::Null,
        Err(err) => return Err(err.into()),
    };

    memo[index] = Some(value.clone());
    Ok(value)
}

/// Strings substitute without quotes; anything else in canonical JSON form.
fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::String(text) => out.push_str(text),
        other => out.push_str(&other.to_string()),
    }
}
