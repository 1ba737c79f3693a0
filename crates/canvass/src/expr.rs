use std::sync::{Mutex, OnceLock};

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by the expression host.
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("script parse error: {0}")]
    Parse(String),
    #[error("script produced no value")]
    Undefined,
    #[error("script evaluation error: {0}")]
    Eval(String),
}

/// Embedded expression evaluator consumed by transition conditions,
/// parametric-text functions, and loop operands.
///
/// `inject` binds a name for the next `execute` only; the bindings are
/// consumed whether the execution succeeds or fails. Assignments made by a
/// snippet persist in a process-wide scope across executions.
pub trait Expr {
    /// Syntactic check only. No bindings are consumed.
    fn compile(&mut self, code: &str) -> Result<(), ExprError>;

    /// Bind `name` to `value` for the next execution.
    fn inject(&mut self, name: &str, value: Value);

    /// Run a snippet and return the value of its last statement.
    /// An absent (undefined) result is reported as `ExprError::Undefined`,
    /// which callers distinguish from an explicit `null`.
    fn execute(&mut self, code: &str) -> Result<Value, ExprError>;

    /// A scalar is truthy iff it is boolean true or a non-zero number.
    fn is_truthy(&self, value: &Value) -> bool {
        match value {
            Value::Bool(flag) => *flag,
            Value::Number(num) => num.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        }
    }
}

/// The process-wide script engine, initialized lazily on first use.
pub fn shared() -> &'static Mutex<Script> {
    static SHARED: OnceLock<Mutex<Script>> = OnceLock::new();
    SHARED.get_or_init(|| Mutex::new(Script::new()))
}

/// Default `Expr` implementation: a small expression language over JSON
/// values with dotted-path access, comparison and boolean operators,
/// assignment, and the preloaded helper library (`firstToLower`,
/// `removeFinalPeriod`, `selected`, `notSelected`, `parseJson`).
#[derive(Debug, Default)]
pub struct Script {
    globals: Map<String, Value>,
    injected: Map<String, Value>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Expr for Script {
    fn compile(&mut self, code: &str) -> Result<(), ExprError> {
        parse(code).map(|_| ())
    }

    fn inject(&mut self, name: &str, value: Value) {
        self.injected.insert(name.to_string(), value);
    }

    fn execute(&mut self, code: &str) -> Result<Value, ExprError> {
        let program = match parse(code) {
            Ok(program) => program,
            Err(err) => {
                self.injected.clear();
                return Err(err);
            }
        };

        let mut result = None;
        for stmt in &program.stmts {
            result = match eval_stmt(stmt, self) {
                Ok(value) => value,
                Err(err) => {
                    self.injected.clear();
                    return Err(err);
                }
            };
        }

        self.injected.clear();
        result.ok_or(ExprError::Undefined)
    }
}

// Evaluation. `None` models JavaScript's undefined; it is distinct from
// `Value::Null` until the two meet in a loose equality.

fn eval_stmt(stmt: &Stmt, scope: &mut Script) -> Result<Option<Value>, ExprError> {
    match stmt {
        Stmt::Assign(name, expr) => {
            let value = eval(expr, scope)?;
            if let Some(value) = &value {
                scope.globals.insert(name.clone(), value.clone());
            } else {
                scope.globals.remove(name);
            }
            Ok(value)
        }
        Stmt::Expr(expr) => eval(expr, scope),
    }
}

fn eval(ast: &Ast, scope: &mut Script) -> Result<Option<Value>, ExprError> {
    match ast {
        Ast::Literal(value) => Ok(Some(value.clone())),
        Ast::Ident(name) => Ok(scope
            .injected
            .get(name)
            .or_else(|| scope.globals.get(name))
            .cloned()),
        Ast::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, scope)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(out)))
        }
        Ast::Member(base, key) => {
            let Some(base) = eval(base, scope)? else {
                return Ok(None);
            };
            Ok(base.get(key.as_str()).cloned())
        }
        Ast::Index(base, index) => {
            let Some(base) = eval(base, scope)? else {
                return Ok(None);
            };
            let Some(index) = eval(index, scope)? else {
                return Ok(None);
            };
            Ok(match (&base, &index) {
                (Value::Array(items), Value::Number(num)) => num
                    .as_u64()
                    .and_then(|idx| items.get(idx as usize))
                    .cloned(),
                (Value::Object(map), Value::String(key)) => map.get(key).cloned(),
                _ => None,
            })
        }
        Ast::Call(name, args) => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval(arg, scope)?);
            }
            call_helper(name, &values)
        }
        Ast::Not(inner) => {
            let value = eval(inner, scope)?.unwrap_or(Value::Null);
            Ok(Some(Value::Bool(!truthy(&value))))
        }
        Ast::Negate(inner) => {
            let value = eval(inner, scope)?;
            match value.as_ref().and_then(Value::as_f64) {
                Some(n) => Ok(Some(number(-n))),
                None => Ok(None),
            }
        }
        Ast::Binary(op, left, right) => eval_binary(*op, left, right, scope),
    }
}

fn eval_binary(
    op: BinOp,
    left: &Ast,
    right: &Ast,
    scope: &mut Script,
) -> Result<Option<Value>, ExprError> {
    if matches!(op, BinOp::And | BinOp::Or) {
        let lhs = eval(left, scope)?.unwrap_or(Value::Null);
        let lhs_truthy = truthy(&lhs);
        let short_circuit = match op {
            BinOp::And => !lhs_truthy,
            _ => lhs_truthy,
        };
        if short_circuit {
            return Ok(Some(Value::Bool(lhs_truthy)));
        }
        let rhs = eval(right, scope)?.unwrap_or(Value::Null);
        return Ok(Some(Value::Bool(truthy(&rhs))));
    }

    let lhs = eval(left, scope)?;
    let rhs = eval(right, scope)?;

    match op {
        BinOp::Eq => Ok(Some(Value::Bool(loose_eq(&lhs, &rhs)))),
        BinOp::Ne => Ok(Some(Value::Bool(!loose_eq(&lhs, &rhs)))),
        BinOp::Lt => Ok(compare(&lhs, &rhs).map(|o| Value::Bool(o.is_lt()))),
        BinOp::Le => Ok(compare(&lhs, &rhs).map(|o| Value::Bool(o.is_le()))),
        BinOp::Gt => Ok(compare(&lhs, &rhs).map(|o| Value::Bool(o.is_gt()))),
        BinOp::Ge => Ok(compare(&lhs, &rhs).map(|o| Value::Bool(o.is_ge()))),
        BinOp::Add => Ok(match (&lhs, &rhs) {
            (Some(Value::String(a)), Some(Value::String(b))) => {
                Some(Value::String(format!("{a}{b}")))
            }
            _ => arith(&lhs, &rhs, |a, b| a + b),
        }),
        BinOp::Sub => Ok(arith(&lhs, &rhs, |a, b| a - b)),
        BinOp::Mul => Ok(arith(&lhs, &rhs, |a, b| a * b)),
        BinOp::Div => Ok(arith(&lhs, &rhs, |a, b| a / b)),
        BinOp::Rem => Ok(arith(&lhs, &rhs, |a, b| a % b)),
        BinOp::And | BinOp::Or => unreachable!("handled above"),
    }
}

fn arith(lhs: &Option<Value>, rhs: &Option<Value>, f: impl Fn(f64, f64) -> f64) -> Option<Value> {
    let a = lhs.as_ref().and_then(Value::as_f64)?;
    let b = rhs.as_ref().and_then(Value::as_f64)?;
    Some(number(f(a, b)))
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < (i64::MAX as f64) {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(flag) => *flag,
        Value::Number(num) => num.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn loose_eq(lhs: &Option<Value>, rhs: &Option<Value>) -> bool {
    match (lhs, rhs) {
        // undefined == null, undefined == undefined.
        (None, None) => true,
        (None, Some(Value::Null)) | (Some(Value::Null), None) => true,
        (None, _) | (_, None) => false,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        },
    }
}

fn compare(lhs: &Option<Value>, rhs: &Option<Value>) -> Option<std::cmp::Ordering> {
    match (lhs.as_ref()?, rhs.as_ref()?) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

// The helper library. Seeded once per process in spirit; in this engine the
// helpers are native functions resolved by name at call position.

fn call_helper(name: &str, args: &[Option<Value>]) -> Result<Option<Value>, ExprError> {
    let arg = |idx: usize| args.get(idx).cloned().flatten();

    match name {
        "firstToLower" => Ok(Some(first_to_lower(arg(0).unwrap_or(Value::Null)))),
        "removeFinalPeriod" => Ok(Some(remove_final_period(arg(0).unwrap_or(Value::Null)))),
        "selected" => Ok(Some(selected(arg(0), arg(1)))),
        "notSelected" => Ok(Some(not_selected(arg(0), arg(1)))),
        "parseJson" => Ok(Some(parse_json(arg(0)))),
        other => Err(ExprError::Eval(format!("unknown function '{other}'"))),
    }
}

fn first_to_lower(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(first_to_lower).collect()),
        Value::String(text) => {
            let mut chars = text.chars();
            match chars.next() {
                Some(first) => Value::String(first.to_lowercase().chain(chars).collect()),
                None => Value::String(text),
            }
        }
        other => other,
    }
}

fn remove_final_period(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(remove_final_period).collect()),
        Value::String(text) => match text.strip_suffix('.') {
            Some(stripped) => Value::String(stripped.to_string()),
            None => Value::String(text),
        },
        other => other,
    }
}

fn option_label(option: &Value) -> Value {
    option.get("label").cloned().unwrap_or(Value::Null)
}

fn choice_indexes(choices: &Value) -> Vec<u64> {
    choices
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|choice| choice.get("index").and_then(Value::as_u64))
                .collect()
        })
        .unwrap_or_default()
}

fn selected(options: Option<Value>, choices: Option<Value>) -> Value {
    let (Some(options), Some(choices)) = (options, choices) else {
        return Value::Array(Vec::new());
    };
    let Some(options) = options.as_array() else {
        return Value::Array(Vec::new());
    };
    let picked = choice_indexes(&choices);
    Value::Array(
        options
            .iter()
            .enumerate()
            .filter(|(idx, _)| picked.contains(&(*idx as u64)))
            .map(|(_, option)| option_label(option))
            .collect(),
    )
}

fn not_selected(options: Option<Value>, choices: Option<Value>) -> Value {
    let Some(options) = options else {
        return Value::Array(Vec::new());
    };
    let Some(options) = options.as_array() else {
        return Value::Array(Vec::new());
    };
    // Absent choices means nothing was selected: all labels qualify.
    let picked = choices.map(|choices| choice_indexes(&choices)).unwrap_or_default();
    Value::Array(
        options
            .iter()
            .enumerate()
            .filter(|(idx, _)| !picked.contains(&(*idx as u64)))
            .map(|(_, option)| option_label(option))
            .collect(),
    )
}

fn parse_json(value: Option<Value>) -> Value {
    match value {
        Some(Value::String(text)) => serde_json::from_str(&text).unwrap_or(Value::Null),
        Some(other) => other,
        None => Value::Null,
    }
}

// Parsing.

struct Program {
    stmts: Vec<Stmt>,
}

enum Stmt {
    Assign(String, Ast),
    Expr(Ast),
}

enum Ast {
    Literal(Value),
    Ident(String),
    Array(Vec<Ast>),
    Member(Box<Ast>, String),
    Index(Box<Ast>, Box<Ast>),
    Call(String, Vec<Ast>),
    Not(Box<Ast>),
    Negate(Box<Ast>),
    Binary(BinOp, Box<Ast>, Box<Ast>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(&'static str),
}

fn tokenize(code: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let bytes = code.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < bytes.len()
                && ((bytes[i] as char).is_ascii_alphanumeric()
                    || bytes[i] == b'_'
                    || bytes[i] == b'$')
            {
                i += 1;
            }
            tokens.push(Token::Ident(code[start..i].to_string()));
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let text = &code[start..i];
            let num = text
                .parse::<f64>()
                .map_err(|_| ExprError::Parse(format!("bad number '{text}'")))?;
            tokens.push(Token::Number(num));
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            i += 1;
            let mut text = String::new();
            let mut iter = code[i..].char_indices();
            loop {
                let Some((offset, ch)) = iter.next() else {
                    return Err(ExprError::Parse("unterminated string".into()));
                };
                if ch == quote {
                    i += offset + ch.len_utf8();
                    break;
                }
                if ch == '\\' {
                    let Some((_, escaped)) = iter.next() else {
                        return Err(ExprError::Parse("unterminated string".into()));
                    };
                    match escaped {
                        'n' => text.push('\n'),
                        't' => text.push('\t'),
                        other => text.push(other),
                    }
                } else {
                    text.push(ch);
                }
            }
            tokens.push(Token::Str(text));
            continue;
        }

        let two = code.get(i..i + 2);
        let punct = match two {
            Some("==") => Some("=="),
            Some("!=") => Some("!="),
            Some("<=") => Some("<="),
            Some(">=") => Some(">="),
            Some("&&") => Some("&&"),
            Some("||") => Some("||"),
            _ => None,
        };
        if let Some(punct) = punct {
            tokens.push(Token::Punct(punct));
            i += 2;
            continue;
        }

        let punct = match c {
            '(' => "(",
            ')' => ")",
            '[' => "[",
            ']' => "]",
            '.' => ".",
            ',' => ",",
            ';' => ";",
            '=' => "=",
            '<' => "<",
            '>' => ">",
            '!' => "!",
            '+' => "+",
            '-' => "-",
            '*' => "*",
            '/' => "/",
            '%' => "%",
            other => return Err(ExprError::Parse(format!("unexpected character '{other}'"))),
        };
        tokens.push(Token::Punct(punct));
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse(code: &str) -> Result<Program, ExprError> {
    let mut parser = Parser { tokens: tokenize(code)?, pos: 0 };
    let mut stmts = Vec::new();

    loop {
        while parser.eat_punct(";") {}
        if parser.at_end() {
            break;
        }
        stmts.push(parser.stmt()?);
        if !parser.at_end() && !parser.eat_punct(";") {
            return Err(ExprError::Parse("expected ';' between statements".into()));
        }
    }

    Ok(Program { stmts })
}

impl Parser {
    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn stmt(&mut self) -> Result<Stmt, ExprError> {
        // Lookahead for `name = expr` (and not `==`).
        if let Some(Token::Ident(name)) = self.peek().cloned()
            && matches!(self.tokens.get(self.pos + 1), Some(Token::Punct("=")))
        {
            self.pos += 2;
            let value = self.expr()?;
            return Ok(Stmt::Assign(name, value));
        }
        Ok(Stmt::Expr(self.expr()?))
    }

    fn expr(&mut self) -> Result<Ast, ExprError> {
        self.binary(0)
    }

    fn binary(&mut self, min_level: u8) -> Result<Ast, ExprError> {
        let mut lhs = self.unary()?;

        loop {
            let Some(Token::Punct(punct)) = self.peek() else {
                break;
            };
            let Some((op, level)) = binop(punct) else {
                break;
            };
            if level < min_level {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(level + 1)?;
            lhs = Ast::Binary(op, Box::new(lhs), Box::new(rhs));
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Ast, ExprError> {
        if self.eat_punct("!") {
            return Ok(Ast::Not(Box::new(self.unary()?)));
        }
        if self.eat_punct("-") {
            return Ok(Ast::Negate(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Ast, ExprError> {
        let mut base = self.primary()?;

        loop {
            if self.eat_punct(".") {
                match self.next() {
                    Some(Token::Ident(name)) => base = Ast::Member(Box::new(base), name),
                    _ => return Err(ExprError::Parse("expected a name after '.'".into())),
                }
            } else if self.eat_punct("[") {
                let index = self.expr()?;
                if !self.eat_punct("]") {
                    return Err(ExprError::Parse("expected ']'".into()));
                }
                base = Ast::Index(Box::new(base), Box::new(index));
            } else if self.eat_punct("(") {
                let Ast::Ident(name) = base else {
                    return Err(ExprError::Parse("only named functions can be called".into()));
                };
                let mut args = Vec::new();
                if !self.eat_punct(")") {
                    loop {
                        args.push(self.expr()?);
                        if self.eat_punct(")") {
                            break;
                        }
                        if !self.eat_punct(",") {
                            return Err(ExprError::Parse("expected ',' or ')'".into()));
                        }
                    }
                }
                base = Ast::Call(name, args);
            } else {
                break;
            }
        }

        Ok(base)
    }

    fn primary(&mut self) -> Result<Ast, ExprError> {
        match self.next() {
            Some(Token::Number(num)) => Ok(Ast::Literal(number(num))),
            Some(Token::Str(text)) => Ok(Ast::Literal(Value::String(text))),
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Ast::Literal(Value::Bool(true))),
                "false" => Ok(Ast::Literal(Value::Bool(false))),
                "null" => Ok(Ast::Literal(Value::Null)),
                _ => Ok(Ast::Ident(name)),
            },
            Some(Token::Punct("(")) => {
                let inner = self.expr()?;
                if !self.eat_punct(")") {
                    return Err(ExprError::Parse("expected ')'".into()));
                }
                Ok(inner)
            }
            Some(Token::Punct("[")) => {
                let mut items = Vec::new();
                if !self.eat_punct("]") {
                    loop {
                        items.push(self.expr()?);
                        if self.eat_punct("]") {
                            break;
                        }
                        if !self.eat_punct(",") {
                            return Err(ExprError::Parse("expected ',' or ']'".into()));
                        }
                    }
                }
                Ok(Ast::Array(items))
            }
            other => Err(ExprError::Parse(format!("unexpected token {other:?}"))),
        }
    }
}

fn binop(punct: &str) -> Option<(BinOp, u8)> {
    Some(match punct {
        "||" => (BinOp::Or, 1),
        "&&" => (BinOp::And, 2),
        "==" => (BinOp::Eq, 3),
        "!=" => (BinOp::Ne, 3),
        "<" => (BinOp::Lt, 4),
        "<=" => (BinOp::Le, 4),
        ">" => (BinOp::Gt, 4),
        ">=" => (BinOp::Ge, 4),
        "+" => (BinOp::Add, 5),
        "-" => (BinOp::Sub, 5),
        "*" => (BinOp::Mul, 6),
        "/" => (BinOp::Div, 6),
        "%" => (BinOp::Rem, 6),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(engine: &mut Script, code: &str) -> Value {
        engine.execute(code).expect("script should evaluate")
    }

    #[test]
    fn injected_bindings_are_consumed_by_execute() {
        let mut engine = Script::new();
        engine.inject("q1", json!({ "input": "hello" }));
        assert_eq!(run(&mut engine, "q1.input"), json!("hello"));
        assert!(matches!(engine.execute("q1.input"), Err(ExprError::Undefined)));
    }

    #[test]
    fn assignments_persist_in_the_shared_scope() {
        let mut engine = Script::new();
        run(&mut engine, "counter = 41");
        assert_eq!(run(&mut engine, "counter + 1"), json!(42));
    }

    #[test]
    fn conditions_compare_paths_and_literals() {
        let mut engine = Script::new();
        engine.inject("q1", json!({ "choice": { "index": 0 } }));
        assert_eq!(run(&mut engine, "q1.choice.index == 0"), json!(true));
        engine.inject("q1", json!({ "choice": { "index": 1 } }));
        assert_eq!(run(&mut engine, "q1.choice.index == 0"), json!(false));
    }

    #[test]
    fn undefined_equals_null_loosely() {
        let mut engine = Script::new();
        engine.inject("q1", json!({ "input": "x" }));
        assert_eq!(run(&mut engine, "q1.missing == null"), json!(true));
    }

    #[test]
    fn truthiness_matches_booleans_and_nonzero_numbers() {
        let engine = Script::new();
        assert!(engine.is_truthy(&json!(true)));
        assert!(engine.is_truthy(&json!(2)));
        assert!(!engine.is_truthy(&json!(0)));
        assert!(!engine.is_truthy(&json!("yes")));
        assert!(!engine.is_truthy(&Value::Null));
    }

    #[test]
    fn helpers_operate_on_options_and_choices() {
        let mut engine = Script::new();
        engine.inject(
            "q",
            json!({
                "options": [{ "label": "Red" }, { "label": "Blue" }, { "label": "Green" }],
                "choices": [{ "index": 0 }, { "index": 2 }]
            }),
        );
        assert_eq!(
            run(&mut engine, "selected(q.options, q.choices)"),
            json!(["Red", "Green"])
        );
        engine.inject(
            "q",
            json!({
                "options": [{ "label": "Red" }, { "label": "Blue" }],
                "choices": [{ "index": 0 }]
            }),
        );
        assert_eq!(run(&mut engine, "notSelected(q.options, q.choices)"), json!(["Blue"]));
    }

    #[test]
    fn helpers_map_over_arrays() {
        let mut engine = Script::new();
        assert_eq!(
            run(&mut engine, "firstToLower(['Apples', 'Pears'])"),
            json!(["apples", "pears"])
        );
        assert_eq!(run(&mut engine, "removeFinalPeriod('Done.')"), json!("Done"));
    }

    #[test]
    fn parse_json_unwraps_serialized_payloads() {
        let mut engine = Script::new();
        engine.inject("q1", json!({ "input": "{\"list\":[\"a\",\"b\"]}" }));
        assert_eq!(run(&mut engine, "R = parseJson(q1.input).list"), json!(["a", "b"]));
    }

    #[test]
    fn the_shared_engine_keeps_one_scope_per_process() {
        {
            let mut engine = shared().lock().expect("engine lock");
            engine.execute("shared_probe = 7").expect("assignment");
        }
        let mut engine = shared().lock().expect("engine lock");
        assert_eq!(
            engine.execute("shared_probe").expect("still bound"),
            json!(7)
        );
    }

    #[test]
    fn compile_rejects_malformed_snippets() {
        let mut engine = Script::new();
        assert!(engine.compile("q1.choice.index == 0").is_ok());
        assert!(engine.compile("q1 ==").is_err());
        assert!(engine.compile("(q1").is_err());
    }
}
