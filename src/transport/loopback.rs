//! An in-process engine session.
//!
//! Keeps a workspace and a function table and understands a small
//! command language: `name = expr`, `[a, b] = expr` and bare `expr`, where
//! `expr` is a literal, a name, or a call `f(expr, ...)`. Enough to drive
//! the interactor surface end to end without a real engine.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use super::{Binding, Request, Response, Transport};
use crate::error::Result;
use crate::value::{Value, is_identifier};

/// Engine-side outcome; `Err` carries the engine's error message.
pub type EvalResult<T> = std::result::Result<T, String>;

type Function = Arc<dyn Fn(&[Value], usize) -> EvalResult<Vec<Value>> + Send + Sync>;

struct Entry {
    /// Declared output count; negative means variadic.
    nargout: i32,
    body: Function,
}

pub struct LoopbackEngine {
    workspace: HashMap<String, Value>,
    functions: HashMap<String, Entry>,
    exited: bool,
}

impl Default for LoopbackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackEngine {
    /// A fresh session with the built-in functions registered.
    pub fn new() -> Self {
        let mut engine = Self {
            workspace: HashMap::new(),
            functions: HashMap::new(),
            exited: false,
        };
        engine.register("plus", 1, |args, _| binary("plus", args, |a, b| a + b));
        engine.register("minus", 1, |args, _| binary("minus", args, |a, b| a - b));
        engine.register("times", 1, |args, _| binary("times", args, |a, b| a * b));
        engine.register("deal", -1, deal);
        engine.register("size", -1, size);
        engine.register(
            "class",
            1,
            |args, _| Ok(vec![Value::from(one("class", args)?.class_name())]),
        );
        engine.register(
            "numel",
            1,
            |args, _| Ok(vec![Value::from(one("numel", args)?.numel())]),
        );
        engine.register(
            "isequal",
            1,
            |args, _| match args {
                [first, rest @ ..] if !rest.is_empty() => {
                    Ok(vec![Value::Logical(rest.iter().all(|v| v == first))])
                }
                _ => Err("Not enough input arguments.".to_string()),
            },
        );
        engine.register("zeros", 1, zeros);
        engine.register(
            "error",
            0,
            |args, _| match args.first().and_then(Value::as_str) {
                Some(message) => Err(message.to_string()),
                None => Err("Unspecified error.".to_string()),
            },
        );
        engine
    }

    /// Add or replace a function. The body receives the arguments and the
    /// requested output count. `nargout < 0` declares it variadic.
    pub fn register<F>(&mut self, name: &str, nargout: i32, body: F)
    where
        F: Fn(&[Value], usize) -> EvalResult<Vec<Value>> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.to_string(),
            Entry {
                nargout,
                body: Arc::new(body),
            },
        );
    }

    /// Current value of a workspace variable.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.workspace.get(name)
    }

    pub fn has_exited(&self) -> bool {
        self.exited
    }

    fn handle(&mut self, request: Request) -> Response {
        if self.exited {
            return Response::Exited;
        }
        let outcome = match request {
            Request::Exit => {
                self.exited = true;
                Ok(Response::Done)
            }
            Request::Nargout { function } => self
                .functions
                .get(&function)
                .map(|entry| Response::Count(entry.nargout))
                .ok_or_else(|| undefined_function(&function)),
            Request::SetVariable { name, value } => {
                if !is_identifier(&name) {
                    Err(format!("Invalid variable name '{name}'."))
                } else if let Err(e) = value.validate() {
                    Err(format!("Cannot assign '{name}': {e}."))
                } else {
                    self.workspace.insert(name, value);
                    Ok(Response::Done)
                }
            }
            Request::GetVariable { name } => self
                .workspace
                .get(&name)
                .map(|v| Response::Values(vec![v.clone()]))
                .ok_or_else(|| format!("Undefined variable '{name}'.")),
            Request::Eval {
                command,
                return_count,
                bindings,
            } => bindings
                .iter()
                .try_for_each(|b| b.value.validate())
                .and_then(|()| {
                    let scope = Scope::new(&bindings);
                    self.eval_command(&command, return_count, &scope)
                })
                .map(Response::Values),
            Request::Feval {
                function,
                args,
                return_count,
            } => args
                .iter()
                .try_for_each(Value::validate)
                .and_then(|()| self.call(&function, &args, return_count))
                .map(Response::Values),
        };
        outcome.unwrap_or_else(|message| Response::Error { message })
    }

    fn eval_command(
        &mut self,
        command: &str,
        return_count: usize,
        scope: &Scope,
    ) -> EvalResult<Vec<Value>> {
        let command = command.trim().trim_end_matches(';').trim();
        if command.is_empty() {
            return Ok(Vec::new());
        }

        if let Some((targets, rhs)) = split_assignment(command) {
            for target in &targets {
                if scope.contains(target) {
                    return Err(format!("Cannot assign to read-only value '{target}'."));
                }
            }
            let values = self.eval_expr(rhs, targets.len(), scope)?;
            if values.len() < targets.len() {
                return Err("Too many output arguments.".to_string());
            }
            for (target, value) in targets.into_iter().zip(values) {
                self.workspace.insert(target, value);
            }
            return Ok(Vec::new());
        }

        let values = self.eval_expr(command, return_count.max(1), scope)?;
        if return_count == 0 {
            return Ok(Vec::new());
        }
        Ok(values)
    }

    fn eval_expr(&self, expr: &str, nargout: usize, scope: &Scope) -> EvalResult<Vec<Value>> {
        let expr = expr.trim();
        if let Some(literal) = Value::parse_literal(expr) {
            return Ok(vec![literal]);
        }
        if is_identifier(expr) {
            if let Some(value) = scope.get(expr).or_else(|| self.workspace.get(expr)) {
                return Ok(vec![value.clone()]);
            }
            return self.call(expr, &[], nargout);
        }
        if let Some((name, inner)) = split_call(expr) {
            if scope.contains(name) || self.workspace.contains_key(name) {
                return Err(format!("Indexing into '{name}' is not supported."));
            }
            let mut args = Vec::new();
            for arg in split_args(inner)? {
                let value = self
                    .eval_expr(arg, 1, scope)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| format!("'{arg}' produced no value."))?;
                args.push(value);
            }
            return self.call(name, &args, nargout);
        }
        Err(format!("Parse error in expression: {expr}"))
    }

    fn call(&self, function: &str, args: &[Value], nargout: usize) -> EvalResult<Vec<Value>> {
        let entry = self
            .functions
            .get(function)
            .ok_or_else(|| undefined_function(function))?;
        (entry.body)(args, nargout)
    }
}

#[async_trait]
impl Transport for LoopbackEngine {
    async fn send(&mut self, request: Request) -> Result<Response> {
        Ok(self.handle(request))
    }
}

/// Read-only names bound for the duration of one request.
struct Scope<'a> {
    bindings: &'a [Binding],
}

impl<'a> Scope<'a> {
    fn new(bindings: &'a [Binding]) -> Self {
        Self { bindings }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.bindings
            .iter()
            .find(|b| b.name == name)
            .map(|b| &b.value)
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

fn undefined_function(name: &str) -> String {
    format!("Undefined function or variable '{name}'.")
}

/// `x = rhs` or `[a, b] = rhs`. `==` is not an assignment.
fn split_assignment(command: &str) -> Option<(Vec<String>, &str)> {
    let pos = command.find('=')?;
    let rhs = &command[pos + 1..];
    if rhs.starts_with('=') {
        return None;
    }
    let lhs = command[..pos].trim();
    let targets: Vec<String> = match lhs.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
        Some(list) => list
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        None => vec![lhs.to_string()],
    };
    if targets.is_empty() || !targets.iter().all(|t| is_identifier(t)) {
        return None;
    }
    Some((targets, rhs))
}

/// `name(inner)` with balanced outer parentheses.
fn split_call(expr: &str) -> Option<(&str, &str)> {
    let open = expr.find('(')?;
    let name = expr[..open].trim();
    let inner = expr[open + 1..].strip_suffix(')')?;
    is_identifier(name).then_some((name, inner))
}

/// Split call arguments on top-level commas, honoring quotes and brackets.
fn split_args(inner: &str) -> EvalResult<Vec<&str>> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            (None, ',') if depth == 0 => {
                args.push(inner[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
        if depth < 0 {
            return Err("Unbalanced brackets.".to_string());
        }
    }
    if quote.is_some() || depth != 0 {
        return Err("Unterminated expression.".to_string());
    }
    let last = inner[start..].trim();
    if !last.is_empty() || !args.is_empty() {
        args.push(last);
    }
    Ok(args)
}

// --- Built-in functions ---

fn one<'a>(name: &str, args: &'a [Value]) -> EvalResult<&'a Value> {
    match args {
        [value] => Ok(value),
        _ => Err(format!("{name} expects exactly one argument.")),
    }
}

/// Largest array the loopback engine will allocate.
const MAX_ELEMENTS: usize = 1 << 24;

/// Shape and column-major data of a numeric value.
fn numeric(value: &Value) -> Option<(usize, usize, Vec<f64>)> {
    match value {
        Value::Empty => Some((0, 0, Vec::new())),
        Value::Matrix { rows, cols, data } => Some((*rows, *cols, data.clone())),
        other => other.as_f64().map(|n| (1, 1, vec![n])),
    }
}

fn from_numeric(rows: usize, cols: usize, data: Vec<f64>) -> Value {
    match (rows, cols, data.as_slice()) {
        (1, 1, [only]) => Value::Double(*only),
        (0, _, _) | (_, 0, _) => Value::Empty,
        _ => Value::Matrix { rows, cols, data },
    }
}

/// Elementwise arithmetic with scalar expansion.
fn binary(name: &str, args: &[Value], op: fn(f64, f64) -> f64) -> EvalResult<Vec<Value>> {
    let [a, b] = args else {
        return Err(format!("{name} expects two arguments."));
    };
    let ((ar, ac, ad), (br, bc, bd)) = match (numeric(a), numeric(b)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(format!("Undefined function '{name}' for non-numeric input.")),
    };
    let result = if ad.len() == 1 {
        from_numeric(br, bc, bd.iter().map(|&y| op(ad[0], y)).collect())
    } else if bd.len() == 1 {
        from_numeric(ar, ac, ad.iter().map(|&x| op(x, bd[0])).collect())
    } else if (ar, ac) == (br, bc) {
        from_numeric(ar, ac, ad.iter().zip(&bd).map(|(&x, &y)| op(x, y)).collect())
    } else {
        return Err("Matrix dimensions must agree.".to_string());
    };
    Ok(vec![result])
}

fn deal(args: &[Value], nargout: usize) -> EvalResult<Vec<Value>> {
    match args {
        [] => Err("Not enough input arguments.".to_string()),
        [only] => Ok(vec![only.clone(); nargout.max(1)]),
        many if nargout <= 1 || many.len() == nargout => Ok(many.to_vec()),
        _ => Err("The number of outputs should match the number of inputs.".to_string()),
    }
}

fn size(args: &[Value], nargout: usize) -> EvalResult<Vec<Value>> {
    let value = one("size", args)?;
    let (rows, cols) = match value {
        Value::Empty => (0, 0),
        Value::Matrix { rows, cols, .. } => (*rows, *cols),
        Value::Char(s) => (1, s.chars().count()),
        Value::Cell(items) => (1, items.len()),
        _ => (1, 1),
    };
    if nargout <= 1 {
        Ok(vec![Value::from(vec![rows as f64, cols as f64])])
    } else {
        Ok(vec![Value::from(rows), Value::from(cols)])
    }
}

fn zeros(args: &[Value], _nargout: usize) -> EvalResult<Vec<Value>> {
    let dims: Vec<usize> = args
        .iter()
        .map(|a| {
            a.as_f64()
                .filter(|n| n.is_finite() && *n >= 0.0)
                .map(|n| n as usize)
        })
        .collect::<Option<_>>()
        .ok_or_else(|| "Size inputs must be non-negative numbers.".to_string())?;
    let (rows, cols) = match dims.as_slice() {
        [] => (1, 1),
        [n] => (*n, *n),
        [r, c] => (*r, *c),
        _ => return Err("Only 2-D arrays are supported.".to_string()),
    };
    let len = rows
        .checked_mul(cols)
        .filter(|len| *len <= MAX_ELEMENTS)
        .ok_or_else(|| "Requested array exceeds maximum array size.".to_string())?;
    Ok(vec![from_numeric(rows, cols, vec![0.0; len])])
}
