//! Engine-native values and the conversions into them.
//!
//! Arguments handed to the engine go through the `From` impls here. A
//! string always becomes a character array, never a variable reference.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value as the engine represents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// The empty matrix `[]`.
    Empty,
    Logical(bool),
    Double(f64),
    /// Numeric matrix, data stored column-major.
    Matrix {
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    },
    Char(String),
    Cell(Vec<Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// Build a matrix from column-major data. `None` if the sizes disagree.
    pub fn matrix(rows: usize, cols: usize, data: Vec<f64>) -> Option<Self> {
        shape_matches(rows, cols, data.len()).then_some(Value::Matrix { rows, cols, data })
    }

    /// Check that every matrix inside this value, including those nested in
    /// cells and structs, holds exactly `rows * cols` elements.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Value::Matrix { rows, cols, data } if !shape_matches(*rows, *cols, data.len()) => {
                Err(format!(
                    "malformed {rows}x{cols} matrix with {} elements",
                    data.len()
                ))
            }
            Value::Cell(items) => items.iter().try_for_each(Value::validate),
            Value::Struct(fields) => fields.values().try_for_each(Value::validate),
            _ => Ok(()),
        }
    }

    /// The engine class name of this value.
    pub fn class_name(&self) -> &'static str {
        match self {
            Value::Empty | Value::Double(_) | Value::Matrix { .. } => "double",
            Value::Logical(_) => "logical",
            Value::Char(_) => "char",
            Value::Cell(_) => "cell",
            Value::Struct(_) => "struct",
        }
    }

    /// Number of elements, as the engine's `numel` would report it.
    pub fn numel(&self) -> usize {
        match self {
            Value::Empty => 0,
            Value::Logical(_) | Value::Double(_) | Value::Struct(_) => 1,
            Value::Matrix { data, .. } => data.len(),
            Value::Char(s) => s.chars().count(),
            Value::Cell(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    /// Scalar numeric view. Logicals count as 0/1, 1×1 matrices unwrap.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            Value::Logical(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Matrix { data, .. } if data.len() == 1 => Some(data[0]),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            Value::Double(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Char(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a literal as typed at a prompt: numbers, `'text'` or `"text"`,
    /// `true`/`false`, `[]` and row vectors such as `[1 2 3]`.
    pub fn parse_literal(text: &str) -> Option<Value> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.len() >= 2
            && ((text.starts_with('\'') && text.ends_with('\''))
                || (text.starts_with('"') && text.ends_with('"')))
        {
            return Some(Value::Char(text[1..text.len() - 1].to_string()));
        }
        match text {
            "true" => return Some(Value::Logical(true)),
            "false" => return Some(Value::Logical(false)),
            "[]" => return Some(Value::Empty),
            _ => {}
        }
        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            let data = inner
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<f64>().ok())
                .collect::<Option<Vec<_>>>()?;
            if data.is_empty() {
                return Some(Value::Empty);
            }
            return Some(Value::from(data));
        }
        text.parse::<f64>().ok().map(Value::Double)
    }
}

/// Whether `name` is a valid engine identifier: a letter followed by
/// letters, digits or underscores.
fn shape_matches(rows: usize, cols: usize, len: usize) -> bool {
    rows.checked_mul(cols) == Some(len)
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => write!(f, "[]"),
            Value::Logical(b) => write!(f, "{b}"),
            Value::Double(n) => write!(f, "{n}"),
            Value::Matrix { rows, cols, data } if !shape_matches(*rows, *cols, data.len()) => {
                write!(f, "<malformed {rows}x{cols} matrix>")
            }
            Value::Matrix { rows, cols, data } => {
                write!(f, "[")?;
                for r in 0..*rows {
                    if r > 0 {
                        write!(f, "; ")?;
                    }
                    for c in 0..*cols {
                        if c > 0 {
                            write!(f, " ")?;
                        }
                        write!(f, "{}", data[c * rows + r])?;
                    }
                }
                write!(f, "]")
            }
            Value::Char(s) => write!(f, "'{s}'"),
            Value::Cell(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
            Value::Struct(fields) => {
                write!(f, "struct(")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, ")")
            }
        }
    }
}

// --- Marshalling from Rust values ---

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Double(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Double(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Double(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Double(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Double(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Logical(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Char(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Char(s)
    }
}

/// A row vector.
impl From<Vec<f64>> for Value {
    fn from(data: Vec<f64>) -> Self {
        Value::Matrix {
            rows: 1,
            cols: data.len(),
            data,
        }
    }
}

impl From<&[f64]> for Value {
    fn from(data: &[f64]) -> Self {
        Value::from(data.to_vec())
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Cell(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Value::Struct(fields)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Empty, Into::into)
    }
}
