use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value type of a scalar answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Text,
    Integer,
}

/// Shape of a problem's raw answer.
///
/// Every shape can turn any JSON value into a well-formed answer of that
/// shape (`coerce`), so timer-forced completion never fails on malformed or
/// partial input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnswerShape {
    Scalar { kind: ScalarKind },
    /// Fixed-length list of integers.
    Array { len: usize },
    /// Named integer fields.
    Object { fields: Vec<String> },
    /// Row-major cells of text; blank cells are legitimate answers.
    Grid { cells: usize },
}

impl AnswerShape {
    /// Object shape from field names.
    pub fn object(fields: &[&str]) -> Self {
        AnswerShape::Object {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// The answer recorded when nothing was entered.
    pub fn default_value(&self) -> Value {
        self.coerce(&Value::Null)
    }

    /// Normalize a raw answer into this shape.
    pub fn coerce(&self, raw: &Value) -> Value {
        match self {
            AnswerShape::Scalar {
                kind: ScalarKind::Text,
            } => Value::String(coerce_text(raw)),
            AnswerShape::Scalar {
                kind: ScalarKind::Integer,
            } => Value::from(coerce_integer(raw)),
            AnswerShape::Array { len } => Value::Array(
                (0..*len)
                    .map(|i| Value::from(coerce_integer(element(raw, i))))
                    .collect(),
            ),
            AnswerShape::Grid { cells } => Value::Array(
                (0..*cells)
                    .map(|i| Value::String(coerce_text(element(raw, i))))
                    .collect(),
            ),
            AnswerShape::Object { fields } => {
                let mut out = Map::new();
                for field in fields {
                    let value = raw.get(field).unwrap_or(&Value::Null);
                    out.insert(field.clone(), Value::from(coerce_integer(value)));
                }
                Value::Object(out)
            }
        }
    }

    /// First part of `raw` that is still unanswered, if any.
    ///
    /// Used to gate manual submission only; timers never consult it.
    pub fn first_missing(&self, raw: &Value) -> Option<String> {
        match self {
            AnswerShape::Scalar { .. } => is_blank(raw).then(|| "answer".to_string()),
            AnswerShape::Array { len } => {
                (0..*len).find(|i| is_blank(element(raw, *i))).map(|i| format!("item {}", i + 1))
            }
            AnswerShape::Grid { .. } => (!raw.is_array()).then(|| "grid".to_string()),
            AnswerShape::Object { fields } => fields
                .iter()
                .find(|f| is_blank(raw.get(f.as_str()).unwrap_or(&Value::Null)))
                .cloned(),
        }
    }
}

fn element(raw: &Value, index: usize) -> &Value {
    raw.as_array()
        .and_then(|items| items.get(index))
        .unwrap_or(&Value::Null)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Integers pass through, whole floats and numeric strings are converted,
/// everything else is zero.
pub(crate) fn coerce_integer(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}
