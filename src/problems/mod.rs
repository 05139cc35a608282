//! Static problem descriptors.
//!
//! A [`ProblemDefinition`] describes one of the assessment problems as data:
//! which optional pre-stages it has, the timed stage sequence of each item,
//! how many items it contains and the shape of its answer. The session state
//! machine runs every problem through the same generic stage runner, so all
//! per-problem behavior lives in these values.

mod catalog;
mod shape;

pub use catalog::standard_catalog;
pub use shape::{AnswerShape, ScalarKind};
pub(crate) use shape::{coerce_integer, coerce_text};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Problem number, 1-based.
pub type ProblemId = u8;

/// Kind of a stage inside a main-problem item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Stimulus shown to the examinee; timer-driven.
    Display,
    /// Visible countdown before the next stage; timer-driven.
    Countdown,
    /// Answer entry; ends on submit or on expiry when timed.
    Input,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Display => write!(f, "display"),
            StageKind::Countdown => write!(f, "countdown"),
            StageKind::Input => write!(f, "input"),
        }
    }
}

/// One stage of an item with its fixed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    pub kind: StageKind,
    /// `None` only makes sense for `Input`, where it means "unbounded".
    pub duration_seconds: Option<u32>,
}

impl StageSpec {
    /// A timer-driven display stage.
    pub fn display(seconds: u32) -> Self {
        Self {
            kind: StageKind::Display,
            duration_seconds: Some(seconds),
        }
    }

    /// A timer-driven countdown stage.
    pub fn countdown(seconds: u32) -> Self {
        Self {
            kind: StageKind::Countdown,
            duration_seconds: Some(seconds),
        }
    }

    /// An input stage that expires after `seconds`.
    pub fn timed_input(seconds: u32) -> Self {
        Self {
            kind: StageKind::Input,
            duration_seconds: Some(seconds),
        }
    }

    /// An input stage without a time limit.
    pub fn open_input() -> Self {
        Self {
            kind: StageKind::Input,
            duration_seconds: None,
        }
    }
}

/// Immutable descriptor shared by every session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDefinition {
    pub id: ProblemId,
    pub has_explanation: bool,
    pub has_example: bool,
    pub answer_shape: AnswerShape,
    /// Stage sequence of a single item.
    pub stages: Vec<StageSpec>,
    /// How many times `stages` is run. Multi-item problems collect one
    /// array element per item.
    pub item_count: usize,
    /// Answer store key holding this problem's answer.
    pub storage_key: String,
}

impl ProblemDefinition {
    /// Create a single-item problem with an open input stage.
    pub fn new(id: ProblemId, answer_shape: AnswerShape) -> Self {
        Self {
            id,
            has_explanation: false,
            has_example: false,
            answer_shape,
            stages: vec![StageSpec::open_input()],
            item_count: 1,
            storage_key: format!("problem{}Answers", id),
        }
    }

    /// Set whether the problem opens with an explanation stage.
    pub fn with_explanation(mut self, has_explanation: bool) -> Self {
        self.has_explanation = has_explanation;
        self
    }

    /// Set whether the problem has a worked example stage.
    pub fn with_example(mut self, has_example: bool) -> Self {
        self.has_example = has_example;
        self
    }

    /// Replace the per-item stage sequence.
    pub fn with_stages(mut self, stages: Vec<StageSpec>) -> Self {
        self.stages = stages;
        self
    }

    /// Run the stage sequence `count` times, one answer element per run.
    pub fn with_items(mut self, count: usize) -> Self {
        self.item_count = count.max(1);
        self
    }

    /// Override the answer store key.
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Answer store key holding this problem's completion timestamp.
    pub fn time_key(&self) -> String {
        format!("problem{}Time", self.id)
    }

    /// Whether several independently timed items make up this problem.
    pub fn is_multi_item(&self) -> bool {
        self.item_count > 1
    }

    /// Shape of the answer collected by one item's input stage.
    pub fn item_shape(&self) -> AnswerShape {
        if self.is_multi_item() {
            AnswerShape::Scalar {
                kind: ScalarKind::Integer,
            }
        } else {
            self.answer_shape.clone()
        }
    }

    /// Build the problem-level answer from the per-item answers collected so
    /// far. Items that have not run yet take the default value.
    pub fn assemble_answer(&self, items: &[Value]) -> Value {
        if self.is_multi_item() {
            let joined: Vec<Value> = (0..self.item_count)
                .map(|i| items.get(i).cloned().unwrap_or(Value::Null))
                .collect();
            self.answer_shape.coerce(&Value::Array(joined))
        } else {
            let raw = items.first().cloned().unwrap_or(Value::Null);
            self.answer_shape.coerce(&raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_keys() {
        let def = ProblemDefinition::new(3, AnswerShape::Grid { cells: 9 });
        assert_eq!(def.storage_key, "problem3Answers");
        assert_eq!(def.time_key(), "problem3Time");
    }

    #[test]
    fn test_item_shape_for_multi_item_problem() {
        let def = ProblemDefinition::new(4, AnswerShape::Array { len: 5 }).with_items(5);
        assert!(def.is_multi_item());
        assert_eq!(
            def.item_shape(),
            AnswerShape::Scalar {
                kind: ScalarKind::Integer
            }
        );
    }

    #[test]
    fn test_assemble_partial_multi_item_answer() {
        let def = ProblemDefinition::new(4, AnswerShape::Array { len: 5 }).with_items(5);
        let answer = def.assemble_answer(&[json!(4), json!("7")]);
        assert_eq!(answer, json!([4, 7, 0, 0, 0]));
    }

    #[test]
    fn test_assemble_single_item_answer() {
        let def = ProblemDefinition::new(6, AnswerShape::Scalar {
            kind: ScalarKind::Integer,
        });
        assert_eq!(def.assemble_answer(&[json!(" 7 ")]), json!(7));
        assert_eq!(def.assemble_answer(&[]), json!(0));
    }

    #[test]
    fn test_with_items_never_zero() {
        let def = ProblemDefinition::new(1, AnswerShape::Array { len: 1 }).with_items(0);
        assert_eq!(def.item_count, 1);
    }
}
