//! Deterministic per-problem scoring.
//!
//! Each problem counts correct parts of its answer against a canonical key
//! and maps that count to a score through a [`Rubric`]. Every function here
//! is total: missing or malformed parts are coerced (zero or empty string)
//! before comparison, so any JSON value yields a score from the problem's
//! discrete score set.

mod keys;

pub use keys::{CanonicalKeys, FieldKey};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::problems::{coerce_integer, coerce_text, ProblemId};

/// Score for a fully correct answer.
pub const FULL_SCORE: f64 = 2.5;
/// Score for partial credit.
pub const PARTIAL_SCORE: f64 = 1.0;
/// Number of problems in the assessment.
pub const PROBLEM_COUNT: usize = 8;

/// When a non-perfect correct count earns partial credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialCredit {
    None,
    /// Only this exact count earns partial credit.
    Exactly(usize),
    /// This count or more (short of full) earns partial credit.
    AtLeast(usize),
}

/// Maps a correct-part count to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rubric {
    /// Count required for [`FULL_SCORE`].
    pub full: usize,
    pub partial: PartialCredit,
}

impl Rubric {
    /// Score for `correct` matching parts.
    pub fn grade(&self, correct: usize) -> f64 {
        if correct >= self.full {
            return FULL_SCORE;
        }
        match self.partial {
            PartialCredit::Exactly(n) if correct == n => PARTIAL_SCORE,
            PartialCredit::AtLeast(n) if correct >= n => PARTIAL_SCORE,
            _ => 0.0,
        }
    }

    /// Every score this rubric can produce.
    pub fn score_set(&self) -> &'static [f64] {
        match self.partial {
            PartialCredit::None => &[0.0, FULL_SCORE],
            _ => &[0.0, PARTIAL_SCORE, FULL_SCORE],
        }
    }
}

// The thresholds are deliberately not uniform across problems.
const RUBRIC_1: Rubric = Rubric { full: 3, partial: PartialCredit::Exactly(2) };
const RUBRIC_2: Rubric = Rubric { full: 5, partial: PartialCredit::AtLeast(3) };
const RUBRIC_3: Rubric = Rubric { full: 5, partial: PartialCredit::Exactly(3) };
const RUBRIC_4: Rubric = Rubric { full: 5, partial: PartialCredit::Exactly(3) };
const RUBRIC_MATCH: Rubric = Rubric { full: 1, partial: PartialCredit::None };
const RUBRIC_7: Rubric = Rubric { full: 3, partial: PartialCredit::Exactly(2) };
const RUBRIC_8: Rubric = Rubric { full: 4, partial: PartialCredit::Exactly(3) };

/// Rubric used for a problem, `None` for unknown ids.
pub fn rubric(problem: ProblemId) -> Option<Rubric> {
    match problem {
        1 => Some(RUBRIC_1),
        2 => Some(RUBRIC_2),
        3 => Some(RUBRIC_3),
        4 => Some(RUBRIC_4),
        5 | 6 => Some(RUBRIC_MATCH),
        7 => Some(RUBRIC_7),
        8 => Some(RUBRIC_8),
        _ => None,
    }
}

fn count_field_matches(answer: &Value, key: &FieldKey) -> usize {
    key.iter()
        .filter(|(field, expected)| {
            coerce_integer(answer.get(field.as_str()).unwrap_or(&Value::Null)) == **expected
        })
        .count()
}

fn count_positional_matches(answer: &Value, key: &[i64]) -> usize {
    let given = answer.as_array().map(Vec::as_slice).unwrap_or(&[]);
    key.iter()
        .enumerate()
        .filter(|(i, expected)| coerce_integer(given.get(*i).unwrap_or(&Value::Null)) == **expected)
        .count()
}

/// Problem 1: three symbol fields.
pub fn score_problem1(answer: &Value, key: &FieldKey) -> f64 {
    RUBRIC_1.grade(count_field_matches(answer, key))
}

/// Problem 2: five missing digits, graded positionally.
pub fn score_problem2(answer: &Value, key: &[i64]) -> f64 {
    RUBRIC_2.grade(count_positional_matches(answer, key))
}

/// Problem 3: memory grid, only cells that are non-blank in the key count.
pub fn score_problem3(answer: &Value, key: &[String]) -> f64 {
    let given = answer.as_array().map(Vec::as_slice).unwrap_or(&[]);
    let correct = key
        .iter()
        .enumerate()
        .filter(|(_, expected)| !expected.is_empty())
        .filter(|(i, expected)| coerce_text(given.get(*i).unwrap_or(&Value::Null)) == **expected)
        .count();
    RUBRIC_3.grade(correct)
}

/// Problem 4: five counting rounds, graded positionally.
pub fn score_problem4(answer: &Value, key: &[i64]) -> f64 {
    RUBRIC_4.grade(count_positional_matches(answer, key))
}

/// Problem 5: free text, accepted when the trimmed answer is one of the
/// accepted spellings (ignoring case).
pub fn score_problem5(answer: &Value, accepted: &[String]) -> f64 {
    let given = coerce_text(answer);
    let given = given.trim();
    let matched = !given.is_empty()
        && accepted
            .iter()
            .any(|variant| variant == given || variant.to_lowercase() == given.to_lowercase());
    RUBRIC_MATCH.grade(usize::from(matched))
}

/// Problem 6: a single count.
pub fn score_problem6(answer: &Value, key: i64) -> f64 {
    RUBRIC_MATCH.grade(usize::from(coerce_integer(answer) == key))
}

/// Problem 7: three mark counts.
pub fn score_problem7(answer: &Value, key: &FieldKey) -> f64 {
    RUBRIC_7.grade(count_field_matches(answer, key))
}

/// Problem 8: four colour counts.
pub fn score_problem8(answer: &Value, key: &FieldKey) -> f64 {
    RUBRIC_8.grade(count_field_matches(answer, key))
}

/// Score any problem by id. Unknown ids score zero.
pub fn score_problem(problem: ProblemId, answer: &Value, keys: &CanonicalKeys) -> f64 {
    match problem {
        1 => score_problem1(answer, &keys.problem1),
        2 => score_problem2(answer, &keys.problem2),
        3 => score_problem3(answer, &keys.problem3),
        4 => score_problem4(answer, &keys.problem4),
        5 => score_problem5(answer, &keys.problem5),
        6 => score_problem6(answer, keys.problem6),
        7 => score_problem7(answer, &keys.problem7),
        8 => score_problem8(answer, &keys.problem8),
        _ => 0.0,
    }
}

/// Scores of all eight problems, recomputed from answers on demand.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreCard {
    scores: [f64; PROBLEM_COUNT],
}

impl ScoreCard {
    /// Build from scores ordered problem 1..=8.
    pub fn from_scores(scores: [f64; PROBLEM_COUNT]) -> Self {
        Self { scores }
    }

    /// Score every problem; problems without an answer score as their default.
    pub fn compute(answers: &BTreeMap<ProblemId, Value>, keys: &CanonicalKeys) -> Self {
        let mut scores = [0.0; PROBLEM_COUNT];
        for (i, slot) in scores.iter_mut().enumerate() {
            let id = (i + 1) as ProblemId;
            let answer = answers.get(&id).unwrap_or(&Value::Null);
            *slot = score_problem(id, answer, keys);
        }
        Self { scores }
    }

    /// Score of one problem (1-based); zero for unknown ids.
    pub fn get(&self, problem: ProblemId) -> f64 {
        (problem as usize)
            .checked_sub(1)
            .and_then(|i| self.scores.get(i))
            .copied()
            .unwrap_or(0.0)
    }

    /// Scores ordered problem 1..=8.
    pub fn as_array(&self) -> [f64; PROBLEM_COUNT] {
        self.scores
    }

    /// Sum of all scores.
    pub fn total(&self) -> f64 {
        self.scores.iter().sum()
    }
}
