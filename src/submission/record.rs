use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ability::{AbilityAggregator, AbilityVector, AnalysisResult, Dimension};
use crate::problems::{ProblemDefinition, ProblemId};
use crate::scoring::{CanonicalKeys, ScoreCard};
use crate::storage::{format_timestamp, PersistedAnswers};

/// Per-problem scores keyed `problem1`..`problem8` plus their total.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreSummary {
    #[serde(flatten)]
    pub problems: BTreeMap<String, f64>,
    pub total: f64,
}

impl ScoreSummary {
    /// Score of one problem; zero when absent.
    pub fn problem(&self, id: ProblemId) -> f64 {
        self.problems
            .get(&format!("problem{}", id))
            .copied()
            .unwrap_or(0.0)
    }
}

impl From<&ScoreCard> for ScoreSummary {
    fn from(card: &ScoreCard) -> Self {
        let problems = card
            .as_array()
            .iter()
            .enumerate()
            .map(|(i, score)| (format!("problem{}", i + 1), *score))
            .collect();
        Self {
            problems,
            total: card.total(),
        }
    }
}

/// Computed outcome shown to the examinee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentResult {
    pub scores: ScoreSummary,
    pub abilities: AbilityVector,
    pub analysis: AnalysisResult,
}

impl AssessmentResult {
    /// Score raw answers and derive the ability profile.
    pub fn compute(
        answers: &BTreeMap<ProblemId, Value>,
        keys: &CanonicalKeys,
        aggregator: &AbilityAggregator,
    ) -> Self {
        let card = ScoreCard::compute(answers, keys);
        let (abilities, analysis) = aggregator.analyze(&card);
        Self {
            scores: ScoreSummary::from(&card),
            abilities,
            analysis,
        }
    }
}

/// Strongest/weakest dimensions as display labels.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisLabels {
    pub strongest: Vec<String>,
    pub weakest: String,
}

impl From<&AnalysisResult> for AnalysisLabels {
    fn from(analysis: &AnalysisResult) -> Self {
        Self {
            strongest: analysis
                .strongest
                .iter()
                .map(|d| d.label().to_string())
                .collect(),
            weakest: analysis.weakest.label().to_string(),
        }
    }
}

/// Flattened row sent to the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub name: String,
    /// `YYYY-MM-DD` of completion.
    pub test_date: String,
    /// `HH:MM:SS` of completion.
    pub test_time: String,
    /// Answers keyed `problem1`..`problem8`, coerced to their declared shape.
    pub answers: BTreeMap<String, Value>,
    pub scores: ScoreSummary,
    pub abilities: AbilityVector,
    pub analysis: AnalysisLabels,
    /// ISO-8601 strings keyed `start`, `problem1`..`problem8`, `end`.
    /// Empty when a problem never completed.
    pub timestamps: BTreeMap<String, String>,
}

impl SubmissionRecord {
    /// Build the record from what the session persisted and the computed result.
    pub fn assemble(
        persisted: &PersistedAnswers,
        catalog: &[ProblemDefinition],
        result: &AssessmentResult,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let mut answers = BTreeMap::new();
        let mut timestamps = BTreeMap::new();

        timestamps.insert(
            "start".to_string(),
            persisted
                .started_at
                .map(format_timestamp)
                .unwrap_or_default(),
        );

        for problem in catalog {
            let answer = persisted
                .answers
                .get(&problem.id)
                .map(|raw| problem.answer_shape.coerce(raw))
                .unwrap_or_else(|| problem.answer_shape.default_value());
            answers.insert(format!("problem{}", problem.id), answer);

            timestamps.insert(
                format!("problem{}", problem.id),
                persisted
                    .completed_at
                    .get(&problem.id)
                    .copied()
                    .map(format_timestamp)
                    .unwrap_or_default(),
            );
        }

        timestamps.insert("end".to_string(), format_timestamp(finished_at));

        Self {
            name: persisted.examinee.clone().unwrap_or_default(),
            test_date: finished_at.format("%Y-%m-%d").to_string(),
            test_time: finished_at.format("%H:%M:%S").to_string(),
            answers,
            scores: result.scores.clone(),
            abilities: result.abilities,
            analysis: AnalysisLabels::from(&result.analysis),
            timestamps,
        }
    }

    /// Key the record store uses to recognise a resubmission of the same run:
    /// minute-precision completion time plus examinee name.
    pub fn dedup_key(&self) -> (String, String) {
        let minute = self.test_time.get(..5).unwrap_or(&self.test_time);
        (format!("{}T{}", self.test_date, minute), self.name.clone())
    }

    /// Ability components in reporting order.
    pub fn ability_values(&self) -> [(Dimension, f64); 4] {
        Dimension::ALL.map(|d| (d, self.abilities.get(d)))
    }
}

#[cfg(test)]
pub(crate) fn sample_record() -> SubmissionRecord {
    use chrono::TimeZone;

    let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let persisted = PersistedAnswers {
        examinee: Some("山田太郎".to_string()),
        started_at: Some(start),
        answers: BTreeMap::from([
            (1, serde_json::json!({"star": 2, "heart": 1, "triangle": 3})),
            (6, serde_json::json!(7)),
        ]),
        completed_at: BTreeMap::from([(1, start + chrono::Duration::seconds(40))]),
    };
    let catalog = crate::problems::standard_catalog();
    let result = AssessmentResult::compute(
        &persisted.answers,
        &CanonicalKeys::default(),
        &AbilityAggregator::new(),
    );
    SubmissionRecord::assemble(
        &persisted,
        &catalog,
        &result,
        start + chrono::Duration::minutes(12) + chrono::Duration::seconds(5),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_assemble_fills_defaults_for_unanswered_problems() {
        let record = sample_record();

        assert_eq!(record.name, "山田太郎");
        assert_eq!(record.test_date, "2024-06-01");
        assert_eq!(record.test_time, "09:12:05");
        assert_eq!(record.answers.len(), 8);
        assert_eq!(record.answers["problem2"], json!([0, 0, 0, 0, 0]));
        assert_eq!(record.answers["problem5"], json!(""));
        assert_eq!(record.timestamps["start"], "2024-06-01T09:00:00.000Z");
        assert_eq!(record.timestamps["problem1"], "2024-06-01T09:00:40.000Z");
        assert_eq!(record.timestamps["problem2"], "");
        assert_eq!(record.timestamps["end"], "2024-06-01T09:12:05.000Z");
    }

    #[test]
    fn test_scores_and_total() {
        let record = sample_record();
        assert_eq!(record.scores.problem(1), 2.5);
        assert_eq!(record.scores.problem(6), 2.5);
        assert_eq!(record.scores.problem(2), 0.0);
        assert_eq!(record.scores.total, 5.0);
    }

    #[test]
    fn test_dedup_key_has_minute_precision() {
        let record = sample_record();
        assert_eq!(
            record.dedup_key(),
            ("2024-06-01T09:12".to_string(), "山田太郎".to_string())
        );
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let value = serde_json::to_value(sample_record()).unwrap();
        assert!(value.get("testDate").is_some());
        assert!(value.get("testTime").is_some());
        assert_eq!(value["scores"]["problem1"], json!(2.5));
        assert_eq!(value["scores"]["total"], json!(5.0));
        assert_eq!(value["analysis"]["weakest"], json!("集中・注意"));

        let back: SubmissionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, sample_record());
    }
}
