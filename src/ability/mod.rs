//! Ability profile derived from the eight problem scores.
//!
//! Scores are normalized to `[0, 1]`, combined through a fixed 4x8 weight
//! matrix into four dimensions scaled to `[0, 5]`, and classified into
//! strongest/weakest dimensions. Aggregation is deterministic unless a
//! jitter seed is configured explicitly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::scoring::{ScoreCard, FULL_SCORE, PROBLEM_COUNT};

/// Upper bound of every ability component.
pub const MAX_ABILITY: f64 = 5.0;

/// One of the four reported ability dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Reading,
    Attention,
    Memory,
    Cognition,
}

impl Dimension {
    /// All dimensions in reporting order.
    pub const ALL: [Dimension; 4] = [
        Dimension::Reading,
        Dimension::Attention,
        Dimension::Memory,
        Dimension::Cognition,
    ];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Reading => "reading",
            Dimension::Attention => "attention",
            Dimension::Memory => "memory",
            Dimension::Cognition => "cognition",
        }
    }

    /// Label shown to examinees.
    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Reading => "読解",
            Dimension::Attention => "集中・注意",
            Dimension::Memory => "記憶",
            Dimension::Cognition => "認知",
        }
    }

    fn row(&self) -> usize {
        match self {
            Dimension::Reading => 0,
            Dimension::Attention => 1,
            Dimension::Memory => 2,
            Dimension::Cognition => 3,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Four-dimension ability profile, each component in `[0, 5]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AbilityVector {
    pub reading: f64,
    pub attention: f64,
    pub memory: f64,
    pub cognition: f64,
}

impl AbilityVector {
    /// Component for a dimension.
    pub fn get(&self, dimension: Dimension) -> f64 {
        match dimension {
            Dimension::Reading => self.reading,
            Dimension::Attention => self.attention,
            Dimension::Memory => self.memory,
            Dimension::Cognition => self.cognition,
        }
    }

    fn set(&mut self, dimension: Dimension, value: f64) {
        match dimension {
            Dimension::Reading => self.reading = value,
            Dimension::Attention => self.attention = value,
            Dimension::Memory => self.memory = value,
            Dimension::Cognition => self.cognition = value,
        }
    }

    /// `(dimension, value)` pairs in reporting order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, f64)> + '_ {
        Dimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }
}

/// Strongest/weakest classification of an [`AbilityVector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// May be empty (no strong suit) or all four.
    pub strongest: Vec<Dimension>,
    pub weakest: Dimension,
}

/// Weight of each problem in each dimension. Rows follow [`Dimension::ALL`],
/// columns are problems 1..=8; every row sums to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbilityWeights {
    rows: [[f64; PROBLEM_COUNT]; 4],
}

impl AbilityWeights {
    /// Use an explicit weight matrix.
    pub fn new(rows: [[f64; PROBLEM_COUNT]; 4]) -> Self {
        Self { rows }
    }

    /// Weights of one dimension.
    pub fn row(&self, dimension: Dimension) -> &[f64; PROBLEM_COUNT] {
        &self.rows[dimension.row()]
    }
}

impl Default for AbilityWeights {
    fn default() -> Self {
        // problem:  1    2    3    4    5    6    7    8
        Self::new([
            [0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0], // reading
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5, 0.5], // attention
            [0.0, 0.0, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0], // memory
            [0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.0, 0.0], // cognition
        ])
    }
}

/// Combines scores into an ability profile and classifies it.
#[derive(Debug, Clone)]
pub struct AbilityAggregator {
    weights: AbilityWeights,
    /// Components within this distance of the maximum count as strongest.
    tolerance: f64,
    /// All components at or above this: every dimension is strongest.
    high_threshold: f64,
    /// All components at or below this: no dimension is strongest.
    low_threshold: f64,
    jitter_seed: Option<u64>,
}

impl Default for AbilityAggregator {
    fn default() -> Self {
        Self {
            weights: AbilityWeights::default(),
            tolerance: 0.1,
            high_threshold: 4.5,
            low_threshold: 1.0,
            jitter_seed: None,
        }
    }
}

impl AbilityAggregator {
    /// Aggregator with the standard weights and thresholds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the weight matrix.
    pub fn with_weights(mut self, weights: AbilityWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Add a reproducible offset in `[-0.5, 0.5)` to each component before
    /// clamping. `None` disables it.
    pub fn with_jitter_seed(mut self, seed: Option<u64>) -> Self {
        self.jitter_seed = seed;
        self
    }

    /// Threshold for the "excelled at everything" outcome.
    pub fn high_threshold(&self) -> f64 {
        self.high_threshold
    }

    /// Threshold below which no strong suit is reported.
    pub fn low_threshold(&self) -> f64 {
        self.low_threshold
    }

    /// Map eight scores to the four ability components.
    pub fn aggregate(&self, scores: &ScoreCard) -> AbilityVector {
        let normalized: Vec<f64> = scores.as_array().iter().map(|s| s / FULL_SCORE).collect();
        let mut rng = self.jitter_seed.map(StdRng::seed_from_u64);
        let mut vector = AbilityVector::default();

        for dimension in Dimension::ALL {
            let weighted: f64 = self
                .weights
                .row(dimension)
                .iter()
                .zip(&normalized)
                .map(|(w, n)| w * n)
                .sum();
            let offset = rng.as_mut().map(|r| r.gen_range(-0.5..0.5)).unwrap_or(0.0);
            let value = (weighted * MAX_ABILITY + offset).clamp(0.0, MAX_ABILITY);
            vector.set(dimension, value);
        }
        vector
    }

    /// Strongest and weakest dimensions of a profile.
    pub fn classify(&self, abilities: &AbilityVector) -> AnalysisResult {
        let values: Vec<(Dimension, f64)> = abilities.iter().collect();
        let max = values.iter().map(|(_, v)| *v).fold(f64::MIN, f64::max);
        let min = values.iter().map(|(_, v)| *v).fold(f64::MAX, f64::min);

        let weakest = values
            .iter()
            .find(|(_, v)| *v <= min)
            .map(|(d, _)| *d)
            .unwrap_or(Dimension::Reading);

        let strongest = if values.iter().all(|(_, v)| *v >= self.high_threshold) {
            Dimension::ALL.to_vec()
        } else if values.iter().all(|(_, v)| *v <= self.low_threshold) {
            Vec::new()
        } else {
            values
                .iter()
                .filter(|(_, v)| (max - *v).abs() < self.tolerance)
                .map(|(d, _)| *d)
                .collect()
        };

        AnalysisResult { strongest, weakest }
    }

    /// Aggregate and classify in one step.
    pub fn analyze(&self, scores: &ScoreCard) -> (AbilityVector, AnalysisResult) {
        let abilities = self.aggregate(scores);
        let analysis = self.classify(&abilities);
        (abilities, analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SCORE_VALUES: [f64; 3] = [0.0, 1.0, 2.5];

    fn every_score_card() -> impl Iterator<Item = ScoreCard> {
        (0..3usize.pow(8)).map(|mut n| {
            let mut scores = [0.0; PROBLEM_COUNT];
            for slot in scores.iter_mut() {
                *slot = SCORE_VALUES[n % 3];
                n /= 3;
            }
            ScoreCard::from_scores(scores)
        })
    }

    #[test]
    fn test_default_weight_rows_sum_to_one() {
        let weights = AbilityWeights::default();
        for dimension in Dimension::ALL {
            let sum: f64 = weights.row(dimension).iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "{} sums to {}", dimension, sum);
        }
    }

    #[test]
    fn test_perfect_scores_excel_everywhere() {
        let aggregator = AbilityAggregator::new();
        let (abilities, analysis) = aggregator.analyze(&ScoreCard::from_scores([2.5; 8]));
        assert_eq!(abilities.reading, 5.0);
        assert_eq!(abilities.cognition, 5.0);
        assert_eq!(analysis.strongest, Dimension::ALL.to_vec());
        assert_eq!(analysis.weakest, Dimension::Reading);
    }

    #[test]
    fn test_zero_scores_have_no_strong_suit() {
        let aggregator = AbilityAggregator::new();
        let (_, analysis) = aggregator.analyze(&ScoreCard::from_scores([0.0; 8]));
        assert!(analysis.strongest.is_empty());
        assert_eq!(analysis.weakest, Dimension::Reading);
    }

    #[test]
    fn test_single_strong_dimension() {
        let aggregator = AbilityAggregator::new();
        // problems 3 and 4 drive memory
        let scores = ScoreCard::from_scores([1.0, 0.0, 2.5, 2.5, 1.0, 0.0, 0.0, 0.0]);
        let (abilities, analysis) = aggregator.analyze(&scores);
        assert_eq!(abilities.memory, 5.0);
        assert_eq!(abilities.reading, 1.0);
        assert_eq!(abilities.attention, 0.0);
        assert_eq!(analysis.strongest, vec![Dimension::Memory]);
        assert_eq!(analysis.weakest, Dimension::Attention);
    }

    #[test]
    fn test_ties_at_max_are_all_strongest() {
        let aggregator = AbilityAggregator::new();
        let scores = ScoreCard::from_scores([2.5, 1.0, 0.0, 0.0, 2.5, 1.0, 0.0, 1.0]);
        let (abilities, analysis) = aggregator.analyze(&scores);
        assert_eq!(abilities.reading, 3.5);
        assert_eq!(abilities.cognition, 3.5);
        assert_eq!(analysis.strongest, vec![Dimension::Reading, Dimension::Cognition]);
        assert_eq!(analysis.weakest, Dimension::Memory);
    }

    #[test]
    fn test_components_bounded_and_thresholds_hold_for_all_scores() {
        let aggregator = AbilityAggregator::new();
        for card in every_score_card() {
            let (abilities, analysis) = aggregator.analyze(&card);
            for (dimension, value) in abilities.iter() {
                assert!((0.0..=MAX_ABILITY).contains(&value), "{} = {}", dimension, value);
            }
            if abilities.iter().all(|(_, v)| v >= aggregator.high_threshold()) {
                assert_eq!(analysis.strongest.len(), 4);
            }
            if abilities.iter().all(|(_, v)| v <= aggregator.low_threshold()) {
                assert!(analysis.strongest.is_empty());
            }
            let min = abilities.iter().map(|(_, v)| v).fold(f64::MAX, f64::min);
            assert_eq!(abilities.get(analysis.weakest), min);
        }
    }

    #[test]
    fn test_aggregation_is_deterministic_without_seed() {
        let aggregator = AbilityAggregator::new();
        let scores = ScoreCard::from_scores([1.0, 2.5, 0.0, 1.0, 2.5, 0.0, 1.0, 2.5]);
        assert_eq!(aggregator.aggregate(&scores), aggregator.aggregate(&scores));
    }

    #[test]
    fn test_seeded_jitter_is_reproducible_and_bounded() {
        let seeded = AbilityAggregator::new().with_jitter_seed(Some(42));
        let plain = AbilityAggregator::new();
        let scores = ScoreCard::from_scores([1.0, 2.5, 0.0, 1.0, 2.5, 0.0, 1.0, 2.5]);

        let first = seeded.aggregate(&scores);
        assert_eq!(first, seeded.aggregate(&scores));

        let base = plain.aggregate(&scores);
        for dimension in Dimension::ALL {
            let value = first.get(dimension);
            assert!((0.0..=MAX_ABILITY).contains(&value));
            assert!((value - base.get(dimension)).abs() <= 0.5);
        }
    }
}
