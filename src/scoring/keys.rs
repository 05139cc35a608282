use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Expected value per named field.
pub type FieldKey = BTreeMap<String, i64>;

/// Correct answers for every problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalKeys {
    pub problem1: FieldKey,
    pub problem2: Vec<i64>,
    /// Grid key; empty strings are cells that are not graded.
    pub problem3: Vec<String>,
    pub problem4: Vec<i64>,
    /// Accepted spellings, e.g. full-width and half-width katakana.
    pub problem5: Vec<String>,
    pub problem6: i64,
    pub problem7: FieldKey,
    pub problem8: FieldKey,
}

fn field_key(entries: &[(&str, i64)]) -> FieldKey {
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

impl Default for CanonicalKeys {
    fn default() -> Self {
        Self {
            problem1: field_key(&[("star", 2), ("heart", 1), ("triangle", 3)]),
            problem2: vec![5, 2, 0, 7, 4],
            problem3: ["3", "", "6", "○", "♥", "", "", "", "9"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            problem4: vec![4, 7, 3, 6, 5],
            problem5: vec!["ココロ".to_string(), "ｺｺﾛ".to_string()],
            problem6: 7,
            problem7: field_key(&[("circle", 8), ("doubleCircle", 7), ("filledCircle", 8)]),
            problem8: field_key(&[("yellow", 2), ("green", 0), ("blue", 1), ("cyan", 1)]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_key_has_five_graded_cells() {
        let keys = CanonicalKeys::default();
        assert_eq!(keys.problem3.len(), 9);
        assert_eq!(keys.problem3.iter().filter(|c| !c.is_empty()).count(), 5);
    }
}
