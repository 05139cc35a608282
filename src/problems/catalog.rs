use super::{AnswerShape, ProblemDefinition, ScalarKind, StageSpec};

/// The eight assessment problems in the order a session runs them.
pub fn standard_catalog() -> Vec<ProblemDefinition> {
    vec![
        // symbol lookup
        ProblemDefinition::new(1, AnswerShape::object(&["star", "heart", "triangle"]))
            .with_example(true)
            .with_stages(vec![StageSpec::timed_input(30)]),
        // missing digit, five patterns on one screen
        ProblemDefinition::new(2, AnswerShape::Array { len: 5 })
            .with_explanation(true)
            .with_example(true)
            .with_stages(vec![StageSpec::timed_input(30)]),
        // 3x3 memory grid
        ProblemDefinition::new(3, AnswerShape::Grid { cells: 9 })
            .with_explanation(true)
            .with_example(true)
            .with_stages(vec![
                StageSpec::display(10),
                StageSpec::countdown(5),
                StageSpec::timed_input(30),
            ]),
        // five dot-counting rounds
        ProblemDefinition::new(4, AnswerShape::Array { len: 5 })
            .with_explanation(true)
            .with_example(true)
            .with_items(5)
            .with_stages(vec![
                StageSpec::countdown(3),
                StageSpec::display(1),
                StageSpec::timed_input(30),
            ]),
        ProblemDefinition::new(5, AnswerShape::Scalar {
            kind: ScalarKind::Text,
        })
        .with_explanation(true)
        .with_stages(vec![StageSpec::timed_input(30)])
        .with_storage_key("problem5Answer"),
        ProblemDefinition::new(6, AnswerShape::Scalar {
            kind: ScalarKind::Integer,
        })
        .with_explanation(true)
        .with_stages(vec![StageSpec::timed_input(15)])
        .with_storage_key("problem6Answer"),
        ProblemDefinition::new(
            7,
            AnswerShape::object(&["circle", "doubleCircle", "filledCircle"]),
        )
        .with_explanation(true)
        .with_stages(vec![StageSpec::timed_input(30)]),
        ProblemDefinition::new(8, AnswerShape::object(&["yellow", "green", "blue", "cyan"]))
            .with_explanation(true)
            .with_stages(vec![StageSpec::timed_input(30)]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problems::StageKind;

    #[test]
    fn test_catalog_order_and_ids() {
        let catalog = standard_catalog();
        let ids: Vec<u8> = catalog.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_every_item_ends_with_input() {
        for def in standard_catalog() {
            assert_eq!(
                def.stages.last().map(|s| s.kind),
                Some(StageKind::Input),
                "problem {} must end in an input stage",
                def.id
            );
            for stage in &def.stages {
                if stage.kind != StageKind::Input {
                    assert!(stage.duration_seconds.is_some());
                }
            }
        }
    }

    #[test]
    fn test_storage_keys_match_persisted_layout() {
        let keys: Vec<String> = standard_catalog().into_iter().map(|p| p.storage_key).collect();
        assert_eq!(
            keys,
            vec![
                "problem1Answers",
                "problem2Answers",
                "problem3Answers",
                "problem4Answers",
                "problem5Answer",
                "problem6Answer",
                "problem7Answers",
                "problem8Answers",
            ]
        );
    }

    #[test]
    fn test_multi_item_problem_matches_array_length() {
        let catalog = standard_catalog();
        let p4 = &catalog[3];
        assert_eq!(p4.item_count, 5);
        assert_eq!(p4.answer_shape, AnswerShape::Array { len: 5 });
    }
}
