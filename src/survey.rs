use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::classify::classify_score;
use crate::config::ScoreBands;
use crate::error::EngineError;
use crate::models::{Direction, RiskLevel};
use crate::normalize::unit_risk;
use crate::score::weighted_mean;

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyDefinition {
    pub name: String,
    pub questions: Vec<SurveyQuestion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyQuestion {
    pub id: String,
    pub prompt: String,
    pub weight: f64,
    pub min: f64,
    pub max: f64,
    #[serde(default = "default_direction")]
    pub direction: Direction,
}

// Self-assessment scales default to higher-is-worse ("rate your stress").
fn default_direction() -> Direction {
    Direction::HigherWorse
}

#[derive(Debug, Clone, Deserialize)]
pub struct SurveyResponse {
    pub question_id: String,
    pub answer: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurveyOutcome {
    pub survey: String,
    pub score: f64,
    pub level: RiskLevel,
    pub completion_percent: f64,
    pub warnings: Vec<String>,
}

// Share of the questionnaire answered, counting each known question once.
// Responses to ids outside the definition do not move the needle.
pub fn completion_percent(definition: &SurveyDefinition, responses: &[SurveyResponse]) -> f64 {
    if definition.questions.is_empty() {
        return 100.0;
    }
    let known: BTreeSet<&str> = definition
        .questions
        .iter()
        .map(|q| q.id.as_str())
        .collect();
    let answered: BTreeSet<&str> = responses
        .iter()
        .map(|r| r.question_id.as_str())
        .filter(|id| known.contains(id))
        .collect();
    answered.len() as f64 / definition.questions.len() as f64 * 100.0
}

// A questionnaire is scored only when every question has an answer; a partial
// submission is an error that names what is still open. When the same
// question is answered twice, the later response replaces the earlier one.
pub fn score_survey(
    definition: &SurveyDefinition,
    responses: &[SurveyResponse],
    bands: &ScoreBands,
) -> Result<SurveyOutcome, EngineError> {
    for question in &definition.questions {
        if question.weight < 0.0 {
            return Err(EngineError::invalid_weights(format!(
                "question '{}' carries negative weight {}",
                question.id, question.weight
            )));
        }
    }

    let known: BTreeSet<&str> = definition
        .questions
        .iter()
        .map(|q| q.id.as_str())
        .collect();
    let mut answers: BTreeMap<&str, f64> = BTreeMap::new();
    for response in responses {
        if !known.contains(response.question_id.as_str()) {
            return Err(EngineError::UnknownQuestion {
                question: response.question_id.clone(),
            });
        }
        answers.insert(response.question_id.as_str(), response.answer);
    }

    let missing: Vec<&str> = definition
        .questions
        .iter()
        .map(|q| q.id.as_str())
        .filter(|id| !answers.contains_key(*id))
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::IncompleteSubmission {
            answered: answers.len(),
            total: definition.questions.len(),
            missing: missing.join(", "),
        });
    }

    let mut warnings = Vec::new();
    let mut entries = Vec::with_capacity(definition.questions.len());
    for question in &definition.questions {
        let answer = answers[question.id.as_str()];
        let (normalized, degenerate) =
            unit_risk(question.direction, question.min, question.max, answer);
        if degenerate {
            warnings.push(format!(
                "question '{}' has an unusable scale [{}, {}]; treated as zero risk",
                question.id, question.min, question.max
            ));
        } else if answer < question.min || answer > question.max {
            return Err(EngineError::AnswerOutOfRange {
                question: question.id.clone(),
                value: answer,
                min: question.min,
                max: question.max,
            });
        }
        entries.push((question.weight, normalized));
    }

    let (score, _) = weighted_mean(&entries)?;
    Ok(SurveyOutcome {
        survey: definition.name.clone(),
        score,
        level: classify_score(score, bands),
        completion_percent: completion_percent(definition, responses),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bands() -> ScoreBands {
        ScoreBands {
            medium_from: 0.4,
            high_from: 0.6,
            critical_from: 0.8,
        }
    }

    fn question(id: &str, weight: f64, min: f64, max: f64) -> SurveyQuestion {
        SurveyQuestion {
            id: id.to_string(),
            prompt: format!("rate your {id}"),
            weight,
            min,
            max,
            direction: Direction::HigherWorse,
        }
    }

    fn answer(id: &str, value: f64) -> SurveyResponse {
        SurveyResponse {
            question_id: id.to_string(),
            answer: value,
        }
    }

    fn wellbeing() -> SurveyDefinition {
        SurveyDefinition {
            name: "wellbeing-check".to_string(),
            questions: vec![
                question("stress", 0.6, 0.0, 10.0),
                question("workload", 0.4, 0.0, 10.0),
            ],
        }
    }

    #[test]
    fn complete_submission_scores_and_classifies() {
        let outcome = score_survey(
            &wellbeing(),
            &[answer("stress", 10.0), answer("workload", 0.0)],
            &bands(),
        )
        .unwrap();
        assert!((outcome.score - 0.6).abs() < 1e-9);
        assert_eq!(outcome.level, RiskLevel::High);
        assert_eq!(outcome.completion_percent, 100.0);
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn lower_is_worse_questions_invert_the_scale() {
        let mut definition = wellbeing();
        definition.questions[0].direction = Direction::LowerWorse;
        let outcome = score_survey(
            &definition,
            &[answer("stress", 10.0), answer("workload", 0.0)],
            &bands(),
        )
        .unwrap();
        // A perfect answer on a lower-is-worse question means no risk.
        assert!((outcome.score - 0.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let err = score_survey(&wellbeing(), &[answer("sleep", 5.0)], &bands()).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownQuestion {
                question: "sleep".to_string()
            }
        );
    }

    #[test]
    fn partial_submission_names_the_missing_questions() {
        let err = score_survey(&wellbeing(), &[answer("stress", 4.0)], &bands()).unwrap_err();
        match err {
            EngineError::IncompleteSubmission {
                answered,
                total,
                missing,
            } => {
                assert_eq!(answered, 1);
                assert_eq!(total, 2);
                assert_eq!(missing, "workload");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn repeated_answer_uses_the_last_response() {
        let outcome = score_survey(
            &wellbeing(),
            &[
                answer("stress", 10.0),
                answer("workload", 0.0),
                answer("stress", 0.0),
            ],
            &bands(),
        )
        .unwrap();
        assert!((outcome.score - 0.0).abs() < 1e-9);
    }

    #[test]
    fn answer_outside_the_scale_is_rejected() {
        let err = score_survey(
            &wellbeing(),
            &[answer("stress", 11.0), answer("workload", 0.0)],
            &bands(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::AnswerOutOfRange { value, .. } if value == 11.0
        ));
    }

    #[test]
    fn unusable_scale_scores_zero_and_warns() {
        let mut definition = wellbeing();
        definition.questions[1].min = 5.0;
        definition.questions[1].max = 5.0;
        let outcome = score_survey(
            &definition,
            &[answer("stress", 10.0), answer("workload", 5.0)],
            &bands(),
        )
        .unwrap();
        // Only stress contributes risk, but workload keeps its weight.
        assert!((outcome.score - 0.6).abs() < 1e-9);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("workload"));
    }

    #[test]
    fn negative_question_weight_is_rejected() {
        let mut definition = wellbeing();
        definition.questions[0].weight = -0.5;
        let err = score_survey(
            &definition,
            &[answer("stress", 5.0), answer("workload", 5.0)],
            &bands(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidWeightSum { .. }));
        assert!(err.to_string().contains("stress"));
    }

    #[test]
    fn weightless_questionnaire_cannot_be_scored() {
        let mut definition = wellbeing();
        definition.questions[0].weight = 0.0;
        definition.questions[1].weight = 0.0;
        let err = score_survey(
            &definition,
            &[answer("stress", 5.0), answer("workload", 5.0)],
            &bands(),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::ZeroWeightSum);
    }

    #[test]
    fn completion_counts_each_known_question_once() {
        let definition = wellbeing();
        let responses = vec![
            answer("stress", 4.0),
            answer("stress", 6.0),
            answer("mystery", 1.0),
        ];
        assert!((completion_percent(&definition, &responses) - 50.0).abs() < 1e-9);

        let empty = SurveyDefinition {
            name: "empty".to_string(),
            questions: Vec::new(),
        };
        assert_eq!(completion_percent(&empty, &[]), 100.0);
    }

    #[test]
    fn definition_defaults_to_higher_is_worse() {
        let definition: SurveyDefinition = serde_json::from_str(
            r#"{
                "name": "check-in",
                "questions": [
                    {"id": "stress", "prompt": "rate your stress", "weight": 1.0, "min": 0.0, "max": 10.0}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(definition.questions[0].direction, Direction::HigherWorse);
    }
}
