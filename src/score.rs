use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classify::{classify_native, classify_score};
use crate::config::RiskConfig;
use crate::error::EngineError;
use crate::models::{
    FactorAssessment, FactorKind, FactorReading, ReadingRecord, RiskAssessment, ScoredStudent,
};
use crate::normalize;

#[derive(Debug)]
pub struct CohortAssessment {
    pub scored: Vec<ScoredStudent>,
    pub skipped: Vec<String>,
}

// The one aggregation formula, shared with the questionnaire scorer.
// Entries are (weight, normalized) pairs; returns the score and the weight
// total so callers can derive renormalized shares.
pub fn weighted_mean(entries: &[(f64, f64)]) -> Result<(f64, f64), EngineError> {
    let weight_sum: f64 = entries.iter().map(|(weight, _)| weight).sum();
    if weight_sum <= 0.0 {
        return Err(EngineError::ZeroWeightSum);
    }
    let weighted: f64 = entries
        .iter()
        .map(|(weight, normalized)| weight * normalized)
        .sum();
    Ok(((weighted / weight_sum).clamp(0.0, 1.0), weight_sum))
}

// Scores one student from their latest reading per factor. Factors without a
// reading drop out of both the weighted sum and the weight total, so the
// remaining factors absorb the missing weight proportionally.
pub fn assess(
    config: &RiskConfig,
    readings: &[FactorReading],
    assessed_at: DateTime<Utc>,
) -> Result<RiskAssessment, EngineError> {
    let mut warnings = Vec::new();
    if let Err(err) = config.validate() {
        if config.is_enforced() {
            return Err(EngineError::ConfigurationError {
                reason: err.to_string(),
            });
        }
        warnings.push(format!(
            "scored with an unvalidated preview configuration: {err}"
        ));
    }

    let mut latest: BTreeMap<FactorKind, &FactorReading> = BTreeMap::new();
    for reading in readings {
        match latest.get(&reading.factor) {
            Some(existing) if existing.observed_at >= reading.observed_at => {}
            _ => {
                latest.insert(reading.factor, reading);
            }
        }
    }

    let mut scored: Vec<(FactorKind, f64, f64, f64)> = Vec::new();
    for (&factor, &weight) in &config.weights {
        let Some(reading) = latest.get(&factor) else {
            warnings.push(format!(
                "no reading for {}; excluded from the aggregate",
                factor.as_str()
            ));
            continue;
        };
        let (min, max) = factor.native_range();
        if reading.value < min || reading.value > max {
            warnings.push(format!(
                "{} reading {} outside native range [{min}, {max}]; clamped",
                factor.as_str(),
                reading.value
            ));
        }
        let (normalized, _) = normalize::factor_risk(factor, reading.value);
        scored.push((factor, weight, reading.value, normalized));
    }

    if scored.is_empty() {
        return Err(EngineError::NoFactorValues);
    }

    let entries: Vec<(f64, f64)> = scored
        .iter()
        .map(|&(_, weight, _, normalized)| (weight, normalized))
        .collect();
    let (score, weight_sum) = weighted_mean(&entries)?;
    let mut breakdown = Vec::with_capacity(scored.len());
    for (factor, weight, raw_value, normalized) in scored {
        let level = match config.factor_bands.get(&factor) {
            Some(band) => classify_native(raw_value, band),
            None => {
                warnings.push(format!(
                    "no native threshold band for {}; level taken from the normalized value",
                    factor.as_str()
                ));
                classify_score(normalized, &config.score_bands)
            }
        };
        breakdown.push(FactorAssessment {
            factor,
            raw_value,
            normalized,
            weight_share: weight / weight_sum,
            contribution: normalized * weight / weight_sum,
            level,
        });
    }

    Ok(RiskAssessment {
        assessed_at,
        score,
        level: classify_score(score, &config.score_bands),
        breakdown,
        warnings,
        config_id: config.id,
    })
}

// Scores every student present in the records and ranks them most at-risk
// first. Students that cannot be scored are reported, not dropped silently.
pub fn assess_cohort(
    config: &RiskConfig,
    records: &[ReadingRecord],
    assessed_at: DateTime<Utc>,
) -> Result<CohortAssessment, EngineError> {
    if config.is_enforced() {
        if let Err(err) = config.validate() {
            return Err(EngineError::ConfigurationError {
                reason: err.to_string(),
            });
        }
    }

    let mut by_student: BTreeMap<Uuid, (&ReadingRecord, Vec<FactorReading>)> = BTreeMap::new();
    for record in records {
        by_student
            .entry(record.student_id)
            .or_insert_with(|| (record, Vec::new()))
            .1
            .push(record.reading());
    }

    let mut scored = Vec::new();
    let mut skipped = Vec::new();
    for (student_id, (record, readings)) in by_student {
        match assess(config, &readings, assessed_at) {
            Ok(assessment) => scored.push(ScoredStudent {
                student_id,
                full_name: record.full_name.clone(),
                email: record.email.clone(),
                cohort: record.cohort.clone(),
                assessment,
            }),
            Err(err) => skipped.push(format!("{}: {err}", record.email)),
        }
    }

    scored.sort_by(|a, b| {
        b.assessment
            .score
            .partial_cmp(&a.assessment.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.email.cmp(&b.email))
    });

    Ok(CohortAssessment { scored, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigPatch;
    use crate::models::RiskLevel;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn reading(factor: FactorKind, value: f64) -> FactorReading {
        FactorReading {
            factor,
            value,
            observed_at: day(10),
        }
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-15T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn weighted_mean_divides_by_the_weight_total() {
        let entries = [(0.35, 0.5), (0.30, 0.4), (0.25, 0.5)];
        let (score, weight_sum) = weighted_mean(&entries).unwrap();
        assert!((weight_sum - 0.9).abs() < 1e-9);
        assert!((score - 0.42 / 0.9).abs() < 1e-9);
        assert_eq!(weighted_mean(&[]).unwrap_err(), EngineError::ZeroWeightSum);
    }

    #[test]
    fn renormalizes_over_present_factors_when_one_is_missing() {
        let config = RiskConfig::default();
        let readings = vec![
            reading(FactorKind::Gpa, 2.0),
            reading(FactorKind::Attendance, 60.0),
            reading(FactorKind::Assignments, 50.0),
        ];

        let assessment = assess(&config, &readings, now()).unwrap();

        assert!((assessment.score - 0.42 / 0.9).abs() < 1e-9);
        assert_eq!(assessment.level, RiskLevel::Medium);
        assert_eq!(assessment.breakdown.len(), 3);

        let gpa = &assessment.breakdown[0];
        assert_eq!(gpa.factor, FactorKind::Gpa);
        assert!((gpa.normalized - 0.5).abs() < 1e-9);
        assert!((gpa.weight_share - 0.35 / 0.9).abs() < 1e-9);

        let attendance = &assessment.breakdown[1];
        assert!((attendance.normalized - 0.4).abs() < 1e-9);
        assert!((attendance.weight_share - 0.30 / 0.9).abs() < 1e-9);

        assert_eq!(assessment.warnings.len(), 1);
        assert!(assessment.warnings[0].contains("behavior"));
    }

    #[test]
    fn contributions_sum_to_the_score() {
        let config = RiskConfig::default();
        let readings = vec![
            reading(FactorKind::Gpa, 1.2),
            reading(FactorKind::Attendance, 88.0),
            reading(FactorKind::Assignments, 71.0),
        ];
        let assessment = assess(&config, &readings, now()).unwrap();
        let total: f64 = assessment.breakdown.iter().map(|f| f.contribution).sum();
        assert!((total - assessment.score).abs() < 1e-9);
    }

    #[test]
    fn missing_factor_scores_like_an_explicit_zero_weight() {
        let renormalized = RiskConfig::default().apply(&ConfigPatch {
            weights: Some(BTreeMap::from([
                (FactorKind::Gpa, 0.5),
                (FactorKind::Attendance, 0.3),
                (FactorKind::Assignments, 0.2),
                (FactorKind::Behavior, 0.0),
            ])),
            ..ConfigPatch::default()
        });
        let zero_weighted = RiskConfig::default().apply(&ConfigPatch {
            weights: Some(BTreeMap::from([
                (FactorKind::Gpa, 0.625),
                (FactorKind::Attendance, 0.375),
                (FactorKind::Assignments, 0.0),
                (FactorKind::Behavior, 0.0),
            ])),
            ..ConfigPatch::default()
        });

        let without_assignments = vec![
            reading(FactorKind::Gpa, 2.0),
            reading(FactorKind::Attendance, 60.0),
        ];
        let with_assignments = vec![
            reading(FactorKind::Gpa, 2.0),
            reading(FactorKind::Attendance, 60.0),
            reading(FactorKind::Assignments, 95.0),
        ];

        let a = assess(&renormalized, &without_assignments, now()).unwrap();
        let b = assess(&zero_weighted, &with_assignments, now()).unwrap();

        assert!((a.score - 0.4625).abs() < 1e-9);
        assert!((a.score - b.score).abs() < 1e-9);
    }

    #[test]
    fn refuses_to_score_without_any_weighted_reading() {
        let config = RiskConfig::default();
        let err = assess(&config, &[], now()).unwrap_err();
        assert_eq!(err, EngineError::NoFactorValues);
    }

    #[test]
    fn refuses_to_score_when_present_weights_sum_to_zero() {
        let config = RiskConfig::default()
            .apply(&ConfigPatch {
                weights: Some(BTreeMap::from([
                    (FactorKind::Gpa, 0.0),
                    (FactorKind::Attendance, 0.0),
                    (FactorKind::Assignments, 0.0),
                    (FactorKind::Behavior, 0.0),
                ])),
                ..ConfigPatch::default()
            })
            .as_preview();
        let err = assess(&config, &[reading(FactorKind::Gpa, 2.0)], now()).unwrap_err();
        assert_eq!(err, EngineError::ZeroWeightSum);
    }

    #[test]
    fn enforced_mode_rejects_an_invalid_configuration() {
        let broken = RiskConfig::default().apply(&ConfigPatch {
            weights: Some(BTreeMap::from([(FactorKind::Gpa, 0.9)])),
            ..ConfigPatch::default()
        });
        let readings = vec![reading(FactorKind::Gpa, 2.0)];

        let err = assess(&broken, &readings, now()).unwrap_err();
        assert!(matches!(err, EngineError::ConfigurationError { .. }));

        let assessment = assess(&broken.as_preview(), &readings, now()).unwrap();
        assert!(assessment.warnings[0].contains("preview"));
    }

    #[test]
    fn latest_reading_per_factor_wins() {
        let config = RiskConfig::default();
        let readings = vec![
            FactorReading {
                factor: FactorKind::Gpa,
                value: 3.5,
                observed_at: day(1),
            },
            FactorReading {
                factor: FactorKind::Gpa,
                value: 1.0,
                observed_at: day(20),
            },
        ];
        let assessment = assess(&config, &readings, now()).unwrap();
        assert_eq!(assessment.breakdown[0].raw_value, 1.0);
    }

    #[test]
    fn out_of_range_reading_is_clamped_with_a_warning() {
        let config = RiskConfig::default();
        let assessment = assess(&config, &[reading(FactorKind::Gpa, 5.0)], now()).unwrap();
        assert_eq!(assessment.breakdown[0].normalized, 0.0);
        assert!(assessment
            .warnings
            .iter()
            .any(|w| w.contains("outside native range") && w.contains("clamped")));
    }

    #[test]
    fn factor_levels_come_from_native_bands() {
        let config = RiskConfig::default();
        let readings = vec![
            reading(FactorKind::Gpa, 2.0),
            reading(FactorKind::Attendance, 60.0),
        ];
        let assessment = assess(&config, &readings, now()).unwrap();
        assert_eq!(assessment.breakdown[0].level, RiskLevel::Medium);
        assert_eq!(assessment.breakdown[1].level, RiskLevel::High);
    }

    #[test]
    fn missing_native_band_falls_back_to_the_normalized_value() {
        let mut config = RiskConfig::default();
        config.factor_bands.remove(&FactorKind::Behavior);
        let assessment = assess(&config, &[reading(FactorKind::Behavior, 20.0)], now()).unwrap();
        // 20 of 100, lower-is-worse: normalized 0.8.
        assert_eq!(assessment.breakdown[0].level, RiskLevel::Critical);
        assert!(assessment
            .warnings
            .iter()
            .any(|w| w.contains("no native threshold band")));
    }

    #[test]
    fn assessment_records_the_configuration_snapshot() {
        let mut config = RiskConfig::default();
        config.id = Some(Uuid::new_v4());
        let assessment = assess(&config, &[reading(FactorKind::Gpa, 2.0)], now()).unwrap();
        assert_eq!(assessment.config_id, config.id);
    }

    #[test]
    fn cohort_ranks_most_at_risk_first() {
        let config = RiskConfig::default();
        let record = |email: &str, value: f64| ReadingRecord {
            student_id: Uuid::new_v4(),
            full_name: email.split('@').next().unwrap().to_string(),
            email: email.to_string(),
            cohort: "2026".to_string(),
            factor: FactorKind::Gpa,
            value,
            observed_at: day(10),
        };
        let records = vec![
            record("a@northfield.edu", 3.8),
            record("b@northfield.edu", 1.0),
            record("c@northfield.edu", 2.0),
        ];

        let outcome = assess_cohort(&config, &records, now()).unwrap();
        let ranked: Vec<&str> = outcome.scored.iter().map(|s| s.email.as_str()).collect();
        assert_eq!(
            ranked,
            vec!["b@northfield.edu", "c@northfield.edu", "a@northfield.edu"]
        );
        assert!(outcome.skipped.is_empty());
    }

    #[test]
    fn cohort_breaks_score_ties_by_email() {
        let config = RiskConfig::default();
        let record = |email: &str| ReadingRecord {
            student_id: Uuid::new_v4(),
            full_name: "tied".to_string(),
            email: email.to_string(),
            cohort: "2026".to_string(),
            factor: FactorKind::Gpa,
            value: 2.0,
            observed_at: day(10),
        };
        let records = vec![record("zoe@northfield.edu"), record("ana@northfield.edu")];
        let outcome = assess_cohort(&config, &records, now()).unwrap();
        assert_eq!(outcome.scored[0].email, "ana@northfield.edu");
    }

    #[test]
    fn cohort_skips_students_it_cannot_score() {
        let mut config = RiskConfig::default();
        config.weights = BTreeMap::from([(FactorKind::Gpa, 1.0)]);
        let id = Uuid::new_v4();
        let records = vec![ReadingRecord {
            student_id: id,
            full_name: "Dana Whitfield".to_string(),
            email: "dana@northfield.edu".to_string(),
            cohort: "2026".to_string(),
            factor: FactorKind::Attendance,
            value: 90.0,
            observed_at: day(10),
        }];
        let outcome = assess_cohort(&config, &records, now()).unwrap();
        assert!(outcome.scored.is_empty());
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].contains("dana@northfield.edu"));
    }
}
