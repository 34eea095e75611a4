use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::FactorKind;

pub const WEIGHT_SUM_EPSILON: f64 = 0.01;

// Native-unit cut points for a lower-is-worse factor. A measurement below
// `critical` is Critical, below `high` is High, below `medium` is Medium.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBand {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

// Lower bounds over the [0, 1] aggregate score; a score at or above a bound
// belongs to that band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBands {
    pub medium_from: f64,
    pub high_from: f64,
    pub critical_from: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMode {
    Enforced,
    Preview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    // Snapshot id assigned when the configuration is persisted; not part of
    // the stored payload itself.
    #[serde(skip)]
    pub id: Option<Uuid>,
    pub weights: BTreeMap<FactorKind, f64>,
    pub factor_bands: BTreeMap<FactorKind, ThresholdBand>,
    pub score_bands: ScoreBands,
    pub trend_epsilon: f64,
    #[serde(default = "default_mode")]
    pub mode: ConfigMode,
}

fn default_mode() -> ConfigMode {
    ConfigMode::Enforced
}

impl Default for RiskConfig {
    fn default() -> Self {
        let weights = BTreeMap::from([
            (FactorKind::Gpa, 0.35),
            (FactorKind::Attendance, 0.30),
            (FactorKind::Assignments, 0.25),
            (FactorKind::Behavior, 0.10),
        ]);
        let factor_bands = BTreeMap::from([
            (
                FactorKind::Gpa,
                ThresholdBand {
                    critical: 1.5,
                    high: 2.0,
                    medium: 2.5,
                },
            ),
            (
                FactorKind::Attendance,
                ThresholdBand {
                    critical: 60.0,
                    high: 75.0,
                    medium: 85.0,
                },
            ),
            (
                FactorKind::Assignments,
                ThresholdBand {
                    critical: 50.0,
                    high: 65.0,
                    medium: 80.0,
                },
            ),
            (
                FactorKind::Behavior,
                ThresholdBand {
                    critical: 40.0,
                    high: 60.0,
                    medium: 75.0,
                },
            ),
        ]);
        Self {
            id: None,
            weights,
            factor_bands,
            score_bands: ScoreBands {
                medium_from: 0.4,
                high_from: 0.6,
                critical_from: 0.8,
            },
            trend_epsilon: 0.02,
            mode: ConfigMode::Enforced,
        }
    }
}

// Partial update applied over an existing snapshot. Maps merge per factor;
// scalar fields replace.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub weights: Option<BTreeMap<FactorKind, f64>>,
    pub factor_bands: Option<BTreeMap<FactorKind, ThresholdBand>>,
    pub score_bands: Option<ScoreBands>,
    pub trend_epsilon: Option<f64>,
}

impl RiskConfig {
    pub fn is_enforced(&self) -> bool {
        self.mode == ConfigMode::Enforced
    }

    // Preview runs must never stamp assessments with a stored snapshot id.
    pub fn as_preview(&self) -> RiskConfig {
        let mut preview = self.clone();
        preview.id = None;
        preview.mode = ConfigMode::Preview;
        preview
    }

    // Returns a new snapshot; the receiver is never mutated. The result is
    // unsaved and carries no id until persisted.
    pub fn apply(&self, patch: &ConfigPatch) -> RiskConfig {
        let mut next = self.clone();
        next.id = None;
        if let Some(weights) = &patch.weights {
            for (&factor, &weight) in weights {
                next.weights.insert(factor, weight);
            }
        }
        if let Some(bands) = &patch.factor_bands {
            for (&factor, &band) in bands {
                next.factor_bands.insert(factor, band);
            }
        }
        if let Some(bands) = patch.score_bands {
            next.score_bands = bands;
        }
        if let Some(epsilon) = patch.trend_epsilon {
            next.trend_epsilon = epsilon;
        }
        next
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_weights(&self.weights)?;
        validate_factor_bands(&self.factor_bands)?;
        validate_score_bands(&self.score_bands)?;
        Ok(())
    }
}

pub fn validate_weights(weights: &BTreeMap<FactorKind, f64>) -> Result<(), EngineError> {
    for (factor, weight) in weights {
        if !(0.0..=1.0).contains(weight) {
            return Err(EngineError::invalid_weights(format!(
                "{} weight {} outside [0, 1]",
                factor.as_str(),
                weight
            )));
        }
    }
    let sum: f64 = weights.values().sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
        return Err(EngineError::invalid_weights(format!(
            "sum {sum:.3} deviates from 1.0 by more than {WEIGHT_SUM_EPSILON}"
        )));
    }
    Ok(())
}

pub fn validate_factor_bands(
    bands: &BTreeMap<FactorKind, ThresholdBand>,
) -> Result<(), EngineError> {
    for (factor, band) in bands {
        if !(band.critical < band.high && band.high < band.medium) {
            return Err(EngineError::invalid_thresholds(
                factor.as_str(),
                format!(
                    "expected critical < high < medium, got {} / {} / {}",
                    band.critical, band.high, band.medium
                ),
            ));
        }
    }
    Ok(())
}

pub fn validate_score_bands(bands: &ScoreBands) -> Result<(), EngineError> {
    let ascending = 0.0 < bands.medium_from
        && bands.medium_from < bands.high_from
        && bands.high_from < bands.critical_from
        && bands.critical_from <= 1.0;
    if !ascending {
        return Err(EngineError::invalid_thresholds(
            "aggregate score",
            format!(
                "expected 0 < medium < high < critical <= 1, got {} / {} / {}",
                bands.medium_from, bands.high_from, bands.critical_from
            ),
        ));
    }
    Ok(())
}
