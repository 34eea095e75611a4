use crate::config::{ScoreBands, ThresholdBand};
use crate::models::RiskLevel;

// Bounds are inclusive lower bounds, so a score sitting exactly on a
// boundary takes the more severe level.
pub fn classify_score(score: f64, bands: &ScoreBands) -> RiskLevel {
    if score >= bands.critical_from {
        RiskLevel::Critical
    } else if score >= bands.high_from {
        RiskLevel::High
    } else if score >= bands.medium_from {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

// Native bands read the other way around: the measurement is lower-is-worse,
// and a value strictly below a cut point falls into that band.
pub fn classify_native(value: f64, band: &ThresholdBand) -> RiskLevel {
    if value < band.critical {
        RiskLevel::Critical
    } else if value < band.high {
        RiskLevel::High
    } else if value < band.medium {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}
