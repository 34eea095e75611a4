use crate::models::{Direction, FactorKind};

// Maps a native-unit measurement onto [0, 1] where 1.0 is maximal risk.
// A degenerate range (max <= min) cannot be scaled; the value falls back to
// 0.0 and the second element flags it so the caller can raise a warning.
pub fn unit_risk(direction: Direction, min: f64, max: f64, raw: f64) -> (f64, bool) {
    if max <= min {
        return (0.0, true);
    }
    let position = (raw - min) / (max - min);
    let risk = match direction {
        Direction::LowerWorse => 1.0 - position,
        Direction::HigherWorse => position,
    };
    (risk.clamp(0.0, 1.0), false)
}

pub fn factor_risk(factor: FactorKind, raw: f64) -> (f64, bool) {
    let (min, max) = factor.native_range();
    unit_risk(factor.direction(), min, max, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_worse_hits_extremes() {
        let (at_min, _) = unit_risk(Direction::LowerWorse, 0.0, 4.0, 0.0);
        let (at_max, _) = unit_risk(Direction::LowerWorse, 0.0, 4.0, 4.0);
        assert_eq!(at_min, 1.0);
        assert_eq!(at_max, 0.0);
    }

    #[test]
    fn higher_worse_hits_extremes() {
        let (at_min, _) = unit_risk(Direction::HigherWorse, 1.0, 10.0, 1.0);
        let (at_max, _) = unit_risk(Direction::HigherWorse, 1.0, 10.0, 10.0);
        assert_eq!(at_min, 0.0);
        assert_eq!(at_max, 1.0);
    }

    #[test]
    fn midpoint_maps_to_half() {
        let (risk, degenerate) = unit_risk(Direction::LowerWorse, 0.0, 4.0, 2.0);
        assert!((risk - 0.5).abs() < 1e-12);
        assert!(!degenerate);
    }

    #[test]
    fn values_outside_range_clamp() {
        let (above, _) = unit_risk(Direction::LowerWorse, 0.0, 4.0, 5.0);
        let (below, _) = unit_risk(Direction::LowerWorse, 0.0, 4.0, -1.0);
        assert_eq!(above, 0.0);
        assert_eq!(below, 1.0);
    }

    #[test]
    fn degenerate_range_falls_back_to_zero() {
        assert_eq!(unit_risk(Direction::HigherWorse, 5.0, 5.0, 5.0), (0.0, true));
        assert_eq!(unit_risk(Direction::LowerWorse, 7.0, 3.0, 4.0), (0.0, true));
    }

    #[test]
    fn factor_risk_uses_native_ranges() {
        let (gpa, _) = factor_risk(FactorKind::Gpa, 2.0);
        let (attendance, _) = factor_risk(FactorKind::Attendance, 60.0);
        let (assignments, _) = factor_risk(FactorKind::Assignments, 50.0);
        assert!((gpa - 0.5).abs() < 1e-12);
        assert!((attendance - 0.4).abs() < 1e-12);
        assert!((assignments - 0.5).abs() < 1e-12);
    }
}
