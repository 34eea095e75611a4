use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorKind {
    Gpa,
    Attendance,
    Assignments,
    Behavior,
}

impl FactorKind {
    pub const ALL: [FactorKind; 4] = [
        FactorKind::Gpa,
        FactorKind::Attendance,
        FactorKind::Assignments,
        FactorKind::Behavior,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FactorKind::Gpa => "gpa",
            FactorKind::Attendance => "attendance",
            FactorKind::Assignments => "assignments",
            FactorKind::Behavior => "behavior",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpa" => Some(FactorKind::Gpa),
            "attendance" => Some(FactorKind::Attendance),
            "assignments" | "assignment" => Some(FactorKind::Assignments),
            "behavior" | "behaviour" | "engagement" => Some(FactorKind::Behavior),
            _ => None,
        }
    }

    pub fn native_range(self) -> (f64, f64) {
        match self {
            FactorKind::Gpa => (0.0, 4.0),
            FactorKind::Attendance => (0.0, 100.0),
            FactorKind::Assignments => (0.0, 100.0),
            FactorKind::Behavior => (0.0, 100.0),
        }
    }

    pub fn direction(self) -> Direction {
        // Every institutional factor is measured on a lower-is-worse scale;
        // higher-is-worse only occurs on self-assessment questions.
        Direction::LowerWorse
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    LowerWorse,
    HigherWorse,
}

// Ordered by severity so callers can compare levels directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            "critical" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FactorReading {
    pub factor: FactorKind,
    pub value: f64,
    pub observed_at: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct ReadingRecord {
    pub student_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub cohort: String,
    pub factor: FactorKind,
    pub value: f64,
    pub observed_at: NaiveDate,
}

impl ReadingRecord {
    pub fn reading(&self) -> FactorReading {
        FactorReading {
            factor: self.factor,
            value: self.value,
            observed_at: self.observed_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorAssessment {
    pub factor: FactorKind,
    pub raw_value: f64,
    pub normalized: f64,
    pub weight_share: f64,
    pub contribution: f64,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub assessed_at: DateTime<Utc>,
    pub score: f64,
    pub level: RiskLevel,
    pub breakdown: Vec<FactorAssessment>,
    pub warnings: Vec<String>,
    pub config_id: Option<Uuid>,
}

impl RiskAssessment {
    pub fn top_factor(&self) -> Option<&FactorAssessment> {
        self.breakdown.iter().max_by(|a, b| {
            a.contribution
                .partial_cmp(&b.contribution)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScoredStudent {
    pub student_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub cohort: String,
    pub assessment: RiskAssessment,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub assessed_on: NaiveDate,
    pub score: f64,
    pub level: RiskLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

impl LevelCounts {
    pub fn bump(&mut self, level: RiskLevel) {
        match level {
            RiskLevel::Low => self.low += 1,
            RiskLevel::Medium => self.medium += 1,
            RiskLevel::High => self.high += 1,
            RiskLevel::Critical => self.critical += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.low + self.medium + self.high + self.critical
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendBucket {
    pub period_start: NaiveDate,
    pub counts: LevelCounts,
    pub mean_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Worsening,
}

impl TrendDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Stable => "stable",
            TrendDirection::Worsening => "worsening",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub buckets: Vec<TrendBucket>,
    pub direction: TrendDirection,
}
