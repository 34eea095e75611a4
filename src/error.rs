use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("invalid weights: {reason}")]
    InvalidWeightSum { reason: String },

    #[error("invalid thresholds for {subject}: {reason}")]
    InvalidThresholdOrder { subject: String, reason: String },

    #[error("enforced configuration rejected at scoring time: {reason}")]
    ConfigurationError { reason: String },

    #[error("questionnaire incomplete: {answered}/{total} answered, missing {missing}")]
    IncompleteSubmission {
        answered: usize,
        total: usize,
        missing: String,
    },

    #[error("response references unknown question '{question}'")]
    UnknownQuestion { question: String },

    #[error("answer {value} for question '{question}' outside [{min}, {max}]")]
    AnswerOutOfRange {
        question: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("no reading available for any weighted factor")]
    NoFactorValues,

    #[error("weights of the scored entries sum to zero; nothing to aggregate")]
    ZeroWeightSum,
}

impl EngineError {
    pub fn invalid_weights(reason: impl Into<String>) -> Self {
        Self::InvalidWeightSum {
            reason: reason.into(),
        }
    }

    pub fn invalid_thresholds(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidThresholdOrder {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}
