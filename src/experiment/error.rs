// Error kinds for the inference engine
//
// Structural errors (DataIntegrity, InvalidArgument, Domain) abort the
// computation that raised them. Per-segment anomalies (InsufficientData,
// DegenerateInput) are recovered by the multi-segment runner and turned into
// markers on the affected TestResult.

use thiserror::Error;

/// Errors raised by the analysis engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Domain error: {0}")]
    Domain(String),

    #[error("Insufficient data for segment '{segment}': {reason}")]
    InsufficientData { segment: String, reason: String },

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
}

impl AnalysisError {
    /// Whether the error describes a per-segment data phenomenon that the
    /// multi-segment runner marks instead of propagating
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData { .. } | AnalysisError::DegenerateInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(AnalysisError::DegenerateInput("n1 = 0".into()).is_recoverable());
        assert!(AnalysisError::InsufficientData {
            segment: "UK".into(),
            reason: "treatment has no observations".into(),
        }
        .is_recoverable());
        assert!(!AnalysisError::Domain("p = 1.5".into()).is_recoverable());
        assert!(!AnalysisError::DataIntegrity("empty".into()).is_recoverable());
    }

    #[test]
    fn test_display_includes_segment() {
        let err = AnalysisError::InsufficientData {
            segment: "CA".into(),
            reason: "control has no observations".into(),
        };
        assert!(err.to_string().contains("'CA'"));
    }
}
