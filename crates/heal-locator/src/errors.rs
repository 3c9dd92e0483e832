//! Error types for the healing engine

use thiserror::Error;

/// Failure reported by the browser collaborator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PageError {
    /// The page or browser cannot be reached at all
    #[error("Page unreachable: {0}")]
    Unreachable(String),

    /// The selector could not be parsed by the page
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// A DOM query or script evaluation failed
    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    /// The collaborator does not implement this query
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl PageError {
    /// Only a lost page aborts a healing run
    pub fn is_fatal(&self) -> bool {
        matches!(self, PageError::Unreachable(_))
    }
}

/// Healing error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HealError {
    /// The strategy had nothing to build candidates from
    #[error("No alternatives generated: {0}")]
    NoCandidatesGenerated(String),

    /// Candidates were built but none resolved on the live page
    #[error("No candidate matched: {tried} of {generated} candidates failed live validation")]
    NoCandidateValidated { generated: usize, tried: usize },

    /// No description of the target element could be obtained
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Visual recognition failed: {0}")]
    VisualRecognitionFailure(String),

    #[error("Strategy '{strategy}' timed out after {elapsed_ms}ms")]
    StrategyTimeout { strategy: String, elapsed_ms: u64 },

    #[error(transparent)]
    Page(#[from] PageError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HealError {
    /// Fatal errors abort the run instead of advancing to the next strategy
    pub fn is_fatal(&self) -> bool {
        match self {
            HealError::Page(err) => err.is_fatal(),
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            HealError::Page(PageError::Unreachable(_)) => 3,
            HealError::Internal(_) | HealError::StrategyTimeout { .. } => 2,
            HealError::NoCandidateValidated { .. }
            | HealError::ElementNotFound(_)
            | HealError::VisualRecognitionFailure(_)
            | HealError::Page(_) => 1,
            HealError::NoCandidatesGenerated(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unreachable_is_fatal() {
        assert!(HealError::from(PageError::Unreachable("closed".into())).is_fatal());
        assert!(!HealError::from(PageError::InvalidSelector("[".into())).is_fatal());
        assert!(!HealError::ElementNotFound("#x".into()).is_fatal());
        assert!(!HealError::StrategyTimeout {
            strategy: "visual".into(),
            elapsed_ms: 10
        }
        .is_fatal());
    }

    #[test]
    fn test_severity_ordering() {
        let fatal = HealError::Page(PageError::Unreachable("gone".into()));
        let none = HealError::NoCandidatesGenerated("no identifying attributes".into());
        assert_eq!(fatal.severity(), 3);
        assert_eq!(none.severity(), 0);
        assert!(HealError::Internal("join".into()).severity() > none.severity());
    }

    #[test]
    fn test_messages() {
        let err = HealError::NoCandidateValidated {
            generated: 4,
            tried: 3,
        };
        assert_eq!(
            err.to_string(),
            "No candidate matched: 3 of 4 candidates failed live validation"
        );
        let err = HealError::from(PageError::Unreachable("target closed".into()));
        assert_eq!(err.to_string(), "Page unreachable: target closed");
    }
}
