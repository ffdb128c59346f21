use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the session engine and its collaborators.
///
/// Every variant maps to a stable wire-level error code via [`EngineError::code`]
/// so transport adapters can relay failures without string matching.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("session {0} not found")]
    SessionNotFound(Uuid),

    #[error("reference unit {corpus_id}:{unit_id} not found")]
    UnitNotFound { corpus_id: u32, unit_id: u32 },

    #[error("session {0} has already ended")]
    SessionEnded(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid position index format: {0}")]
    Format(String),
}

impl EngineError {
    /// Stable error code for structured error responses.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::SessionNotFound(_) | EngineError::UnitNotFound { .. } => "not_found",
            EngineError::SessionEnded(_) => "invalid_state",
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::Provider(_) => "provider_error",
            EngineError::Format(_) => "format_error",
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Provider(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let id = Uuid::new_v4();
        assert_eq!(EngineError::SessionNotFound(id).code(), "not_found");
        assert_eq!(
            EngineError::UnitNotFound {
                corpus_id: 1,
                unit_id: 8
            }
            .code(),
            "not_found"
        );
        assert_eq!(EngineError::SessionEnded(id).code(), "invalid_state");
        assert_eq!(
            EngineError::InvalidInput("empty owner".to_string()).code(),
            "invalid_input"
        );
        assert_eq!(
            EngineError::Provider("timeout".to_string()).code(),
            "provider_error"
        );
        assert_eq!(
            EngineError::Format("a.b".to_string()).code(),
            "format_error"
        );
    }

    #[test]
    fn test_display_includes_location() {
        let err = EngineError::UnitNotFound {
            corpus_id: 2,
            unit_id: 255,
        };
        assert_eq!(err.to_string(), "reference unit 2:255 not found");
    }
}
